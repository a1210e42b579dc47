//! Lifecycle signals fired around save, display and prerequisite checks.
//!
//! Handlers are fire-and-forget: a failing handler is logged and skipped, it
//! never changes the outcome of a request.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::Wizard;

/// Points in a cycle where handlers are notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WizardSignal {
    #[serde(rename = "wizard.pre_save")]
    PreSave,
    #[serde(rename = "wizard.post_save")]
    PostSave,
    #[serde(rename = "wizard.pre_display")]
    PreDisplay,
    #[serde(rename = "wizard.post_display")]
    PostDisplay,
    #[serde(rename = "wizard.prereq")]
    PrereqSatisfied,
}

impl WizardSignal {
    /// Signal name used for filtering and logging (e.g. "wizard.pre_save")
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardSignal::PreSave => "wizard.pre_save",
            WizardSignal::PostSave => "wizard.post_save",
            WizardSignal::PreDisplay => "wizard.pre_display",
            WizardSignal::PostDisplay => "wizard.post_display",
            WizardSignal::PrereqSatisfied => "wizard.prereq",
        }
    }
}

/// A signal together with the step it concerns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardEvent {
    pub signal: WizardSignal,
    pub step_key: String,
}

/// Receiver for wizard lifecycle signals
pub trait SignalHandler: Send + Sync {
    /// Handler name (for logging)
    fn name(&self) -> &str;

    /// Whether this handler wants `signal`; all signals by default
    fn handles(&self, signal: WizardSignal) -> bool {
        let _ = signal;
        true
    }

    fn receive(&self, wizard: &Wizard, event: &WizardEvent) -> Result<()>;
}

/// Ordered set of signal handlers
#[derive(Clone, Default)]
pub struct Signals {
    handlers: Vec<Arc<dyn SignalHandler>>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, handler: Arc<dyn SignalHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Deliver `signal` for `step_key` to every interested handler in order
    pub fn send(&self, wizard: &Wizard, signal: WizardSignal, step_key: &str) {
        let event = WizardEvent {
            signal,
            step_key: step_key.to_string(),
        };

        for handler in &self.handlers {
            if !handler.handles(signal) {
                continue;
            }
            if let Err(e) = handler.receive(wizard, &event) {
                tracing::warn!(
                    handler = %handler.name(),
                    signal = %signal.as_str(),
                    step = step_key,
                    error = %e,
                    "Signal handler failed"
                );
            }
        }
    }
}

/// Logs every signal at debug level
#[derive(Debug, Default)]
pub struct TracingSignalHandler;

impl SignalHandler for TracingSignalHandler {
    fn name(&self) -> &str {
        "tracing"
    }

    fn receive(&self, wizard: &Wizard, event: &WizardEvent) -> Result<()> {
        tracing::debug!(
            signal = %event.signal.as_str(),
            step = %event.step_key,
            requested = wizard.requested_step().unwrap_or("-"),
            "Wizard signal"
        );
        Ok(())
    }
}
