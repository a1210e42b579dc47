//! Error types for the wizard engine.
//!
//! `WizardError` is what crosses the boundary to the transport layer.
//! `PrereqMissing` and `SaveStepError` are step-level signals that the
//! dispatcher resolves itself and never hands back to a caller.

use thiserror::Error;

use super::urls::UrlError;

/// Errors that abort a request-handling cycle
#[derive(Error, Debug)]
pub enum WizardError {
    #[error("step '{0}' not found in wizard")]
    UnknownStep(String),

    #[error("wizard has no steps")]
    EmptyWizard,

    #[error("step key '{0}' is registered more than once")]
    DuplicateStep(String),

    #[error("redirect arguments must be positional or keyword, not both")]
    InvalidRedirectArgs,

    #[error(transparent)]
    Url(#[from] UrlError),

    #[error("step '{step}' is missing a prerequisite but names no step to go to")]
    PrereqTargetMissing { step: String },

    #[error("prerequisite resolution revisited step '{step}' without making progress")]
    PrereqCycle { step: String },

    #[error("failed to construct step '{key}': {source}")]
    StepConstruction {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to render step '{step}': {source}")]
    Render {
        step: String,
        #[source]
        source: anyhow::Error,
    },
}

impl WizardError {
    /// True when the transport should answer with a not-found response
    pub fn is_not_found(&self) -> bool {
        matches!(self, WizardError::UnknownStep(_))
    }
}

/// Raised by a step's `prereq` when another step must be completed first.
///
/// With a `target` the wizard jumps straight to that step. Without one it keeps
/// walking in the direction the user was navigating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrereqMissing {
    pub target: Option<String>,
    pub message: Option<String>,
}

impl PrereqMissing {
    /// Prerequisite missing with no explicit step to jump to
    pub fn new() -> Self {
        Self::default()
    }

    /// Prerequisite missing; send the user to `step`
    pub fn redirect_to(step: impl Into<String>) -> Self {
        Self {
            target: Some(step.into()),
            message: None,
        }
    }

    /// Attach a message that is shown to the user after the redirect
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Raised by a step's `save` when the submitted data cannot be accepted.
/// The wizard re-displays the same step.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{}", message.as_deref().unwrap_or("step could not be saved"))]
pub struct SaveStepError {
    pub message: Option<String>,
}

impl SaveStepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}
