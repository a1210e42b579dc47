//! Prerequisite resolution.
//!
//! Starting from a candidate step, checks prerequisites and follows failures
//! until a step that can be shown is found. Failures that name a target jump
//! there directly; failures without one keep walking in the navigation
//! direction, bouncing back when the walk runs off either end of the wizard.

use std::collections::HashSet;

use super::error::WizardError;
use super::messages::MessageLevel;
use super::signals::WizardSignal;
use super::step::StepContext;
use super::Wizard;

/// Where prerequisite resolution ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// First reachable step
    pub step: String,
    /// True when a prerequisite failure moved the user off the candidate
    pub redirect: bool,
}

/// Result of checking a single step
#[derive(Debug, Clone, PartialEq, Eq)]
enum Probe {
    Satisfied,
    Blocked { next: String, direction: i32 },
}

/// Resolves prerequisites against the steps of one wizard cycle
pub struct PrereqResolver<'a> {
    wizard: &'a Wizard,
}

impl<'a> PrereqResolver<'a> {
    pub fn new(wizard: &'a Wizard) -> Self {
        Self { wizard }
    }

    /// Find the first reachable step starting at `candidate`.
    ///
    /// A `(step, direction)` pair is never checked twice; revisiting one means
    /// the prerequisite graph loops and resolution stops with `PrereqCycle`.
    pub fn resolve(&self, candidate: &str, direction: i32) -> Result<Resolution, WizardError> {
        let mut visited = HashSet::new();
        let mut key = candidate.to_string();
        let mut direction = direction;
        let mut blocked = false;

        loop {
            if !visited.insert((key.clone(), direction)) {
                return Err(WizardError::PrereqCycle { step: key });
            }

            match self.probe(&key, direction)? {
                Probe::Satisfied => {
                    let redirect = blocked && key != candidate;
                    if redirect {
                        tracing::debug!(requested = candidate, resolved = %key, "Prerequisites redirect");
                    }
                    return Ok(Resolution {
                        step: key,
                        redirect,
                    });
                }
                Probe::Blocked {
                    next,
                    direction: next_direction,
                } => {
                    blocked = true;
                    key = next;
                    direction = next_direction;
                }
            }
        }
    }

    fn probe(&self, key: &str, direction: i32) -> Result<Probe, WizardError> {
        let step = self.wizard.step(key)?;
        let cx = StepContext::new(key, self.wizard);

        let missing = match step.prereq(&cx) {
            Ok(()) => {
                self.wizard.send_signal(WizardSignal::PrereqSatisfied, key);
                return Ok(Probe::Satisfied);
            }
            Err(missing) => missing,
        };

        if let Some(message) = missing.message.as_deref() {
            self.wizard.add_message(MessageLevel::Error, message);
        }

        tracing::debug!(
            step = key,
            target = missing.target.as_deref().unwrap_or("-"),
            direction,
            "Prerequisite missing"
        );

        match (missing.target, direction) {
            (Some(target), _) => Ok(Probe::Blocked {
                next: target,
                direction: 0,
            }),
            (None, 0) => Err(WizardError::PrereqTargetMissing {
                step: key.to_string(),
            }),
            (None, direction) => {
                let peek = self.wizard.registry().offset(key, direction)?;
                // Clamped at an edge: turn around
                let direction = if peek == key { -direction } else { direction };
                Ok(Probe::Blocked {
                    next: peek.to_string(),
                    direction,
                })
            }
        }
    }
}
