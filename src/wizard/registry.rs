//! Ordered step registry.
//!
//! Position lookups are clamped so navigating past either end of the wizard
//! lands on the first or last step instead of failing.

use std::collections::HashMap;

use super::error::WizardError;
use super::step::{StepDefinition, StepProvider};

/// Ordered `(key, provider)` pairs for one cycle
#[derive(Debug, Clone)]
pub struct StepRegistry {
    steps: Vec<StepDefinition>,
    positions: HashMap<String, usize>,
}

impl StepRegistry {
    /// Build a registry, rejecting empty step lists and duplicate keys
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, WizardError> {
        if steps.is_empty() {
            return Err(WizardError::EmptyWizard);
        }

        let mut positions = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            if positions.insert(step.key.clone(), position).is_some() {
                return Err(WizardError::DuplicateStep(step.key.clone()));
            }
        }

        Ok(Self { steps, positions })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// False for any built registry; construction rejects empty step lists
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Zero-based position of `key`
    pub fn position_of(&self, key: &str) -> Result<usize, WizardError> {
        self.positions
            .get(key)
            .copied()
            .ok_or_else(|| WizardError::UnknownStep(key.to_string()))
    }

    /// Key at `position`, clamped to the first and last step
    pub fn key_at(&self, position: isize) -> &str {
        let last = self.steps.len() - 1;
        let index = if position < 0 {
            0
        } else {
            (position as usize).min(last)
        };
        &self.steps[index].key
    }

    /// Key `direction` positions away from `key`, clamped
    pub fn offset(&self, key: &str, direction: i32) -> Result<&str, WizardError> {
        let position = self.position_of(key)? as isize;
        Ok(self.key_at(position + direction as isize))
    }

    /// Key after `key`; the last step is its own successor
    pub fn next_key(&self, key: &str) -> Result<&str, WizardError> {
        self.offset(key, 1)
    }

    pub fn first_key(&self) -> &str {
        self.key_at(0)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.key.as_str())
    }

    pub(crate) fn providers(&self) -> impl Iterator<Item = &StepProvider> {
        self.steps.iter().map(|s| &s.provider)
    }
}
