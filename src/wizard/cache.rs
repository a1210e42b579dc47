//! Lazy, per-cycle step instance cache

use std::cell::RefCell;

use super::error::WizardError;
use super::registry::StepRegistry;
use super::request::WizardRequest;
use super::step::{StepArgs, StepFactory, StepHandle, StepInit, StepProvider};

/// Storage slot for one step
pub enum StepSlot {
    Uninstantiated(StepFactory),
    Ready(StepHandle),
}

impl From<&StepProvider> for StepSlot {
    fn from(provider: &StepProvider) -> Self {
        match provider {
            StepProvider::Factory(factory) => StepSlot::Uninstantiated(factory.clone()),
            StepProvider::Ready(step) => StepSlot::Ready(step.clone()),
        }
    }
}

/// Owns the registry for a cycle and memoizes step instances by key.
///
/// A step is only constructed the first time its key is looked up.
pub struct StepCache {
    registry: StepRegistry,
    slots: Vec<RefCell<StepSlot>>,
    args: StepArgs,
    current_step: Option<String>,
    request: WizardRequest,
}

impl StepCache {
    pub fn new(
        registry: StepRegistry,
        args: StepArgs,
        current_step: Option<String>,
        request: WizardRequest,
    ) -> Self {
        let slots = registry
            .providers()
            .map(|p| RefCell::new(StepSlot::from(p)))
            .collect();

        Self {
            registry,
            slots,
            args,
            current_step,
            request,
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn request(&self) -> &WizardRequest {
        &self.request
    }

    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    /// Instance for `key`, constructing it on first use
    pub fn get(&self, key: &str) -> Result<StepHandle, WizardError> {
        let position = self.registry.position_of(key)?;
        self.materialize(position, key)
    }

    /// Whether `key` has an instance yet (ready providers always do)
    pub fn is_materialized(&self, key: &str) -> bool {
        self.registry
            .position_of(key)
            .map(|p| matches!(*self.slots[p].borrow(), StepSlot::Ready(_)))
            .unwrap_or(false)
    }

    fn materialize(&self, position: usize, key: &str) -> Result<StepHandle, WizardError> {
        let mut slot = self.slots[position].borrow_mut();

        let factory = match &*slot {
            StepSlot::Ready(step) => return Ok(step.clone()),
            StepSlot::Uninstantiated(factory) => factory.clone(),
        };

        let init = StepInit {
            key,
            current_step: self.current_step.as_deref(),
            args: &self.args,
            request: &self.request,
        };
        let step = factory(&init).map_err(|source| WizardError::StepConstruction {
            key: key.to_string(),
            source,
        })?;

        tracing::debug!(step = key, "Constructed wizard step");
        *slot = StepSlot::Ready(step.clone());
        Ok(step)
    }
}
