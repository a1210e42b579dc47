//! Shared state for the HTTP server.

use std::sync::Arc;

use crate::config::Config;
use crate::sample::{SampleWizard, SubmissionStore};
use crate::wizard::{MessageLog, WizardDefinition};

/// Shared state for the wizard routes
#[derive(Clone)]
pub struct AppState {
    pub definition: WizardDefinition,
    /// Flash messages, drained into the next rendered page
    pub messages: Arc<MessageLog>,
    pub store: Arc<SubmissionStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, sample: SampleWizard) -> Self {
        Self {
            definition: sample.definition,
            messages: sample.messages,
            store: sample.store,
            config: Arc::new(config),
        }
    }

    /// Build state for the sample flow described by `config`
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let sample = crate::sample::build(&config.wizard)?;
        Ok(Self::new(config, sample))
    }
}
