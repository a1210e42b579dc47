//! Step capability trait and the provider types the registry stores

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::error::{PrereqMissing, SaveStepError};
use super::request::{ViewData, WizardRequest};
use super::Wizard;

/// A shared, materialized step instance
pub type StepHandle = Arc<dyn WizardStep>;

/// Builds a step instance for one cycle
pub type StepFactory = Arc<dyn Fn(&StepInit<'_>) -> anyhow::Result<StepHandle> + Send + Sync>;

/// Builds the step list for a cycle from the incoming request
pub type StepSourceFn = Arc<dyn Fn(&WizardRequest) -> Vec<StepDefinition> + Send + Sync>;

/// One page of a wizard.
///
/// Every method receives a [`StepContext`] giving access to the step's own key,
/// the key originally requested for this cycle and the owning [`Wizard`].
pub trait WizardStep: Send + Sync {
    /// Template data for this step
    fn display(&self, cx: &StepContext<'_>) -> ViewData {
        let _ = cx;
        ViewData::new()
    }

    /// Persist submitted data. An error keeps the user on this step.
    fn save(&self, cx: &StepContext<'_>) -> Result<(), SaveStepError> {
        let _ = cx;
        Ok(())
    }

    /// Check that this step can be shown right now
    fn prereq(&self, cx: &StepContext<'_>) -> Result<(), PrereqMissing> {
        let _ = cx;
        Ok(())
    }

    /// Template the renderer should use for this step
    fn template(&self, cx: &StepContext<'_>) -> StepTemplate;

    /// Content type override for the rendered page
    fn response_kind(&self) -> Option<&str> {
        None
    }
}

/// Template reference returned by [`WizardStep::template`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTemplate {
    /// A template registered with the renderer under this name
    Named(String),
    /// Template source rendered as-is
    Inline(String),
}

impl StepTemplate {
    pub fn named(name: impl Into<String>) -> Self {
        StepTemplate::Named(name.into())
    }

    pub fn inline(source: impl Into<String>) -> Self {
        StepTemplate::Inline(source.into())
    }
}

/// Per-call context handed to step methods
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    key: &'a str,
    wizard: &'a Wizard,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(key: &'a str, wizard: &'a Wizard) -> Self {
        Self { key, wizard }
    }

    /// Key this step is registered under
    pub fn key(&self) -> &'a str {
        self.key
    }

    /// Key requested by the user for this cycle
    pub fn current_step(&self) -> Option<&'a str> {
        self.wizard.requested_step()
    }

    pub fn wizard(&self) -> &'a Wizard {
        self.wizard
    }

    pub fn request(&self) -> &'a WizardRequest {
        self.wizard.request()
    }
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("key", &self.key)
            .field("current_step", &self.current_step())
            .finish()
    }
}

/// Arguments the wizard passes to every step factory.
///
/// Factories use whichever part they need; both may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepArgs {
    pub positional: Vec<Value>,
    pub keyword: serde_json::Map<String, Value>,
}

impl StepArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// Everything a factory knows when it is asked for an instance
#[derive(Debug, Clone, Copy)]
pub struct StepInit<'a> {
    pub key: &'a str,
    pub current_step: Option<&'a str>,
    pub args: &'a StepArgs,
    pub request: &'a WizardRequest,
}

/// Either a factory or an instance that is used as-is
#[derive(Clone)]
pub enum StepProvider {
    Factory(StepFactory),
    Ready(StepHandle),
}

impl StepProvider {
    /// Wrap a constructor closure
    pub fn factory<F, S>(build: F) -> Self
    where
        F: Fn(&StepInit<'_>) -> anyhow::Result<S> + Send + Sync + 'static,
        S: WizardStep + 'static,
    {
        StepProvider::Factory(Arc::new(move |init| {
            let step = build(init)?;
            Ok(Arc::new(step) as StepHandle)
        }))
    }

    /// Use an already constructed step
    pub fn ready<S: WizardStep + 'static>(step: S) -> Self {
        StepProvider::Ready(Arc::new(step))
    }

    /// Use a step instance that is also held elsewhere
    pub fn shared(step: StepHandle) -> Self {
        StepProvider::Ready(step)
    }
}

impl fmt::Debug for StepProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepProvider::Factory(_) => f.write_str("Factory(..)"),
            StepProvider::Ready(_) => f.write_str("Ready(..)"),
        }
    }
}

/// A step key together with where its instance comes from
#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub key: String,
    pub provider: StepProvider,
}

impl StepDefinition {
    pub fn new(key: impl Into<String>, provider: StepProvider) -> Self {
        Self {
            key: key.into(),
            provider,
        }
    }

    pub fn factory<F, S>(key: impl Into<String>, build: F) -> Self
    where
        F: Fn(&StepInit<'_>) -> anyhow::Result<S> + Send + Sync + 'static,
        S: WizardStep + 'static,
    {
        Self::new(key, StepProvider::factory(build))
    }

    pub fn ready<S: WizardStep + 'static>(key: impl Into<String>, step: S) -> Self {
        Self::new(key, StepProvider::ready(step))
    }
}

/// Where a wizard gets its steps from at the start of each cycle
#[derive(Clone)]
pub enum StepSource {
    Fixed(Arc<Vec<StepDefinition>>),
    /// Re-evaluated for every request, so the step set can depend on it
    Dynamic(StepSourceFn),
}

impl StepSource {
    pub fn fixed(steps: Vec<StepDefinition>) -> Self {
        StepSource::Fixed(Arc::new(steps))
    }

    pub fn dynamic<F>(build: F) -> Self
    where
        F: Fn(&WizardRequest) -> Vec<StepDefinition> + Send + Sync + 'static,
    {
        StepSource::Dynamic(Arc::new(build))
    }

    /// Step definitions for one cycle
    pub fn definitions(&self, request: &WizardRequest) -> Vec<StepDefinition> {
        match self {
            StepSource::Fixed(steps) => steps.as_ref().clone(),
            StepSource::Dynamic(build) => build(request),
        }
    }
}

impl fmt::Debug for StepSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepSource::Fixed(steps) => f.debug_tuple("Fixed").field(&steps.len()).finish(),
            StepSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
