//! Multi-step form wizard engine.
//!
//! A [`WizardDefinition`] is built once and shared across requests. Each
//! request gets its own [`Wizard`] cycle (fresh registry and step cache) via
//! [`WizardDefinition::cycle`], which decides whether to render the requested
//! step or redirect somewhere else.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

pub mod cache;
pub mod error;
pub mod messages;
pub mod navigation;
pub mod prereq;
pub mod registry;
pub mod render;
pub mod request;
pub mod signals;
pub mod step;
pub mod urls;

#[cfg(test)]
mod tests;

pub use cache::{StepCache, StepSlot};
pub use error::{PrereqMissing, SaveStepError, WizardError};
pub use messages::{Message, MessageLevel, MessageLog, MessageSink};
pub use navigation::{NavigationAction, NavigationConfig};
pub use prereq::{PrereqResolver, Resolution};
pub use registry::StepRegistry;
pub use render::{HandlebarsRenderer, TemplateRenderer};
pub use request::{Outcome, RequestIntent, ViewData, WizardRequest, WizardResponse};
pub use signals::{SignalHandler, Signals, TracingSignalHandler, WizardEvent, WizardSignal};
pub use step::{
    StepArgs, StepContext, StepDefinition, StepHandle, StepInit, StepProvider, StepSource,
    StepTemplate, WizardStep,
};
pub use urls::{RedirectArgs, RouteTable, UrlBuilder, UrlError};

use request::DEFAULT_CONTENT_TYPE;

struct DefinitionInner {
    base_route: String,
    steps: StepSource,
    navigation: NavigationConfig,
    step_args: StepArgs,
    redirect_args: RedirectArgs,
    extra_context: ViewData,
    signals: Signals,
    messages: Option<Arc<dyn MessageSink>>,
    urls: Arc<dyn UrlBuilder>,
    renderer: Arc<dyn TemplateRenderer>,
}

/// Immutable wizard configuration, cheap to clone and safe to share
#[derive(Clone)]
pub struct WizardDefinition {
    inner: Arc<DefinitionInner>,
}

impl WizardDefinition {
    /// Start building a wizard whose redirects reverse `base_route`
    pub fn builder(base_route: impl Into<String>, steps: StepSource) -> WizardBuilder {
        WizardBuilder::new(base_route, steps)
    }

    pub fn base_route(&self) -> &str {
        &self.inner.base_route
    }

    pub fn navigation(&self) -> &NavigationConfig {
        &self.inner.navigation
    }

    /// Begin a request-handling cycle for `request` targeting `step`
    pub fn cycle(&self, request: WizardRequest, step: Option<&str>) -> Result<Wizard, WizardError> {
        let registry = StepRegistry::new(self.inner.steps.definitions(&request))?;
        let cache = StepCache::new(
            registry,
            self.inner.step_args.clone(),
            step.map(str::to_string),
            request,
        );

        Ok(Wizard {
            definition: self.clone(),
            cache,
            extra_context: ViewData::new(),
        })
    }

    /// Run a complete cycle and produce the response
    pub fn handle_request(
        &self,
        request: WizardRequest,
        step: Option<&str>,
    ) -> Result<WizardResponse, WizardError> {
        self.cycle(request, step)?.handle_request()
    }
}

impl fmt::Debug for WizardDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WizardDefinition")
            .field("base_route", &self.inner.base_route)
            .field("steps", &self.inner.steps)
            .field("navigation", &self.inner.navigation)
            .field("redirect_args", &self.inner.redirect_args)
            .field("signal_handlers", &self.inner.signals.handler_count())
            .finish()
    }
}

/// Builder for [`WizardDefinition`]
pub struct WizardBuilder {
    base_route: String,
    steps: StepSource,
    navigation: NavigationConfig,
    step_args: StepArgs,
    redirect_args: RedirectArgs,
    extra_context: ViewData,
    signals: Signals,
    messages: Option<Arc<dyn MessageSink>>,
    urls: Option<Arc<dyn UrlBuilder>>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl WizardBuilder {
    pub fn new(base_route: impl Into<String>, steps: StepSource) -> Self {
        Self {
            base_route: base_route.into(),
            steps,
            navigation: NavigationConfig::default(),
            step_args: StepArgs::default(),
            redirect_args: RedirectArgs::None,
            extra_context: ViewData::new(),
            signals: Signals::new(),
            messages: None,
            urls: None,
            renderer: None,
        }
    }

    pub fn navigation(mut self, navigation: NavigationConfig) -> Self {
        self.navigation = navigation;
        self
    }

    /// Arguments passed to every step factory
    pub fn step_args(mut self, args: StepArgs) -> Self {
        self.step_args = args;
        self
    }

    /// Extra arguments used when reversing redirect URLs
    pub fn redirect_args(mut self, args: RedirectArgs) -> Self {
        self.redirect_args = args;
        self
    }

    /// Values added to every step's template data
    pub fn extra_context(mut self, context: ViewData) -> Self {
        self.extra_context = context;
        self
    }

    pub fn signal_handler(mut self, handler: Arc<dyn SignalHandler>) -> Self {
        self.signals.connect(handler);
        self
    }

    pub fn messages(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.messages = Some(sink);
        self
    }

    pub fn urls(mut self, urls: Arc<dyn UrlBuilder>) -> Self {
        self.urls = Some(urls);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Finish the definition.
    ///
    /// Without a URL builder, `base_route` is reversed as `/{base_route}/{step}`,
    /// or `/{step}` when the base route is empty.
    pub fn build(self) -> Result<WizardDefinition, WizardError> {
        let urls: Arc<dyn UrlBuilder> = match self.urls {
            Some(urls) => urls,
            None => {
                let pattern = match self.base_route.trim_matches('/') {
                    "" => "/{step}".to_string(),
                    base => format!("/{base}/{{step}}"),
                };
                Arc::new(RouteTable::new().route(self.base_route.clone(), &pattern)?)
            }
        };
        let renderer: Arc<dyn TemplateRenderer> = match self.renderer {
            Some(renderer) => renderer,
            None => Arc::new(HandlebarsRenderer::new()),
        };

        Ok(WizardDefinition {
            inner: Arc::new(DefinitionInner {
                base_route: self.base_route,
                steps: self.steps,
                navigation: self.navigation,
                step_args: self.step_args,
                redirect_args: self.redirect_args,
                extra_context: self.extra_context,
                signals: self.signals,
                messages: self.messages,
                urls,
                renderer,
            }),
        })
    }
}

/// One request-handling cycle.
///
/// Owns the registry and step cache for the cycle; build a new one per request.
pub struct Wizard {
    definition: WizardDefinition,
    cache: StepCache,
    extra_context: ViewData,
}

impl Wizard {
    pub fn definition(&self) -> &WizardDefinition {
        &self.definition
    }

    pub fn request(&self) -> &WizardRequest {
        self.cache.request()
    }

    /// Step key the user asked for in this cycle
    pub fn requested_step(&self) -> Option<&str> {
        self.cache.current_step()
    }

    pub fn registry(&self) -> &StepRegistry {
        self.cache.registry()
    }

    /// Step instance for `key`, constructed on first use
    pub fn step(&self, key: &str) -> Result<StepHandle, WizardError> {
        self.cache.get(key)
    }

    /// Whether the step for `key` has been constructed in this cycle
    pub fn is_constructed(&self, key: &str) -> bool {
        self.cache.is_materialized(key)
    }

    /// Instance of the requested step
    pub fn current_step(&self) -> Result<Option<StepHandle>, WizardError> {
        self.requested_step().map(|key| self.step(key)).transpose()
    }

    /// Every step key with its instance, constructing all of them
    pub fn steps(&self) -> Result<Vec<(String, StepHandle)>, WizardError> {
        self.registry()
            .keys()
            .map(|key| self.step(key).map(|step| (key.to_string(), step)))
            .collect()
    }

    /// One-based position of `key`
    pub fn step_number(&self, key: &str) -> Result<usize, WizardError> {
        Ok(self.registry().position_of(key)? + 1)
    }

    pub fn total_steps(&self) -> usize {
        self.registry().len()
    }

    /// Add values to the template data of this cycle only
    pub fn extend_context(&mut self, context: ViewData) {
        self.extra_context.extend(context);
    }

    /// Decide what to do with the request
    pub fn handle(&self) -> Result<Outcome, WizardError> {
        let Some(step) = self.requested_step() else {
            return Ok(Outcome::Redirect {
                step: self.registry().first_key().to_string(),
            });
        };

        if self.request().is_submit() {
            self.submit(step)
        } else {
            self.fetch(step)
        }
    }

    /// Handle the request and render or build the redirect for its outcome
    pub fn handle_request(&self) -> Result<WizardResponse, WizardError> {
        let outcome = self.handle()?;
        self.respond(outcome)
    }

    fn submit(&self, step: &str) -> Result<Outcome, WizardError> {
        let instance = self.step(step)?;
        let cx = StepContext::new(step, self);

        self.send_signal(WizardSignal::PreSave, step);
        if let Err(e) = instance.save(&cx) {
            tracing::debug!(step, error = %e, "Save rejected, redisplaying step");
            return Ok(Outcome::Render {
                step: step.to_string(),
                data: self.display_payload(step)?,
            });
        }
        self.send_signal(WizardSignal::PostSave, step);

        let resolution = self.navigate(step)?;
        Ok(Outcome::Redirect {
            step: resolution.step,
        })
    }

    fn fetch(&self, step: &str) -> Result<Outcome, WizardError> {
        let resolution = self.navigate(step)?;
        if resolution.redirect {
            return Ok(Outcome::Redirect {
                step: resolution.step,
            });
        }

        let data = self.display_payload(&resolution.step)?;
        Ok(Outcome::Render {
            step: resolution.step,
            data,
        })
    }

    /// Where a request made from `step` should end up
    pub fn navigate(&self, step: &str) -> Result<Resolution, WizardError> {
        let (candidate, direction) =
            self.definition
                .navigation()
                .resolve(self.registry(), self.request(), step)?;
        PrereqResolver::new(self).resolve(&candidate, direction)
    }

    /// Template data for `key`: the step's own data plus wizard context
    pub fn display_payload(&self, key: &str) -> Result<ViewData, WizardError> {
        let instance = self.step(key)?;
        let cx = StepContext::new(key, self);

        self.send_signal(WizardSignal::PreDisplay, key);
        let data = instance.display(&cx);
        self.send_signal(WizardSignal::PostDisplay, key);

        self.add_wizard_data(data, key)
    }

    fn add_wizard_data(&self, mut data: ViewData, key: &str) -> Result<ViewData, WizardError> {
        for (name, value) in self
            .definition
            .inner
            .extra_context
            .iter()
            .chain(self.extra_context.iter())
        {
            data.insert(name.clone(), value.clone());
        }

        let step_number = self.step_number(key)?;
        data.insert("step_key".into(), json!(key));
        data.insert("step_number".into(), json!(step_number));
        data.insert("total_steps".into(), json!(self.total_steps()));
        data.insert("wizard".into(), self.summary());
        Ok(data)
    }

    /// Wizard state exposed to templates for building navigation
    fn summary(&self) -> Value {
        json!({
            "base_route": self.definition.base_route(),
            "current_step": self.requested_step(),
            "steps": self.registry().keys().collect::<Vec<_>>(),
            "total_steps": self.total_steps(),
        })
    }

    /// Step reached by moving `direction` from the requested step, or `None`
    /// when prerequisites keep the user where they are
    pub fn move_step(&self, direction: i32) -> Result<Option<String>, WizardError> {
        let Some(current) = self.requested_step() else {
            return Ok(None);
        };

        let candidate = self.registry().offset(current, direction)?.to_string();
        let resolution = PrereqResolver::new(self).resolve(&candidate, direction)?;
        Ok((resolution.step != current).then_some(resolution.step))
    }

    pub fn next_step_url(&self) -> Result<Option<String>, WizardError> {
        self.move_step_url(1)
    }

    pub fn prev_step_url(&self) -> Result<Option<String>, WizardError> {
        self.move_step_url(-1)
    }

    fn move_step_url(&self, direction: i32) -> Result<Option<String>, WizardError> {
        self.move_step(direction)?
            .map(|step| self.url_for(&step))
            .transpose()
    }

    /// Redirect URL for `step`
    pub fn url_for(&self, step: &str) -> Result<String, WizardError> {
        let inner = &self.definition.inner;
        Ok(inner
            .urls
            .build_url(&inner.base_route, step, &inner.redirect_args)?)
    }

    /// Turn an outcome into a rendered page or a redirect location
    pub fn respond(&self, outcome: Outcome) -> Result<WizardResponse, WizardError> {
        match outcome {
            Outcome::Redirect { step } => {
                let location = self.url_for(&step)?;
                tracing::debug!(step = %step, location = %location, "Redirecting");
                Ok(WizardResponse::Redirect { step, location })
            }
            Outcome::Render { step, data } => {
                let instance = self.step(&step)?;
                let cx = StepContext::new(&step, self);
                let template = instance.template(&cx);
                let body = self
                    .definition
                    .inner
                    .renderer
                    .render(&template, &data)
                    .map_err(|source| WizardError::Render {
                        step: step.clone(),
                        source,
                    })?;
                let content_type = instance
                    .response_kind()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();

                Ok(WizardResponse::Page {
                    step,
                    body,
                    content_type,
                })
            }
        }
    }

    pub(crate) fn send_signal(&self, signal: WizardSignal, step_key: &str) {
        self.definition.inner.signals.send(self, signal, step_key);
    }

    pub(crate) fn add_message(&self, level: MessageLevel, message: &str) {
        match &self.definition.inner.messages {
            Some(sink) => sink.add_message(self.request(), level, message),
            None => tracing::debug!(text = message, "No message sink configured, dropping message"),
        }
    }
}

impl fmt::Debug for Wizard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wizard")
            .field("base_route", &self.definition.base_route())
            .field("requested_step", &self.requested_step())
            .field("steps", &self.registry().keys().collect::<Vec<_>>())
            .finish()
    }
}
