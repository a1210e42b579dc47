//! Sample three-step signup flow served by the binary.
//!
//! `contact` and `address` collect form fields, `confirm` shows a summary and
//! marks the submission as done. Later steps require the earlier ones to be
//! saved first, and the back button leaves the current page unsaved.
//! Submissions live in memory only.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::WizardConfig;
use crate::wizard::{
    HandlebarsRenderer, MessageLog, PrereqMissing, SaveStepError, StepContext, StepDefinition,
    StepSource, StepTemplate, TracingSignalHandler, ViewData, WizardDefinition, WizardStep,
};

const FORM_TEMPLATE: &str = include_str!("templates/form.hbs");
const CONFIRM_TEMPLATE: &str = include_str!("templates/confirm.hbs");

/// Data collected by the flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub confirmed: bool,
}

impl Submission {
    pub fn has_contact(&self) -> bool {
        !self.name.is_empty() && !self.email.is_empty()
    }

    pub fn has_address(&self) -> bool {
        !self.address.is_empty() && !self.city.is_empty()
    }
}

/// In-memory store for the single submission the sample collects
#[derive(Debug, Default)]
pub struct SubmissionStore {
    submission: Mutex<Submission>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Submission {
        self.submission
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn update(&self, apply: impl FnOnce(&mut Submission)) -> Result<(), SaveStepError> {
        let mut submission = self
            .submission
            .lock()
            .map_err(|_| SaveStepError::new("submission store is unavailable"))?;
        apply(&mut submission);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    Contact,
    Address,
    Confirm,
}

impl StepKind {
    const ALL: [StepKind; 3] = [StepKind::Contact, StepKind::Address, StepKind::Confirm];

    fn key(self) -> &'static str {
        match self {
            StepKind::Contact => "contact",
            StepKind::Address => "address",
            StepKind::Confirm => "confirm",
        }
    }

    fn title(self) -> &'static str {
        match self {
            StepKind::Contact => "Who are you?",
            StepKind::Address => "Where do you live?",
            StepKind::Confirm => "Check your details",
        }
    }

    /// (form field, label) pairs
    fn fields(self) -> &'static [(&'static str, &'static str)] {
        match self {
            StepKind::Contact => &[("name", "Name"), ("email", "Email")],
            StepKind::Address => &[("address", "Address"), ("city", "City")],
            StepKind::Confirm => &[],
        }
    }
}

/// One page of the sample flow
struct SampleStep {
    kind: StepKind,
    store: Arc<SubmissionStore>,
    /// Validation error from a rejected save, shown on the re-render
    error: Mutex<Option<String>>,
}

impl SampleStep {
    fn new(kind: StepKind, store: Arc<SubmissionStore>) -> Self {
        Self {
            kind,
            store,
            error: Mutex::new(None),
        }
    }

    fn reject(&self, message: &str) -> SaveStepError {
        if let Ok(mut error) = self.error.lock() {
            *error = Some(message.to_string());
        }
        SaveStepError::new(message)
    }

    fn field_value(submission: &Submission, field: &str) -> String {
        match field {
            "name" => submission.name.clone(),
            "email" => submission.email.clone(),
            "address" => submission.address.clone(),
            "city" => submission.city.clone(),
            _ => String::new(),
        }
    }
}

impl WizardStep for SampleStep {
    fn display(&self, cx: &StepContext<'_>) -> ViewData {
        let submission = self.store.snapshot();
        let request = cx.request();

        // Re-renders after a failed save show what the user just typed
        let fields: Vec<_> = self
            .kind
            .fields()
            .iter()
            .map(|(name, label)| {
                let value = request
                    .param(name)
                    .map(str::to_string)
                    .unwrap_or_else(|| Self::field_value(&submission, name));
                json!({ "name": name, "label": label, "value": value })
            })
            .collect();

        let mut data = ViewData::new();
        data.insert("title".into(), json!(self.kind.title()));
        data.insert("fields".into(), json!(fields));
        data.insert("submission".into(), json!(submission));
        if let Some(error) = self.error.lock().ok().and_then(|e| e.clone()) {
            data.insert("error".into(), json!(error));
        }
        data
    }

    fn save(&self, cx: &StepContext<'_>) -> Result<(), SaveStepError> {
        let request = cx.request();
        let value = |name: &str| request.param(name).unwrap_or_default().trim().to_string();

        // Going back never validates or stores the current page
        if request.has_param("wizard_previous") {
            return Ok(());
        }

        match self.kind {
            StepKind::Contact => {
                let (name, email) = (value("name"), value("email"));
                if name.is_empty() {
                    return Err(self.reject("Please enter your name"));
                }
                if !email.contains('@') {
                    return Err(self.reject("Please enter a valid email address"));
                }
                self.store.update(|s| {
                    s.name = name;
                    s.email = email;
                })
            }
            StepKind::Address => {
                let (address, city) = (value("address"), value("city"));
                if address.is_empty() || city.is_empty() {
                    return Err(self.reject("Please enter both address and city"));
                }
                self.store.update(|s| {
                    s.address = address;
                    s.city = city;
                })
            }
            StepKind::Confirm => {
                let submission = self.store.snapshot();
                if !submission.has_contact() || !submission.has_address() {
                    return Err(self.reject("Some of your details are still missing"));
                }
                self.store.update(|s| s.confirmed = true)?;
                tracing::info!("Submission confirmed");
                Ok(())
            }
        }
    }

    fn prereq(&self, _cx: &StepContext<'_>) -> Result<(), PrereqMissing> {
        let submission = self.store.snapshot();
        match self.kind {
            StepKind::Contact => Ok(()),
            StepKind::Address if !submission.has_contact() => Err(PrereqMissing::redirect_to(
                StepKind::Contact.key(),
            )
            .with_message("Tell us who you are first")),
            StepKind::Confirm if !submission.has_address() => Err(PrereqMissing::redirect_to(
                StepKind::Address.key(),
            )
            .with_message("We still need your address")),
            StepKind::Confirm if !submission.has_contact() => Err(PrereqMissing::redirect_to(
                StepKind::Contact.key(),
            )
            .with_message("Tell us who you are first")),
            _ => Ok(()),
        }
    }

    fn template(&self, _cx: &StepContext<'_>) -> StepTemplate {
        match self.kind {
            StepKind::Confirm => StepTemplate::named("confirm"),
            _ => StepTemplate::named("form"),
        }
    }
}

/// The sample wizard and the collaborators the server needs access to
#[derive(Debug, Clone)]
pub struct SampleWizard {
    pub definition: WizardDefinition,
    pub messages: Arc<MessageLog>,
    pub store: Arc<SubmissionStore>,
}

/// Renderer with the built-in templates, overridden by any in `template_dir`
pub fn renderer(template_dir: Option<&Path>) -> Result<HandlebarsRenderer> {
    let mut renderer = HandlebarsRenderer::new();
    renderer.register("form", FORM_TEMPLATE)?;
    renderer.register("confirm", CONFIRM_TEMPLATE)?;

    if let Some(dir) = template_dir {
        let count = renderer.load_directory(dir)?;
        tracing::info!(dir = %dir.display(), count, "Loaded template overrides");
    }

    Ok(renderer)
}

/// Step keys of the sample flow, in order
pub fn step_keys() -> Vec<&'static str> {
    StepKind::ALL.iter().map(|k| k.key()).collect()
}

/// Build the sample wizard from config
pub fn build(config: &WizardConfig) -> Result<SampleWizard> {
    let store = Arc::new(SubmissionStore::new());
    let messages = Arc::new(MessageLog::new());

    let steps = StepKind::ALL
        .iter()
        .map(|&kind| {
            let store = store.clone();
            StepDefinition::factory(kind.key(), move |_init| {
                Ok(SampleStep::new(kind, store.clone()))
            })
        })
        .collect();

    let template_dir = config.template_dir.as_deref().map(Path::new);
    let definition = WizardDefinition::builder(config.base_route.clone(), StepSource::fixed(steps))
        .navigation(config.navigation.clone())
        .renderer(Arc::new(renderer(template_dir)?))
        .messages(messages.clone())
        .signal_handler(Arc::new(TracingSignalHandler))
        .build()?;

    Ok(SampleWizard {
        definition,
        messages,
        store,
    })
}
