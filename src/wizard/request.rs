//! Request and outcome types exchanged with the transport layer

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Data handed to a step's template
pub type ViewData = serde_json::Map<String, Value>;

/// Content type used when a step does not override it
pub const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Whether the incoming request changes state or only reads it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestIntent {
    /// Read-only fetch (GET)
    Fetch,
    /// Mutating form submission (POST)
    Submit,
}

impl RequestIntent {
    /// Map an HTTP method name to an intent.
    /// Returns `None` for methods the wizard does not handle.
    pub fn from_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" => Some(RequestIntent::Fetch),
            "POST" => Some(RequestIntent::Submit),
            _ => None,
        }
    }
}

/// Transport-neutral view of one incoming request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardRequest {
    pub intent: RequestIntent,
    /// Query and form parameters merged; navigation tokens are looked up here
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Opaque transport data passed through to step factories
    #[serde(default)]
    pub context: Value,
}

impl WizardRequest {
    pub fn new(intent: RequestIntent) -> Self {
        Self {
            intent,
            params: BTreeMap::new(),
            context: Value::Null,
        }
    }

    pub fn fetch() -> Self {
        Self::new(RequestIntent::Fetch)
    }

    pub fn submit() -> Self {
        Self::new(RequestIntent::Submit)
    }

    /// Add a navigation token (e.g. `wizard_continue`) with an empty value
    pub fn with_action(self, token: impl Into<String>) -> Self {
        self.with_param(token, "")
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn is_submit(&self) -> bool {
        self.intent == RequestIntent::Submit
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// What the dispatcher decided to do with a request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Show `step` with the given template data
    Render { step: String, data: ViewData },
    /// Send the user to `step`
    Redirect { step: String },
}

impl Outcome {
    pub fn step(&self) -> &str {
        match self {
            Outcome::Render { step, .. } | Outcome::Redirect { step } => step,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Outcome::Redirect { .. })
    }
}

/// An outcome after rendering and URL building
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardResponse {
    Page {
        step: String,
        body: String,
        content_type: String,
    },
    Redirect {
        step: String,
        location: String,
    },
}

impl WizardResponse {
    pub fn step(&self) -> &str {
        match self {
            WizardResponse::Page { step, .. } | WizardResponse::Redirect { step, .. } => step,
        }
    }

    /// Redirect target URL, if this is a redirect
    pub fn location(&self) -> Option<&str> {
        match self {
            WizardResponse::Redirect { location, .. } => Some(location),
            WizardResponse::Page { .. } => None,
        }
    }
}
