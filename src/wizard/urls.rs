//! Redirect URL construction.
//!
//! The wizard only knows a route name and the step key; turning those into a
//! URL is delegated to a [`UrlBuilder`]. [`RouteTable`] is a small reversible
//! route table with `{name}` and `{}` placeholders.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::error::WizardError;

/// Parameter name the step key is passed under for keyword reversal
pub const STEP_PARAM: &str = "step";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)?\}").expect("placeholder regex"));

/// Errors raised while reversing a route
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("no route named '{0}'")]
    UnknownRoute(String),

    #[error("cannot reverse route '{route}': {reason}")]
    NoReverseMatch { route: String, reason: String },

    #[error("invalid route pattern '{0}'")]
    InvalidPattern(String),
}

/// Extra arguments used to build redirect URLs; positional or keyword, never both
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RedirectArgs {
    #[default]
    None,
    Positional(Vec<String>),
    Keyword(BTreeMap<String, String>),
}

impl RedirectArgs {
    /// Build from both kinds of arguments, rejecting a mix of the two
    pub fn new(
        positional: Vec<String>,
        keyword: BTreeMap<String, String>,
    ) -> Result<Self, WizardError> {
        match (positional.is_empty(), keyword.is_empty()) {
            (false, false) => Err(WizardError::InvalidRedirectArgs),
            (false, true) => Ok(RedirectArgs::Positional(positional)),
            (true, false) => Ok(RedirectArgs::Keyword(keyword)),
            (true, true) => Ok(RedirectArgs::None),
        }
    }

    pub fn positional<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RedirectArgs::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn keyword<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RedirectArgs::Keyword(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Arguments with the step key added: appended positionally, or as `step`
    pub fn with_step(&self, step_key: &str) -> RedirectArgs {
        match self {
            RedirectArgs::Positional(values) => {
                let mut values = values.clone();
                values.push(step_key.to_string());
                RedirectArgs::Positional(values)
            }
            RedirectArgs::Keyword(pairs) => {
                let mut pairs = pairs.clone();
                pairs.insert(STEP_PARAM.to_string(), step_key.to_string());
                RedirectArgs::Keyword(pairs)
            }
            RedirectArgs::None => RedirectArgs::keyword([(STEP_PARAM, step_key)]),
        }
    }
}

/// Turns a route name plus arguments into a URL
pub trait UrlBuilder: Send + Sync {
    fn reverse(&self, route: &str, args: &RedirectArgs) -> Result<String, UrlError>;

    /// URL for `step_key` under `route`
    fn build_url(
        &self,
        route: &str,
        step_key: &str,
        args: &RedirectArgs,
    ) -> Result<String, UrlError> {
        self.reverse(route, &args.with_step(step_key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Named(String),
    Positional,
}

/// A parsed route pattern such as `/wizard/{id}/{step}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    pattern: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, UrlError> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(pattern) {
            let whole = caps.get(0).ok_or_else(|| UrlError::InvalidPattern(pattern.into()))?;
            if whole.start() > last {
                segments.push(Segment::Literal(pattern[last..whole.start()].to_string()));
            }
            segments.push(match caps.get(1) {
                Some(name) => Segment::Named(name.as_str().to_string()),
                None => Segment::Positional,
            });
            last = whole.end();
        }
        if last < pattern.len() {
            segments.push(Segment::Literal(pattern[last..].to_string()));
        }

        let literal_text: String = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Literal(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if literal_text.contains('{') || literal_text.contains('}') {
            return Err(UrlError::InvalidPattern(pattern.into()));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| !matches!(s, Segment::Literal(_)))
            .count()
    }

    fn reverse(&self, route: &str, args: &RedirectArgs) -> Result<String, UrlError> {
        let no_match = |reason: String| UrlError::NoReverseMatch {
            route: route.to_string(),
            reason,
        };

        let mut url = String::with_capacity(self.pattern.len());
        match args {
            RedirectArgs::Keyword(pairs) => {
                let mut names = BTreeSet::new();
                for segment in &self.segments {
                    match segment {
                        Segment::Literal(text) => url.push_str(text),
                        Segment::Named(name) => {
                            let value = pairs
                                .get(name)
                                .ok_or_else(|| no_match(format!("missing argument '{}'", name)))?;
                            url.push_str(value);
                            names.insert(name.as_str());
                        }
                        Segment::Positional => {
                            return Err(no_match(
                                "pattern has unnamed placeholders, use positional arguments"
                                    .to_string(),
                            ))
                        }
                    }
                }
                if let Some(extra) = pairs.keys().find(|k| !names.contains(k.as_str())) {
                    return Err(no_match(format!("unexpected argument '{}'", extra)));
                }
            }
            RedirectArgs::Positional(values) => {
                if values.len() != self.placeholder_count() {
                    return Err(no_match(format!(
                        "expected {} arguments, got {}",
                        self.placeholder_count(),
                        values.len()
                    )));
                }
                let mut values = values.iter();
                for segment in &self.segments {
                    match segment {
                        Segment::Literal(text) => url.push_str(text),
                        Segment::Named(_) | Segment::Positional => {
                            if let Some(value) = values.next() {
                                url.push_str(value);
                            }
                        }
                    }
                }
            }
            RedirectArgs::None => {
                if self.placeholder_count() > 0 {
                    return Err(no_match("pattern requires arguments".to_string()));
                }
                url.push_str(&self.pattern);
            }
        }

        Ok(url)
    }
}

/// Named route patterns that can be reversed into URLs
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, RoutePattern>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pattern` under `name`, replacing any earlier route
    pub fn route(mut self, name: impl Into<String>, pattern: &str) -> Result<Self, UrlError> {
        self.routes.insert(name.into(), RoutePattern::parse(pattern)?);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&RoutePattern> {
        self.routes.get(name)
    }
}

impl UrlBuilder for RouteTable {
    fn reverse(&self, route: &str, args: &RedirectArgs) -> Result<String, UrlError> {
        self.routes
            .get(route)
            .ok_or_else(|| UrlError::UnknownRoute(route.to_string()))?
            .reverse(route, args)
    }
}
