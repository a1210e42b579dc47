//! Template rendering for step pages

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde_json::Value;

use super::request::ViewData;
use super::step::StepTemplate;

/// File extension of templates loaded from a directory
pub const TEMPLATE_EXTENSION: &str = "hbs";

/// Renders a step template with its view data
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &StepTemplate, data: &ViewData) -> Result<String>;
}

/// Handlebars-based renderer
pub struct HandlebarsRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        Self { handlebars }
    }

    /// Register a named template
    pub fn register(&mut self, name: &str, source: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, source)
            .with_context(|| format!("Failed to register template '{}'", name))
    }

    /// Register every `*.hbs` file in `dir` under its file stem
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read template directory {}", dir.display()))?;

        let mut count = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template {}", path.display()))?;
            self.register(name, &source)?;
            count += 1;
        }

        tracing::debug!(dir = %dir.display(), count, "Loaded templates");
        Ok(count)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, template: &StepTemplate, data: &ViewData) -> Result<String> {
        let data = Value::Object(data.clone());
        match template {
            StepTemplate::Named(name) => self
                .handlebars
                .render(name, &data)
                .with_context(|| format!("Failed to render template '{}'", name)),
            StepTemplate::Inline(source) => self
                .handlebars
                .render_template(source, &data)
                .context("Failed to render inline template"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn data() -> ViewData {
        let mut data = ViewData::new();
        data.insert("step_key".into(), json!("first"));
        data.insert("items".into(), json!([1, 2, 3]));
        data
    }

    #[test]
    fn test_render_inline() {
        let renderer = HandlebarsRenderer::new();
        let body = renderer
            .render(
                &StepTemplate::inline("Step: {{step_key}}{{#each items}} {{this}}{{/each}}"),
                &data(),
            )
            .unwrap();
        assert_eq!(body, "Step: first 1 2 3");
    }

    #[test]
    fn test_render_named() {
        let mut renderer = HandlebarsRenderer::new();
        renderer.register("page", "<h1>{{step_key}}</h1>").unwrap();
        let body = renderer
            .render(&StepTemplate::named("page"), &data())
            .unwrap();
        assert_eq!(body, "<h1>first</h1>");
    }

    #[test]
    fn test_missing_named_template_fails() {
        let renderer = HandlebarsRenderer::new();
        assert!(renderer
            .render(&StepTemplate::named("nope"), &data())
            .is_err());
    }

    #[test]
    fn test_missing_values_render_empty() {
        let renderer = HandlebarsRenderer::new();
        let body = renderer
            .render(&StepTemplate::inline("[{{not_there}}]"), &data())
            .unwrap();
        assert_eq!(body, "[]");
    }

    #[test]
    fn test_load_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("contact.hbs"), "contact {{step_key}}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut renderer = HandlebarsRenderer::new();
        let count = renderer.load_directory(dir.path()).unwrap();

        assert_eq!(count, 1);
        assert!(renderer.has_template("contact"));
        assert!(!renderer.has_template("notes"));
    }
}
