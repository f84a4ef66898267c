//! Rendering of notification titles and bodies with minijinja.

use minijinja::Environment;
use thiserror::Error;

/// A service for rendering templates using the minijinja templating engine.
pub struct TemplateService {
    env: Environment<'static>,
}

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// The template failed to parse or referenced an unknown variable.
    #[error("Failed to render template")]
    RenderError(#[from] minijinja::Error),
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateService {
    /// Creates a service whose templates fail on undefined variables.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        Self { env }
    }

    /// Renders a template with the given context.
    pub fn render(
        &self,
        template_str: &str,
        context: serde_json::Value,
    ) -> Result<String, TemplateServiceError> {
        self.env.render_str(template_str, context).map_err(|e| {
            tracing::warn!(template = template_str, error = %e, "Failed to render template.");
            TemplateServiceError::RenderError(e)
        })
    }
}
