//! Theme engine over a directory of Tera templates.

use std::path::Path;

use anyhow::{Context, Result};
use tera::Tera;
use tracing::debug;

/// Theme engine for rendering pages.
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Create a new theme engine loading templates from the given directory.
    pub fn new(template_dir: &Path) -> Result<Self> {
        let pattern = template_dir.join("**/*.html");
        let pattern_str = pattern
            .to_str()
            .context("invalid template directory path")?;

        let tera = Tera::new(pattern_str).context("failed to initialize Tera templates")?;

        let template_names: Vec<_> = tera.get_template_names().collect();
        debug!(count = template_names.len(), "loaded templates");

        Ok(Self { tera })
    }

    /// Create a theme engine from in-memory templates.
    pub fn from_templates<'a>(
        templates: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .context("failed to parse templates")?;
        Ok(Self { tera })
    }

    /// Render a template by name.
    pub fn render(&self, template: &str, context: &tera::Context) -> Result<String> {
        self.tera
            .render(template, context)
            .with_context(|| format!("failed to render {template}"))
    }
}
