//! Template Service: per-type default frontmatter and body content, loaded
//! from `templates/{type}.md` files under the task root.
//!
//! A missing type config or missing template file is not an error, just
//! "no template" — callers fall back to their own defaults.

use crate::config::Config;
use crate::frontmatter::{self, Document};
use serde_yaml::Mapping;
use std::path::PathBuf;
use tracing::warn;

const TEMPLATES_DIR: &str = "templates";

/// Reads type templates from `{task_root}/templates/`.
pub struct TemplateService {
    task_root: PathBuf,
}

impl TemplateService {
    #[must_use]
    pub fn new(task_root: impl Into<PathBuf>) -> Self {
        Self { task_root: task_root.into() }
    }

    #[must_use]
    pub fn templates_path(&self) -> PathBuf {
        self.task_root.join(TEMPLATES_DIR)
    }

    /// Load the template for `type_id`: its frontmatter defaults and body.
    /// Returns `None` if the type is unconfigured, has no template file, or
    /// the file fails to parse.
    #[must_use]
    pub fn get_template(&self, config: &Config, type_id: &str) -> Option<(Mapping, String)> {
        let type_config = config.get_type(type_id)?;
        let template_file = self.templates_path().join(type_config.template_filename());
        if !template_file.exists() {
            return None;
        }

        let contents = match std::fs::read_to_string(&template_file) {
            Ok(c) => c,
            Err(e) => {
                warn!(file = %template_file.display(), error = %e, "failed to read template");
                return None;
            }
        };

        let filename = template_file.file_name().and_then(|n| n.to_str()).unwrap_or("template");
        match frontmatter::parse(&contents, filename) {
            Some(Document { metadata, body }) => Some((metadata, body)),
            None => {
                warn!(file = %template_file.display(), "template has no valid frontmatter, ignoring");
                None
            }
        }
    }
}
