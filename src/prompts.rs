//! Prompt templates for each task
//!
//! Built-in templates are compiled in from `prompts/*.txt`. A configured
//! override directory wins for any `<name>.txt` it contains.

use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    ("audit", include_str!("../prompts/audit.txt")),
    ("code_review", include_str!("../prompts/code_review.txt")),
    ("merge_request", include_str!("../prompts/merge_request.txt")),
];

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Unknown prompt template '{0}'")]
    Unknown(String),
    #[error("Failed to read prompt override '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
}

impl PromptLibrary {
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        Self { override_dir }
    }

    /// Names of the built-in templates
    pub fn names() -> impl Iterator<Item = &'static str> {
        BUILTIN_PROMPTS.iter().map(|(name, _)| *name)
    }

    /// Raw template text for `name`
    pub fn load(&self, name: &str) -> Result<String, PromptError> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.txt", name));
            if path.is_file() {
                let content =
                    fs::read_to_string(&path).map_err(|source| PromptError::Read {
                        path: path.clone(),
                        source,
                    })?;
                info!("Prompt '{}' loaded from {} ({} chars)", name, path.display(), content.len());
                return Ok(content);
            }
        }

        let content = BUILTIN_PROMPTS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, text)| text.to_string())
            .ok_or_else(|| PromptError::Unknown(name.to_string()))?;
        debug!("Prompt '{}' loaded ({} chars)", name, content.len());
        Ok(content)
    }
}

/// Substitute `{model_name}` and `{repo_url}`. Any other braces are left as-is.
pub fn render_prompt(template: &str, model_name: &str, repo_url: Option<&str>) -> String {
    template
        .replace("{model_name}", model_name)
        .replace("{repo_url}", repo_url.unwrap_or(""))
}
