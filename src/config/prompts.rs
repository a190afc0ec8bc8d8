//! Prompt templates for tubeqa.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("placeholder regex is valid"));

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for grounded answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// System instruction. `{{context}}` is replaced with the retrieved transcript text.
    pub system: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a helpful assistant.
ONLY use the following transcript context to answer.
If the context is insufficient, say "I don't know".
Transcript context:
{{context}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are replaced in one left-to-right pass: substituted values
    /// are never scanned again, and unknown placeholders are left as-is.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        PLACEHOLDER_REGEX
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
