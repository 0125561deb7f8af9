//! Chat-template configuration and rendering.
//!
//! Parses the relevant pieces of a HuggingFace `tokenizer_config.json`
//! (`chat_template`, `bos_token`, `eos_token`) and renders conversations
//! through a minijinja environment set up to accept the Python-flavored
//! Jinja2 that model repositories ship.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{context, Environment, ErrorKind};
use serde::{Deserialize, Serialize};

/// Subset of `tokenizer_config.json` this service cares about.
#[derive(Debug, Default, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub chat_template: Option<ChatTemplateField>,
    #[serde(default)]
    pub bos_token: Option<SpecialToken>,
    #[serde(default)]
    pub eos_token: Option<SpecialToken>,
}

impl TokenizerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Special tokens appear either as a bare string or as an added-token
/// object with a `content` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SpecialToken {
    Plain(String),
    Tagged { content: String },
}

impl SpecialToken {
    pub fn content(&self) -> &str {
        match self {
            SpecialToken::Plain(s) => s,
            SpecialToken::Tagged { content } => content,
        }
    }
}

/// The `chat_template` field is either a single template string or a list
/// of named templates.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatTemplateField {
    Single(String),
    Named(Vec<NamedTemplate>),
}

#[derive(Debug, Deserialize)]
pub struct NamedTemplate {
    pub name: String,
    pub template: String,
}

impl ChatTemplateField {
    /// Select the template to render with: the string form as-is, or the
    /// `default` entry of the named form (first entry when none is named
    /// `default`).
    pub fn default_template(&self) -> Option<&str> {
        match self {
            ChatTemplateField::Single(template) => Some(template),
            ChatTemplateField::Named(templates) => templates
                .iter()
                .find(|t| t.name == "default")
                .or_else(|| templates.first())
                .map(|t| t.template.as_str()),
        }
    }
}

/// Renders a message list into a single prompt string.
///
/// The environment mirrors what HuggingFace templates expect from Python:
/// `trim_blocks`/`lstrip_blocks`, python-style method calls on strings and
/// lists, `raise_exception`, and `strftime_now`.
#[derive(Debug)]
pub struct ChatTemplateRenderer {
    env: Environment<'static>,
    bos_token: String,
    eos_token: String,
}

impl ChatTemplateRenderer {
    pub fn new(template: String, bos_token: String, eos_token: String) -> Result<Self> {
        let mut env = Environment::new();
        env.set_lstrip_blocks(true);
        env.set_trim_blocks(true);
        env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
        env.add_function("raise_exception", raise_exception);
        env.add_function("strftime_now", strftime_now);
        env.add_template_owned("default", template)
            .context("invalid chat template")?;

        Ok(Self {
            env,
            bos_token,
            eos_token,
        })
    }

    /// Render `messages` (anything that serializes to the OpenAI-style
    /// message array) into a prompt string.
    pub fn render<M>(&self, messages: &M, add_generation_prompt: bool) -> Result<String>
    where
        M: Serialize + ?Sized,
    {
        let template = self
            .env
            .get_template("default")
            .context("chat template not registered")?;

        let rendered = template
            .render(context! {
                messages => messages,
                add_generation_prompt => add_generation_prompt,
                bos_token => self.bos_token,
                eos_token => self.eos_token,
            })
            .context("chat template render failed")?;

        Ok(rendered)
    }
}

fn raise_exception(message: String) -> Result<minijinja::Value, minijinja::Error> {
    Err(minijinja::Error::new(ErrorKind::InvalidOperation, message))
}

fn strftime_now(format: String) -> String {
    chrono::Local::now().format(&format).to_string()
}
