//! Tokenizer capability: a HuggingFace tokenizer plus its chat template.
//!
//! [`HfTokenizer`] wraps the `tokenizers` runtime and the model's chat
//! template into the one opaque capability the HTTP layer needs: render a
//! message list to a prompt string, convert text to token ids and back, and
//! report the special BOS/EOS ids.
//!
//! Loading resolves the configured model source the same way the rest of
//! the inference stack does: a local directory is preferred when it exists,
//! anything else is treated as a hub model id and fetched.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::Serialize;
use tokenizers::Tokenizer;
use tracing::{debug, info};

pub mod chat_template;

pub use chat_template::{ChatTemplateRenderer, TokenizerConfig};

/// Token names probed for BOS/EOS when the model ships no
/// `tokenizer_config.json` at all.
const BOS_FALLBACKS: &[&str] = &["<s>", "<|startoftext|>", "<bos>"];
const EOS_FALLBACKS: &[&str] = &["</s>", "<|endoftext|>", "<|end|>", "<|im_end|>", "<eos>"];

/// A loaded tokenizer with optional chat template and special-token ids.
pub struct HfTokenizer {
    tokenizer: Tokenizer,
    chat_template: Option<ChatTemplateRenderer>,
    bos_token_id: Option<u32>,
    eos_token_id: Option<u32>,
}

impl HfTokenizer {
    /// Load from a local directory if `model_id_or_dir` names one,
    /// otherwise treat it as a remote model id.
    pub fn from_source(model_id_or_dir: &str) -> Result<Self> {
        let path = Path::new(model_id_or_dir);
        if path.is_dir() {
            info!(dir = %path.display(), "loading tokenizer from local directory");
            Self::from_dir(path)
        } else {
            info!(model_id = model_id_or_dir, "fetching tokenizer from model hub");
            Self::from_hub(model_id_or_dir)
        }
    }

    /// Load `tokenizer.json` (required) and `tokenizer_config.json`
    /// (optional) from a local model directory.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let tokenizer_path = dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load {}: {e}", tokenizer_path.display()))?;

        let config_path = dir.join("tokenizer_config.json");
        let config = if config_path.is_file() {
            Some(TokenizerConfig::from_file(&config_path)?)
        } else {
            None
        };

        Self::from_parts(tokenizer, config)
    }

    /// Fetch the same two files from the hub for a remote model id.
    pub fn from_hub(model_id: &str) -> Result<Self> {
        let api = Api::new().context("failed to initialize model hub client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let tokenizer_path = repo
            .get("tokenizer.json")
            .with_context(|| format!("failed to fetch tokenizer.json for '{model_id}'"))?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load {}: {e}", tokenizer_path.display()))?;

        // Not every repository ships a tokenizer_config.json.
        let config = match repo.get("tokenizer_config.json") {
            Ok(path) => Some(TokenizerConfig::from_file(&path)?),
            Err(_) => None,
        };

        Self::from_parts(tokenizer, config)
    }

    /// Assemble the capability from an already-loaded tokenizer and its
    /// optional config: resolve BOS/EOS ids and compile the chat template.
    pub fn from_parts(tokenizer: Tokenizer, config: Option<TokenizerConfig>) -> Result<Self> {
        let (bos_token, eos_token) = match &config {
            // An explicit null in the config means the model has no such
            // token; only probe common names when there is no config.
            Some(cfg) => (
                cfg.bos_token.as_ref().map(|t| t.content().to_string()),
                cfg.eos_token.as_ref().map(|t| t.content().to_string()),
            ),
            None => (
                probe_token(&tokenizer, BOS_FALLBACKS),
                probe_token(&tokenizer, EOS_FALLBACKS),
            ),
        };

        let bos_token_id = bos_token.as_deref().and_then(|t| tokenizer.token_to_id(t));
        let eos_token_id = eos_token.as_deref().and_then(|t| tokenizer.token_to_id(t));
        debug!(?bos_token_id, ?eos_token_id, "resolved special token ids");

        let chat_template = config
            .as_ref()
            .and_then(|c| c.chat_template.as_ref())
            .and_then(|field| field.default_template())
            .map(|template| {
                ChatTemplateRenderer::new(
                    template.to_string(),
                    bos_token.clone().unwrap_or_default(),
                    eos_token.clone().unwrap_or_default(),
                )
            })
            .transpose()?;

        if chat_template.is_none() {
            info!("tokenizer has no chat template; /encode will reject requests");
        }

        Ok(Self {
            tokenizer,
            chat_template,
            bos_token_id,
            eos_token_id,
        })
    }

    /// Render a message list through the model's chat template.
    pub fn apply_chat_template<M>(&self, messages: &M, add_generation_prompt: bool) -> Result<String>
    where
        M: Serialize + ?Sized,
    {
        let renderer = self
            .chat_template
            .as_ref()
            .ok_or_else(|| anyhow!("tokenizer has no chat template configured"))?;
        renderer.render(messages, add_generation_prompt)
    }

    /// Convert text to token ids. Special tokens are not injected here;
    /// the chat template supplies them.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("tokenizer encode error: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Convert token ids back to text, keeping special tokens visible.
    pub fn decode(&self, token_ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(token_ids, false)
            .map_err(|e| anyhow!("tokenizer decode error: {e}"))
    }

    pub fn bos_token_id(&self) -> Option<u32> {
        self.bos_token_id
    }

    pub fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }
}

fn probe_token(tokenizer: &Tokenizer, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|t| tokenizer.token_to_id(t).is_some())
        .map(|t| t.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Synthetic model directory shared by tests across the crate: a tiny
    //! WordLevel vocabulary with ChatML-style markers and a chat template
    //! that honors `add_generation_prompt` and raises on unknown roles.

    use serde_json::json;
    use tempfile::TempDir;

    use super::HfTokenizer;

    pub(crate) const CHAT_TEMPLATE: &str = "{% for message in messages %}\
{% if message.role not in ['system', 'user', 'assistant'] %}\
{{ raise_exception('unknown role: ' ~ message.role) }}\
{% endif %}\
<|im_start|>{{ message.role }} {{ message.content }}<|im_end|> \
{% endfor %}\
{% if add_generation_prompt %}<|im_start|>assistant{% endif %}";

    /// Vocabulary ids used in assertions.
    pub(crate) const IM_START: u32 = 3;
    pub(crate) const IM_END: u32 = 4;
    pub(crate) const SYSTEM: u32 = 5;
    pub(crate) const USER: u32 = 6;
    pub(crate) const ASSISTANT: u32 = 7;
    pub(crate) const HELLO: u32 = 8;

    /// Write a complete model directory; `bos_token = None` produces a
    /// config with an explicit `"bos_token": null`.
    pub(crate) fn write_model_dir(bos_token: Option<&str>) -> TempDir {
        let dir = tempfile::tempdir().unwrap();

        let added = |id: u32, content: &str| {
            json!({
                "id": id,
                "content": content,
                "single_word": false,
                "lstrip": false,
                "rstrip": false,
                "normalized": false,
                "special": true,
            })
        };

        let tokenizer = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                added(0, "<s>"),
                added(1, "</s>"),
                added(3, "<|im_start|>"),
                added(4, "<|im_end|>"),
            ],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {
                    "<s>": 0,
                    "</s>": 1,
                    "<unk>": 2,
                    "<|im_start|>": 3,
                    "<|im_end|>": 4,
                    "system": 5,
                    "user": 6,
                    "assistant": 7,
                    "hello": 8,
                    "world": 9,
                    "you": 10,
                    "are": 11,
                    "a": 12,
                    "test": 13,
                    "こんにちは": 14,
                },
                "unk_token": "<unk>",
            },
        });
        std::fs::write(
            dir.path().join("tokenizer.json"),
            serde_json::to_string_pretty(&tokenizer).unwrap(),
        )
        .unwrap();

        let config = json!({
            "bos_token": bos_token,
            "eos_token": {"content": "</s>"},
            "chat_template": CHAT_TEMPLATE,
        });
        std::fs::write(
            dir.path().join("tokenizer_config.json"),
            serde_json::to_string_pretty(&config).unwrap(),
        )
        .unwrap();

        dir
    }

    pub(crate) fn fixture_tokenizer() -> HfTokenizer {
        let dir = write_model_dir(Some("<s>"));
        HfTokenizer::from_dir(dir.path()).unwrap()
    }
}
