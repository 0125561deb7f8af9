//! Adapter between the HTTP layer and the tokenizer capability.
//!
//! Owns the loaded [`HfTokenizer`] and exposes exactly the operations the
//! endpoints need. Encode/decode calls are serialized through a mutex;
//! the underlying tokenizer is not assumed safe for concurrent use.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::Value;

use crate::tokenizer::HfTokenizer;

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Tokenization operations backing the HTTP endpoints.
pub struct TokenizerAdapter {
    inner: Mutex<HfTokenizer>,
    bos_token_id: Option<u32>,
    eos_token_id: Option<u32>,
}

impl TokenizerAdapter {
    pub fn new(tokenizer: HfTokenizer) -> Self {
        // The special ids never change after load.
        let bos_token_id = tokenizer.bos_token_id();
        let eos_token_id = tokenizer.eos_token_id();
        Self {
            inner: Mutex::new(tokenizer),
            bos_token_id,
            eos_token_id,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HfTokenizer>> {
        self.inner.lock().map_err(|_| anyhow!("tokenizer lock poisoned"))
    }

    /// Encode raw text as a user turn, optionally preceded by a system
    /// turn. An empty `system_content` omits the system turn entirely;
    /// empty `text` is valid input.
    pub fn encode_from_text(
        &self,
        text: &str,
        system_content: &str,
        add_generation_prompt: bool,
    ) -> Result<Vec<u32>> {
        let mut messages = Vec::with_capacity(2);
        if !system_content.is_empty() {
            messages.push(Message::new("system", system_content));
        }
        messages.push(Message::new("user", text));

        let tokenizer = self.lock()?;
        let rendered = tokenizer.apply_chat_template(&messages, add_generation_prompt)?;
        tokenizer.encode(&rendered)
    }

    /// Encode a caller-supplied message list as-is. Malformed entries are
    /// the template engine's to reject; its errors propagate unmodified.
    pub fn encode_from_messages(
        &self,
        messages: &Value,
        add_generation_prompt: bool,
    ) -> Result<Vec<u32>> {
        let tokenizer = self.lock()?;
        let rendered = tokenizer.apply_chat_template(messages, add_generation_prompt)?;
        tokenizer.encode(&rendered)
    }

    /// Decode token ids back to text. Ids arrive as signed integers from
    /// the wire; anything outside the tokenizer's id space is a decode
    /// failure, not a protocol error.
    pub fn decode(&self, token_ids: &[i64]) -> Result<String> {
        let ids = token_ids
            .iter()
            .map(|&id| u32::try_from(id).map_err(|_| anyhow!("invalid token id: {id}")))
            .collect::<Result<Vec<u32>>>()?;
        self.lock()?.decode(&ids)
    }

    /// BOS id, or `-1` when the tokenizer has none.
    pub fn bos_id(&self) -> i64 {
        self.bos_token_id.map_or(-1, i64::from)
    }

    /// EOS id, or `-1` when the tokenizer has none.
    pub fn eos_id(&self) -> i64 {
        self.eos_token_id.map_or(-1, i64::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::test_support::*;
    use crate::tokenizer::HfTokenizer;
    use serde_json::json;

    fn adapter() -> TokenizerAdapter {
        TokenizerAdapter::new(fixture_tokenizer())
    }

    #[test]
    fn test_special_ids() {
        let adapter = adapter();
        assert_eq!(adapter.bos_id(), 0);
        assert_eq!(adapter.eos_id(), 1);
    }

    #[test]
    fn test_missing_special_id_maps_to_sentinel() {
        let dir = write_model_dir(None);
        let adapter = TokenizerAdapter::new(HfTokenizer::from_dir(dir.path()).unwrap());
        assert_eq!(adapter.bos_id(), -1);
        assert_eq!(adapter.eos_id(), 1);
    }

    #[test]
    fn test_encode_from_text_without_system() {
        let ids = adapter().encode_from_text("hello", "", false).unwrap();
        assert_eq!(ids, vec![IM_START, USER, HELLO, IM_END]);
    }

    #[test]
    fn test_encode_from_text_with_system() {
        let ids = adapter()
            .encode_from_text("hello", "you are a test", false)
            .unwrap();
        assert_eq!(
            ids,
            vec![
                IM_START, SYSTEM, 10, 11, 12, 13, IM_END, IM_START, USER, HELLO, IM_END
            ]
        );
    }

    #[test]
    fn test_encode_from_text_empty_text_is_ok() {
        let ids = adapter().encode_from_text("", "", false).unwrap();
        assert_eq!(ids, vec![IM_START, USER, IM_END]);
    }

    #[test]
    fn test_encode_from_text_generation_prompt_appends() {
        let adapter = adapter();
        let without = adapter.encode_from_text("hello", "", false).unwrap();
        let with = adapter.encode_from_text("hello", "", true).unwrap();
        assert_eq!(with[..without.len()], without[..]);
        assert_eq!(with[without.len()..], [IM_START, ASSISTANT]);
    }

    #[test]
    fn test_encode_from_messages_matches_equivalent_text() {
        let adapter = adapter();
        let messages = json!([{"role": "user", "content": "hello"}]);
        let from_messages = adapter.encode_from_messages(&messages, true).unwrap();
        let from_text = adapter.encode_from_text("hello", "", true).unwrap();
        assert_eq!(from_messages, from_text);
    }

    #[test]
    fn test_encode_from_messages_bad_role_propagates() {
        let messages = json!([{"role": "alien", "content": "hello"}]);
        let err = adapter().encode_from_messages(&messages, true).unwrap_err();
        assert!(format!("{err:#}").contains("unknown role"));
    }

    #[test]
    fn test_decode_round_trip() {
        let adapter = adapter();
        let ids = adapter.encode_from_text("hello world", "", false).unwrap();
        let signed: Vec<i64> = ids.iter().map(|&id| i64::from(id)).collect();
        let text = adapter.decode(&signed).unwrap();
        assert!(text.contains("hello world"));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(adapter().decode(&[]).unwrap(), "");
    }

    #[test]
    fn test_decode_negative_id_fails() {
        let err = adapter().decode(&[8, -5]).unwrap_err();
        assert!(err.to_string().contains("invalid token id: -5"));
    }
}
