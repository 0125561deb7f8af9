//! Chat-template-aware HTTP tokenizer service.
//!
//! Exposes a loaded HuggingFace tokenizer over a small HTTP/JSON API so that
//! an edge device running model inference can delegate prompt preparation
//! (chat-template formatting + tokenization) and token decoding to this
//! process:
//!
//! ```text
//! Edge device → HTTP → Tokenizer Service → tokenizers + chat template
//! ```
//!
//! # Endpoints
//!
//! - `GET /` - `{"status":"ok","model":"..."}`
//! - `GET /bos_id` - `{"bos_id": <int|-1>}`
//! - `GET /eos_id` - `{"eos_id": <int|-1>}`
//! - `POST /encode` - `{"text":"..."}` or `{"messages":[...]}`, optional
//!   `"system"` and `"add_generation_prompt"`; returns
//!   `{"token_ids":[...], "len":N}`
//! - `POST /decode` - `{"token_ids":[...]}`; returns `{"text":"..."}`
//!
//! # Manual testing
//!
//! ```bash
//! cargo run -- --model_id /path/to/model --port 8080
//! curl -X POST http://localhost:8080/encode \
//!   -H "Content-Type: application/json" \
//!   -d '{"messages": [{"role": "user", "content": "Hello"}]}'
//! ```

pub mod service;
pub mod tokenizer;
