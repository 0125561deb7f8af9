//! Request handlers and routing for the tokenizer service.
//!
//! Implements the wire contract consumed by the edge device:
//!
//! | Method | Path       | Response                                |
//! |--------|------------|-----------------------------------------|
//! | GET    | `/`        | `{"status":"ok","model":...}`           |
//! | GET    | `/bos_id`  | `{"bos_id": <int|-1>}`                  |
//! | GET    | `/eos_id`  | `{"eos_id": <int|-1>}`                  |
//! | POST   | `/encode`  | `{"token_ids":[...], "len":N}`          |
//! | POST   | `/decode`  | `{"text":...}`                          |
//!
//! GET paths are matched with trailing slashes stripped; POST paths are
//! matched exactly. Anything else answers 404 `{"error":"not found"}`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::adapter::TokenizerAdapter;

/// Shared, read-only state for all handlers. Built once at startup.
pub struct HandlerState {
    pub adapter: TokenizerAdapter,
    pub default_system: String,
    pub model_name: String,
}

impl HandlerState {
    pub fn new(adapter: TokenizerAdapter, default_system: String, model_name: String) -> Self {
        Self {
            adapter,
            default_system,
            model_name,
        }
    }
}

/// Body of `POST /encode`. `messages` wins over `text`/`system` whenever
/// it is present and a JSON array.
#[derive(Debug, Deserialize)]
pub struct EncodeRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub messages: Option<Value>,
    #[serde(default = "default_true")]
    pub add_generation_prompt: bool,
}

impl Default for EncodeRequest {
    fn default() -> Self {
        Self {
            text: None,
            system: None,
            messages: None,
            add_generation_prompt: true,
        }
    }
}

/// Body of `POST /decode`.
#[derive(Debug, Default, Deserialize)]
pub struct DecodeRequest {
    #[serde(default)]
    pub token_ids: Vec<i64>,
}

fn default_true() -> bool {
    true
}

/// Build the route table. Middleware (CORS, timeout, server header) is
/// layered on by the server.
pub fn router(state: Arc<HandlerState>) -> Router {
    Router::new()
        .route("/", get(status_handler).post(not_found_handler))
        .route("/bos_id", get(bos_id_handler).post(not_found_handler))
        .route("/eos_id", get(eos_id_handler).post(not_found_handler))
        .route("/encode", post(encode_handler).get(not_found_handler))
        .route("/decode", post(decode_handler).get(not_found_handler))
        .fallback(fallback_handler)
        .with_state(state)
}

pub async fn status_handler(State(state): State<Arc<HandlerState>>) -> Response {
    status_response(&state)
}

pub async fn bos_id_handler(State(state): State<Arc<HandlerState>>) -> Response {
    bos_id_response(&state)
}

pub async fn eos_id_handler(State(state): State<Arc<HandlerState>>) -> Response {
    eos_id_response(&state)
}

pub async fn not_found_handler() -> Response {
    not_found()
}

/// Catch-all for everything the route table misses. GET paths get a second
/// chance with trailing slashes stripped; POST paths do not.
pub async fn fallback_handler(
    State(state): State<Arc<HandlerState>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method == Method::GET {
        return match uri.path().trim_end_matches('/') {
            "" => status_response(&state),
            "/bos_id" => bos_id_response(&state),
            "/eos_id" => eos_id_response(&state),
            _ => not_found(),
        };
    }
    not_found()
}

pub async fn encode_handler(State(state): State<Arc<HandlerState>>, body: Bytes) -> Response {
    let request: EncodeRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let add_generation_prompt = request.add_generation_prompt;
    let result = match request.messages.as_ref().filter(|m| m.is_array()) {
        Some(messages) => state
            .adapter
            .encode_from_messages(messages, add_generation_prompt),
        None => {
            let text = request.text.as_deref().unwrap_or("");
            let system = request.system.as_deref().unwrap_or(&state.default_system);
            state
                .adapter
                .encode_from_text(text, system, add_generation_prompt)
        }
    };

    match result {
        Ok(token_ids) => {
            debug!(tokens = token_ids.len(), "encode ok");
            json_response(
                StatusCode::OK,
                &json!({"token_ids": token_ids, "len": token_ids.len()}),
            )
        }
        Err(e) => {
            error!("encode failed: {e:#}");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": format!("encode failed: {e:#}")}),
            )
        }
    }
}

pub async fn decode_handler(State(state): State<Arc<HandlerState>>, body: Bytes) -> Response {
    let request: DecodeRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.adapter.decode(&request.token_ids) {
        Ok(text) => {
            debug!(tokens = request.token_ids.len(), "decode ok");
            json_response(StatusCode::OK, &json!({"text": text}))
        }
        Err(e) => {
            error!("decode failed: {e:#}");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": format!("decode failed: {e:#}")}),
            )
        }
    }
}

fn status_response(state: &HandlerState) -> Response {
    json_response(
        StatusCode::OK,
        &json!({"status": "ok", "model": state.model_name}),
    )
}

fn bos_id_response(state: &HandlerState) -> Response {
    json_response(StatusCode::OK, &json!({"bos_id": state.adapter.bos_id()}))
}

fn eos_id_response(state: &HandlerState) -> Response {
    json_response(StatusCode::OK, &json!({"eos_id": state.adapter.eos_id()}))
}

fn not_found() -> Response {
    json_response(StatusCode::NOT_FOUND, &json!({"error": "not found"}))
}

/// An absent or empty body is an empty JSON object; anything else must
/// parse, or the request is rejected before dispatch.
fn parse_body<T>(body: &Bytes) -> Result<T, Response>
where
    T: DeserializeOwned + Default,
{
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "request body rejected");
        json_response(
            StatusCode::BAD_REQUEST,
            &json!({"error": format!("bad json: {e}")}),
        )
    })
}

/// Serialize a response body with the exact content type the device
/// expects. `serde_json` emits UTF-8 without ASCII-escaping.
fn json_response(status: StatusCode, value: &Value) -> Response {
    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        )],
        value.to_string(),
    )
        .into_response()
}
