//! Configuration for the tokenizer service.

use serde::{Deserialize, Serialize};

/// Default tokenizer source: the model directory shipped on the device.
pub const DEFAULT_MODEL_DIR: &str = "/opt/m5stack/data/tinyswallow-1.5b-ax630c";

/// System prompt used when an `/encode` request does not carry its own.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are TinySwallow, a helpful Japanese assistant. Reply concisely.";

/// Configuration for the tokenizer service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Host to bind the HTTP listener
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the HTTP listener
    #[serde(default = "default_port")]
    pub port: u16,

    /// Tokenizer source: local directory preferred when it exists,
    /// otherwise treated as a remote model id
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Default system prompt for `/encode` requests without a `system` field
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,

    /// Seconds to wait for a client to deliver its request
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_model_id() -> String {
    DEFAULT_MODEL_DIR.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_read_timeout_secs() -> u64 {
    5
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model_id: default_model_id(),
            default_system_prompt: default_system_prompt(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    /// Create a config for a specific tokenizer source.
    pub fn new(model_id: String) -> Self {
        Self {
            model_id,
            ..Default::default()
        }
    }

    /// Builder pattern: set host
    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set the default system prompt
    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.default_system_prompt = prompt;
        self
    }

    /// Builder pattern: set the client read timeout
    pub fn with_read_timeout(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
