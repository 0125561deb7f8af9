use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tokenizer_service::service::config::{DEFAULT_MODEL_DIR, DEFAULT_SYSTEM_PROMPT};
use tokenizer_service::service::{ServiceConfig, TokenizerServer};

/// Exit code for a tokenizer that failed to load at startup.
const EXIT_TOKENIZER_LOAD_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chat-template-aware HTTP tokenizer service")]
struct Args {
    /// Bind address for the HTTP listener
    #[arg(long, env = "TS_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port for the HTTP listener
    #[arg(long, env = "TS_PORT", default_value_t = 8080)]
    port: u16,

    /// Tokenizer source: local directory preferred when it exists,
    /// otherwise treated as a remote model id
    #[arg(long = "model_id", env = "TS_MODEL_DIR", default_value = DEFAULT_MODEL_DIR)]
    model_id: String,

    /// Default system prompt used when /encode requests omit "system"
    #[arg(long, env = "TS_SYSTEM", default_value = DEFAULT_SYSTEM_PROMPT)]
    content: String,

    /// Seconds to wait for a client to deliver its request
    #[arg(long, env = "TS_READ_TIMEOUT", default_value_t = 5)]
    read_timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ServiceConfig::new(args.model_id)
        .with_host(args.host)
        .with_port(args.port)
        .with_system_prompt(args.content)
        .with_read_timeout(args.read_timeout);

    let server = match TokenizerServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("[FATAL] tokenizer load failed: {e:#}");
            return ExitCode::from(EXIT_TOKENIZER_LOAD_FAILED);
        }
    };

    match server.serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[FATAL] {e:#}");
            ExitCode::FAILURE
        }
    }
}
