//! HTTP server for the tokenizer service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use super::adapter::TokenizerAdapter;
use super::config::ServiceConfig;
use super::handlers::{self, HandlerState};
use crate::tokenizer::HfTokenizer;

/// `Server` header advertised on every response.
const SERVER_IDENT: &str = concat!("tokenizer-service/", env!("CARGO_PKG_VERSION"));

/// Tokenizer service server: loads the tokenizer once, then serves the
/// immutable state over HTTP.
pub struct TokenizerServer {
    config: ServiceConfig,
    state: Arc<HandlerState>,
}

impl TokenizerServer {
    /// Load the configured tokenizer and prepare the server. A failure
    /// here is fatal: no listener has been bound yet.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let tokenizer = HfTokenizer::from_source(&config.model_id)
            .with_context(|| format!("failed to load tokenizer from '{}'", config.model_id))?;
        let state = Arc::new(HandlerState::new(
            TokenizerAdapter::new(tokenizer),
            config.default_system_prompt.clone(),
            config.model_id.clone(),
        ));
        Ok(Self { config, state })
    }

    /// Create with pre-initialized state (for testing or custom setup).
    pub fn with_components(config: ServiceConfig, state: Arc<HandlerState>) -> Self {
        Self { config, state }
    }

    fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        handlers::router(self.state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.read_timeout_secs,
            )))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::SERVER,
                HeaderValue::from_static(SERVER_IDENT),
            ))
            .layer(cors)
    }

    /// Bind and serve until interrupted.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.bind_addr();
        let router = self.build_router();

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(model = %self.config.model_id, "listening on {addr}");
        println!("http://{addr}");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        info!("shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}
