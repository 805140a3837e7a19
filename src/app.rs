//! Application wiring: configuration, provider client, gateway, and server.

use crate::ai::{build_chat_service, ChatService};
use crate::gateway::{GatewayError, PromptGateway};
use crate::models::{Config, GatewayResponse};
use crate::server::{self, AppState};
use crate::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Owns the long-lived, read-only pieces shared by every request.
pub struct App {
    gateway: Arc<PromptGateway>,
    allowed_origins: Vec<String>,
    bind_address: SocketAddr,
}

impl App {
    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Ok(Self::from_config(&config))
    }

    pub fn from_config(config: &Config) -> Self {
        info!(
            "Chat provider: {} (model: {}, max output tokens: {})",
            config.provider, config.chat_model, config.max_output_tokens
        );

        let chat: Arc<dyn ChatService> =
            Arc::from(build_chat_service(config, reqwest::Client::new()));
        Self::with_chat_service(chat, config)
    }

    /// Build an app around an injected chat service, e.g. a mock.
    pub fn with_chat_service(chat: Arc<dyn ChatService>, config: &Config) -> Self {
        Self {
            gateway: Arc::new(PromptGateway::new(chat, config.max_output_tokens)),
            allowed_origins: config.allowed_origins.clone(),
            bind_address: config.bind_address,
        }
    }

    pub fn gateway(&self) -> &PromptGateway {
        &self.gateway
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            gateway: Arc::clone(&self.gateway),
        };
        server::router(state, &self.allowed_origins)
    }

    /// Run a single prompt outside the HTTP server.
    pub async fn ask(&self, prompt: &str) -> std::result::Result<GatewayResponse, GatewayError> {
        self.gateway.handle_prompt_request(Some(prompt)).await
    }

    /// Serve until Ctrl+C or SIGTERM. `bind` overrides the configured address.
    pub async fn serve(&self, bind: Option<SocketAddr>) -> Result<()> {
        let address = bind.unwrap_or(self.bind_address);
        info!("Binding to {}", address);

        let listener = TcpListener::bind(address).await?;
        info!("Server running on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(server::shutdown_signal())
            .await?;

        info!("Server shut down");
        Ok(())
    }
}
