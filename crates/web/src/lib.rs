//! TravelSafe web server.
//!
//! Provides an Axum-based HTTP server with:
//! - The account provisioning function endpoint
//! - A health endpoint
//! - Permissive CORS headers on every response

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use travelsafe_core::config::AppConfig;
use travelsafe_core::Provisioner;

/// Headers browsers may send on cross-origin calls to the function.
pub const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub provisioner: Arc<Provisioner>,
    pub config: AppConfig,
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server with the given dependencies.
    pub fn new(config: AppConfig, provisioner: Arc<Provisioner>) -> Self {
        let state = Arc::new(AppState {
            provisioner,
            config,
        });
        Self { state }
    }

    /// Build the router with all routes and middleware attached.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(api::provision::routes(
                &self.state.config.server.function_path,
            ))
            .merge(api::status::routes())
            .layer(DefaultBodyLimit::max(1024 * 1024))
            .layer(TraceLayer::new_for_http())
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(CORS_ALLOW_HEADERS),
            ))
            .with_state(self.state.clone())
    }

    /// Start the web server, listening on the given address.
    pub async fn start(self, listen_addr: &str) -> anyhow::Result<()> {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = self.router();

        info!(
            addr = %addr,
            function_path = %self.state.config.server.function_path,
            "starting web server"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
