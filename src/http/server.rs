//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router: an unconditional catch-all, any method, any path
//! - Disable body buffering so the origin receives the raw byte stream
//! - Wire up request tracing
//! - Dispatch each request to the forwarder or the websocket relay
//! - Serve with graceful shutdown

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRequestParts, State},
    extract::ws::WebSocketUpgrade,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::forward::{self, ForwardError};
use crate::http::websocket;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub client: reqwest::Client,
}

/// HTTP server for the passthrough proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// The upstream client is built here, once; every request reuses it.
    pub fn new(config: ProxyConfig) -> reqwest::Result<Self> {
        let config = Arc::new(config);
        let client = forward::build_client(&config.upstream)?;

        let state = AppState {
            config: config.clone(),
            client,
        };
        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    /// Build the Axum router.
    ///
    /// The filter is unconditional: both routes funnel everything into the
    /// proxy handler. `DefaultBodyLimit::disable` keeps Axum from capping
    /// the request body; nothing upstream of the handler reads it.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until the
    /// shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target = %self.config.upstream.target,
            path_prefix = %self.config.upstream.path_prefix,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// The proxy handler: rewrite the prefix and hand the request to the origin.
///
/// Success produces whatever the origin produced; failure propagates as
/// [`ForwardError`] and the framework renders the 502.
async fn proxy_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, ForwardError> {
    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        "proxying request"
    );

    if websocket::is_upgrade_request(request.headers()) {
        let (mut parts, _body) = request.into_parts();
        let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(ws) => ws,
            Err(rejection) => return Ok(rejection.into_response()),
        };
        return websocket::relay(ws, &parts, &state.config.upstream).await;
    }

    forward::forward(&state.client, &state.config.upstream, request).await
}
