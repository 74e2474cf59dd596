//! Shared utilities for integration tests.

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{HeaderMap, Method, Uri},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use url::Url;

use prefix_proxy::config::{ListenerConfig, ProxyConfig, UpstreamConfig};
use prefix_proxy::{HttpServer, Shutdown};

/// Start a mock origin that echoes back what it saw.
///
/// Plain requests get a text body
/// `METHOD <path?query> host=<host> content-length=<cl>` followed by the raw
/// request body. Websocket upgrades on `/ws` echo every frame, `/ws-headers`
/// reports the Authorization header it observed, and `/ws-proto` accepts the
/// `phoenix` subprotocol.
pub async fn start_origin() -> SocketAddr {
    let app = Router::new()
        .route("/ws", any(ws_echo))
        .route("/ws-headers", any(ws_headers))
        .route("/ws-proto", any(ws_proto))
        .fallback(any(echo));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> String {
    let host = headers
        .get("host")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let content_length = headers
        .get("content-length")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("<none>");
    format!(
        "{method} {uri} host={host} content-length={content_length}\n{}",
        String::from_utf8_lossy(&body)
    )
}

async fn ws_echo(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        while let Some(Ok(message)) = socket.recv().await {
            if socket.send(message).await.is_err() {
                break;
            }
        }
    })
}

async fn ws_headers(headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("<missing>")
        .to_string();
    ws.on_upgrade(move |mut socket: WebSocket| async move {
        let _ = socket.send(Message::Text(authorization.into())).await;
    })
}

async fn ws_proto(ws: WebSocketUpgrade) -> Response {
    ws.protocols(["phoenix"])
        .on_upgrade(|_socket: WebSocket| async {})
}

/// Spawn the proxy in front of the given origin and return its address plus
/// the shutdown handle keeping it alive.
pub async fn start_proxy(origin: SocketAddr, path_prefix: &str) -> (SocketAddr, Shutdown) {
    let target = Url::parse(&format!("http://{origin}")).unwrap();
    let config = ProxyConfig {
        listener: ListenerConfig::default(),
        upstream: UpstreamConfig::new(target, path_prefix.to_string()),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    let server = HttpServer::new(config).unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener, shutdown_rx).await;
    });

    (addr, shutdown)
}
