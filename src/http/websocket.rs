//! WebSocket upgrade relay.
//!
//! # Data Flow
//! ```text
//! Client ←── frames ──→ Proxy ←── frames ──→ Origin
//! ```
//!
//! # Design Decisions
//! - The origin connection is opened before the client handshake completes,
//!   so an unreachable origin surfaces as a 502 instead of upgrade-then-drop
//! - Frame-level forwarding, no message buffering
//! - Close frames propagate in both directions; ping/pong relayed as-is

use std::sync::Arc;

use axum::{
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    http::{header, request::Parts, HeaderMap, HeaderName, Uri},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{self, client::IntoClientRequest, protocol::frame::coding::CloseCode},
    Connector, MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::forward::{is_hop_by_hop, upstream_url, ForwardError};

/// True when the inbound request asks for a WebSocket upgrade.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

/// Connect to the origin, then complete the client handshake and relay
/// frames until either side goes away.
///
/// The upgrade is forwarded like any other request: every end-to-end header
/// (authorization, cookies, the offered subprotocols) travels to the origin,
/// and the subprotocol the origin accepted is reflected back to the client.
pub async fn relay(
    ws: WebSocketUpgrade,
    parts: &Parts,
    upstream: &UpstreamConfig,
) -> Result<Response, ForwardError> {
    let url = websocket_url(upstream, &parts.uri)?;

    let mut request = url.as_str().into_client_request()?;
    for (name, value) in &parts.headers {
        // Host is recomputed from the target URL; the key/version handshake
        // headers belong to tungstenite's own exchange with the origin.
        if name == &header::HOST || is_hop_by_hop(name) || is_handshake_header(name) {
            continue;
        }
        request.headers_mut().append(name.clone(), value.clone());
    }

    let connector = if upstream.is_secure {
        None
    } else {
        Some(Connector::Rustls(Arc::new(unverified_tls_config()?)))
    };
    let (origin, handshake) = connect_async_tls_with_config(request, None, false, connector).await?;
    let accepted_protocol = handshake.headers().get(header::SEC_WEBSOCKET_PROTOCOL).cloned();

    tracing::debug!(url = %url, "websocket relay established");
    let mut response = ws.on_upgrade(move |client| pump(client, origin));
    if let Some(protocol) = accepted_protocol {
        response
            .headers_mut()
            .insert(header::SEC_WEBSOCKET_PROTOCOL, protocol);
    }
    Ok(response)
}

// Produced fresh by tungstenite for its handshake with the origin; the
// client's values must not leak across.
const HANDSHAKE_HEADERS: [HeaderName; 3] = [
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_EXTENSIONS,
];

fn is_handshake_header(name: &HeaderName) -> bool {
    HANDSHAKE_HEADERS.iter().any(|handshake| handshake == name)
}

/// Origin-side URL for the upgrade: same rewritten path and query as plain
/// HTTP forwarding, with the scheme mirrored onto ws/wss.
fn websocket_url(upstream: &UpstreamConfig, uri: &Uri) -> Result<Url, ForwardError> {
    let mut url = upstream_url(upstream, uri);
    let scheme = if upstream.is_secure { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| ForwardError::UnsupportedScheme(upstream.target.scheme().to_string()))?;
    Ok(url)
}

/// Relay frames in both directions until one side closes or errors.
async fn pump(client: WebSocket, origin: WebSocketStream<MaybeTlsStream<TcpStream>>) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut origin_tx, mut origin_rx) = origin.split();

    loop {
        tokio::select! {
            message = client_rx.next() => match message {
                Some(Ok(message)) => {
                    if origin_tx.send(into_tungstenite(message)).await.is_err() {
                        break;
                    }
                }
                Some(Err(_)) | None => {
                    let _ = origin_tx.close().await;
                    break;
                }
            },
            message = origin_rx.next() => match message {
                Some(Ok(message)) => {
                    let Some(message) = from_tungstenite(message) else {
                        continue;
                    };
                    if client_tx.send(message).await.is_err() {
                        break;
                    }
                }
                Some(Err(_)) | None => {
                    let _ = client_tx.close().await;
                    break;
                }
            },
        }
    }

    tracing::debug!("websocket relay closed");
}

fn into_tungstenite(message: ws::Message) -> tungstenite::Message {
    match message {
        ws::Message::Text(text) => tungstenite::Message::Text(text.as_str().into()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data),
        ws::Message::Close(frame) => tungstenite::Message::Close(frame.map(|frame| {
            tungstenite::protocol::CloseFrame {
                code: CloseCode::from(frame.code),
                reason: frame.reason.as_str().into(),
            }
        })),
    }
}

fn from_tungstenite(message: tungstenite::Message) -> Option<ws::Message> {
    match message {
        tungstenite::Message::Text(text) => Some(ws::Message::Text(text.as_str().into())),
        tungstenite::Message::Binary(data) => Some(ws::Message::Binary(data)),
        tungstenite::Message::Ping(data) => Some(ws::Message::Ping(data)),
        tungstenite::Message::Pong(data) => Some(ws::Message::Pong(data)),
        tungstenite::Message::Close(frame) => {
            Some(ws::Message::Close(frame.map(|frame| ws::CloseFrame {
                code: frame.code.into(),
                reason: frame.reason.as_str().into(),
            })))
        }
        // Raw frames are an artifact of tungstenite's reader and never
        // cross the relay.
        tungstenite::Message::Frame(_) => None,
    }
}

/// Client TLS config that skips certificate verification, used for the
/// origin connection whenever the target is not marked secure.
fn unverified_tls_config() -> Result<rustls::ClientConfig, rustls::Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerification(provider)))
        .with_no_client_auth();
    Ok(config)
}

#[derive(Debug)]
struct NoVerification(Arc<rustls::crypto::CryptoProvider>);

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
