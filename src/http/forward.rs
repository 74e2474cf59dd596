//! HTTP forwarding to the upstream origin.
//!
//! # Responsibilities
//! - Rewrite the request path (delete the leading mount prefix, exactly once)
//! - Rewrite the origin identity: the outbound request carries the target's
//!   authority, never the inbound `Host`
//! - Strip hop-by-hop headers in both directions
//! - Stream request and response bodies without buffering or parsing
//!
//! # Design Decisions
//! - Redirects from the origin pass through verbatim; the client never follows
//! - No retries, no fallback: any transport failure propagates as
//!   [`ForwardError`] and the framework renders the 5xx

use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderMap, HeaderName, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;

/// The single failure kind of the proxy: the origin could not be reached or
/// the relay broke mid-flight. Never recovered locally; the hosting framework
/// turns it into a 502.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream websocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("upstream TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("target scheme {0:?} cannot carry a websocket connection")]
    UnsupportedScheme(String),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "forwarding failed");
        (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
    }
}

/// Build the upstream HTTP client. Called once at startup; the client (and
/// its pool) is then shared by every request handler.
///
/// Certificate validation is skipped precisely when the target is not
/// secure, mirroring the websocket connector.
pub fn build_client(upstream: &UpstreamConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(!upstream.is_secure)
        .build()
}

/// Forward one request to the origin and stream its response back.
pub async fn forward(
    client: &reqwest::Client,
    upstream: &UpstreamConfig,
    request: Request<Body>,
) -> Result<Response, ForwardError> {
    let (parts, body) = request.into_parts();
    let url = upstream_url(upstream, &parts.uri);

    let mut outbound = HeaderMap::with_capacity(parts.headers.len());
    for (name, value) in &parts.headers {
        // Host is recomputed from the target URL. A declared Content-Length
        // passes through, so a sized inbound body goes out sized rather
        // than re-framed as chunked.
        if name == &header::HOST || is_hop_by_hop(name) {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }

    let outbound_body = if body.size_hint().exact() == Some(0) {
        reqwest::Body::from(Vec::new())
    } else {
        reqwest::Body::wrap_stream(body.into_data_stream())
    };

    let response = client
        .request(parts.method, url)
        .headers(outbound)
        .body(outbound_body)
        .send()
        .await?;

    let status = response.status();
    let mut inbound = HeaderMap::with_capacity(response.headers().len());
    for (name, value) in response.headers() {
        if is_hop_by_hop(name) {
            continue;
        }
        inbound.append(name.clone(), value.clone());
    }

    let mut relayed = Response::new(Body::from_stream(response.bytes_stream()));
    *relayed.status_mut() = status;
    *relayed.headers_mut() = inbound;
    Ok(relayed)
}

/// Compute the origin-side URL for an inbound request URI.
///
/// The mount prefix is deleted by literal leading-anchor match, at most once;
/// a non-leading occurrence is never touched. The remainder is appended to
/// the target's own path, and the query string passes through unmodified.
pub fn upstream_url(upstream: &UpstreamConfig, uri: &Uri) -> Url {
    let stripped = strip_prefix_once(uri.path(), &upstream.path_prefix);

    let mut url = upstream.target.clone();
    let base = url.path().trim_end_matches('/').to_string();
    let path = if stripped.is_empty() {
        format!("{base}/")
    } else if stripped.starts_with('/') {
        format!("{base}{stripped}")
    } else {
        format!("{base}/{stripped}")
    };
    url.set_path(&path);
    url.set_query(uri.query());
    url
}

fn strip_prefix_once<'a>(path: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return path;
    }
    path.strip_prefix(prefix).unwrap_or(path)
}

// Connection-level headers must not travel past the proxy (RFC 9110 §7.6.1).
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("proxy-connection"),
];

pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|hop| hop == name)
}
