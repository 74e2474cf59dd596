//! Configuration schema definitions.

use url::Url;

/// Root configuration for the proxy.
///
/// Constructed once during startup and never mutated afterwards; all
/// concurrent request handlers share it read-only.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream origin.
    pub upstream: UpstreamConfig,
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// The statically configured upstream origin.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Absolute URL of the origin every request is forwarded to.
    pub target: Url,

    /// Whether the target speaks TLS. Derived from the parsed scheme, so a
    /// scheme that only differs in case still counts as secure. Certificate
    /// validation is skipped whenever this is false.
    pub is_secure: bool,

    /// Externally visible mount path, deleted from the request path before
    /// forwarding. Either empty or absolute, with no trailing slash.
    pub path_prefix: String,
}

impl UpstreamConfig {
    /// Build the upstream config, deriving `is_secure` from the target scheme.
    pub fn new(target: Url, path_prefix: String) -> Self {
        let is_secure = target.scheme() == "https";
        Self {
            target,
            is_secure,
            path_prefix,
        }
    }
}
