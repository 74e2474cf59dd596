//! Configuration loading from the process environment.

use thiserror::Error;
use url::Url;

use crate::config::schema::{ListenerConfig, ProxyConfig, UpstreamConfig};

/// Environment variable naming the upstream origin (required).
pub const TARGET_VAR: &str = "UPSTREAM_URL";

/// Environment variable overriding the mount prefix.
pub const PATH_PREFIX_VAR: &str = "UPSTREAM_PATH_PREFIX";

/// Environment variable overriding the listener bind address.
pub const BIND_ADDRESS_VAR: &str = "PROXY_BIND_ADDRESS";

const DEFAULT_PATH_PREFIX: &str = "/api/upstream";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("UPSTREAM_URL is not set; the proxy has exactly one origin and cannot start without it")]
    MissingTarget,

    #[error("UPSTREAM_URL is not an absolute URL: {0}")]
    InvalidTarget(#[from] url::ParseError),

    #[error("UPSTREAM_URL has unsupported scheme {0:?}; expected http or https")]
    UnsupportedScheme(String),

    #[error("invalid mount prefix {0:?}: must be empty or start with '/' and carry no trailing '/'")]
    InvalidPrefix(String),
}

/// Load and validate configuration from the process environment.
///
/// Fails fast: any error here aborts startup before the listener binds.
pub fn from_env() -> Result<ProxyConfig, ConfigError> {
    load_with(|name| std::env::var(name).ok())
}

fn load_with(get: impl Fn(&str) -> Option<String>) -> Result<ProxyConfig, ConfigError> {
    let raw_target = get(TARGET_VAR).ok_or(ConfigError::MissingTarget)?;
    let target = Url::parse(&raw_target)?;
    match target.scheme() {
        "http" | "https" => {}
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    }

    let path_prefix =
        get(PATH_PREFIX_VAR).unwrap_or_else(|| DEFAULT_PATH_PREFIX.to_string());
    validate_prefix(&path_prefix)?;

    let bind_address =
        get(BIND_ADDRESS_VAR).unwrap_or_else(|| ListenerConfig::default().bind_address);

    Ok(ProxyConfig {
        listener: ListenerConfig { bind_address },
        upstream: UpstreamConfig::new(target, path_prefix),
    })
}

/// The prefix is deleted by literal leading-anchor match, so it must be
/// absolute and must not end in '/' (that would leave the forwarded path
/// without its leading slash).
fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Ok(());
    }
    if !prefix.starts_with('/') || prefix.ends_with('/') {
        return Err(ConfigError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}
