//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → loader.rs (read required values, parse, validate)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all request handlers
//! ```
//!
//! # Design Decisions
//! - Config is resolved exactly once at startup; there is no reload path,
//!   so every request for the process lifetime proxies to the same origin
//! - A missing upstream URL is fatal at startup, never per-request
//! - `is_secure` is derived from the parsed URL scheme, not the raw string

pub mod loader;
pub mod schema;

pub use schema::ListenerConfig;
pub use schema::ProxyConfig;
pub use schema::UpstreamConfig;
