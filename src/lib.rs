//! Prefix-Stripping Reverse Proxy
//!
//! Forwards every inbound HTTP and WebSocket request to one statically
//! configured upstream origin, deleting a fixed mount prefix from the path
//! before forwarding and relaying the origin's response back verbatim.
//!
//! ```text
//! inbound request
//!     → path filter (unconditional)
//!     → prefix rewrite
//!     → forward to origin (HTTP) / bidirectional relay (WebSocket)
//!     → stream response back
//!     → transport failure? propagate, never recover
//! ```

// Core subsystems
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
