//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all handler)
//!     → forward.rs (prefix rewrite, forward to origin, stream response)
//!       or websocket.rs (upgrade handshake, bidirectional relay)
//!     → Send to client
//! ```

pub mod forward;
pub mod server;
pub mod websocket;

pub use forward::ForwardError;
pub use server::HttpServer;
