//! Lifecycle management subsystem.
//!
//! Startup is ordered: config first, then the upstream client, then the
//! listener. Shutdown is a broadcast signal every long-running task can
//! subscribe to.

pub mod shutdown;

pub use shutdown::Shutdown;
