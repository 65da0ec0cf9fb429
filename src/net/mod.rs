//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, report the bound address)
//!     → tls.rs (optional TLS handshake)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Binding is separate from serving so tests can bind port 0
//! - TLS is optional and handled transparently

pub mod listener;
pub mod tls;

pub use listener::{bind, ListenerError};
