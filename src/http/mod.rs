//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, body buffering)
//!     → request.rs (add request ID)
//!     → dispatch (pick backend, forward, report outcome)
//!     → response.rs (map gateway failures to 502/503/504)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
