//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (deadline scaled by cold-start class)
//!     → On transport failure: retries.rs (safe method? one retry elsewhere)
//!     → backoff.rs (short jittered pause before the retry)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every forwarded request has a deadline
//! - At most one retry, only for safe methods, never on the same backend
//! - An empty registry is never retried: it fails fast

pub mod backoff;
pub mod retries;
pub mod timeouts;
