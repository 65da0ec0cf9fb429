//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Register static backends → Resolve expected
//!     artifact version → Start health monitor, sweeper, listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Stop background tasks
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then registry, then listeners
//! - Listeners start last so traffic only arrives once the registry exists

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
