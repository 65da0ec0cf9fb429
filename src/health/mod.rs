//! Health and readiness subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend's health path
//!     → tracker.rs record_outcome
//!
//! Passive health checks (passive.rs):
//!     Dispatched request finishes
//!     → Classify outcome
//!     → tracker.rs record_outcome
//!
//! Tracker (tracker.rs):
//!     Append to record.rs window
//!     → Update EWMA latency / failure rate
//!     → state.rs transition
//!     → Publish view for snapshots
//!
//! Sweep (sweeper.rs):
//!     Periodic timer
//!     → Evict expired records
//!     → Demote silent backends, apply reset/removal timers
//! ```
//!
//! # Design Decisions
//! - Only the tracker mutates backend state; the dispatcher reports outcomes
//! - Health state is per-backend, not per-pool
//! - Thresholds depend on the cold-start class

pub mod active;
pub mod passive;
pub mod record;
pub mod state;
pub mod sweeper;
pub mod tracker;

pub use state::Readiness;
pub use tracker::{Registration, Snapshot, Tracker, TrackerError, TrackerSettings};
