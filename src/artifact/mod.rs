//! Shared artifact subsystem.
//!
//! # Data Flow
//! ```text
//! Shared storage (manifest + module)
//!     → reference.rs (load, derive logical version, verify)
//!     → watcher.rs (reload on change, atomic swap)
//!     → host.rs (backend router: health path + application path)
//!     → Backend host: serves health = verify(), reports version header
//!     → Gateway: expected version for health probes
//! ```
//!
//! # Design Decisions
//! - Every backend reads the same reference; none bakes it into its image
//! - A corrupt or partial read is a failed health outcome, not a crash
//! - Version mismatches between backends surface as probe failures

pub mod host;
pub mod reference;
pub mod watcher;

pub use reference::{ArtifactError, ArtifactReference, Manifest};
pub use watcher::ArtifactWatcher;

/// Response header a backend uses to report the artifact version it serves.
pub const VERSION_HEADER: &str = "x-artifact-version";
