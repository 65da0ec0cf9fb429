//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch request
//!     → tracker snapshot (ready + warming backends, with weights)
//!     → Apply selection policy:
//!         - weighted.rs (weighted-fair, LRU tie-break)
//!         - round_robin.rs (rotate, ignore weights)
//!     → Selected backend view
//! ```
//!
//! # Design Decisions
//! - Policies never read tracker state directly; they see snapshot views only
//! - Weights are computed by the tracker; policies only interpret them
//! - Per-backend policy state is pruned when a backend leaves the registry

use std::fmt::Debug;

use crate::config::schema::PolicyKind;
use crate::load_balancer::backend::{BackendId, BackendView};

pub mod backend;
pub mod round_robin;
pub mod weighted;

pub use round_robin::RoundRobin;
pub use weighted::WeightedFair;

/// Backend selection policy.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Policy name recorded on dispatch decisions.
    fn name(&self) -> &'static str;

    /// Pick one of the candidates, or `None` if none is selectable.
    fn next_server(&self, candidates: &[BackendView]) -> Option<BackendView>;

    /// Drop state for backends no longer registered.
    fn retain(&self, _keep: &dyn Fn(&BackendId) -> bool) {}
}

/// Build the configured policy.
pub fn from_policy(policy: PolicyKind) -> Box<dyn LoadBalancer> {
    match policy {
        PolicyKind::WeightedFair => Box::new(WeightedFair::new()),
        PolicyKind::RoundRobin => Box::new(RoundRobin::new()),
    }
}
