//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (buffered)
//!     → dispatcher.rs: tracker snapshot → eligible backends
//!     → load_balancer policy picks one
//!     → forwarder.rs sends it with a class-scaled deadline
//!     → outcome + latency reported to the tracker
//!     → on transport failure: one retry elsewhere (safe methods only)
//!     → response, tagged with a decision.rs record
//! ```
//!
//! # Design Decisions
//! - Dispatch is kind-agnostic: every backend serves the same artifact
//! - The dispatcher reads snapshots and reports outcomes; it never mutates backend state
//! - The forwarder is a trait so the dispatch loop can be exercised without sockets

pub mod decision;
pub mod dispatcher;
pub mod error;
pub mod forwarder;

pub use decision::DispatchDecision;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use forwarder::{ForwardError, Forwarder, HyperForwarder};
