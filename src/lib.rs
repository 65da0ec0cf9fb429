//! Artifact gateway library.
//!
//! Routes inbound requests across heterogeneous backends (persistent
//! instances, managed containers, ephemeral functions) that all serve the same
//! shared artifact, tracking per-backend readiness from probes and traffic.

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod http;
pub mod net;

// Traffic management
pub mod health;
pub mod load_balancer;

// Shared artifact contract
pub mod artifact;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use dispatch::{DispatchDecision, DispatchError, Dispatcher};
pub use health::{Readiness, Tracker};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::backend::{BackendId, BackendKind, BackendSpec, ColdStartClass};
