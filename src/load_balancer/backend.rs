//! Backend abstraction.
//!
//! # Responsibilities
//! - Identify a single compute target (stable id, immutable kind)
//! - Describe its network address and cold-start class
//! - Provide the read-only view handed out in tracker snapshots

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::uri::Authority;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::health::state::Readiness;

/// Stable, opaque backend identifier.
///
/// Survives address changes; two registrations with the same id are the same backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(Arc<str>);

impl BackendId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BackendId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// What sort of compute a backend runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Long-lived virtual machine.
    PersistentInstance,
    /// Orchestrated container task.
    ManagedContainer,
    /// Serverless function, scaled to zero between bursts.
    EphemeralFunction,
}

impl BackendKind {
    /// Cold-start class implied by the kind when a backend does not announce one.
    pub fn default_cold_start(self) -> ColdStartClass {
        match self {
            BackendKind::EphemeralFunction => ColdStartClass::BoundedDelay,
            BackendKind::PersistentInstance | BackendKind::ManagedContainer => ColdStartClass::Zero,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::PersistentInstance => "persistent-instance",
            BackendKind::ManagedContainer => "managed-container",
            BackendKind::EphemeralFunction => "ephemeral-function",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected warm-up behaviour. Advisory: only thresholds and timeouts depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ColdStartClass {
    Zero,
    BoundedDelay,
}

impl ColdStartClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ColdStartClass::Zero => "zero",
            ColdStartClass::BoundedDelay => "bounded-delay",
        }
    }
}

impl fmt::Display for ColdStartClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Announcement a backend makes when it comes online.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub id: BackendId,
    pub kind: BackendKind,
    /// `host:port` the artifact is served on.
    pub address: Authority,
    pub cold_start: ColdStartClass,
}

impl BackendSpec {
    /// Build a spec, deriving the cold-start class from the kind when absent.
    pub fn new(
        id: impl Into<BackendId>,
        kind: BackendKind,
        address: &str,
        cold_start: Option<ColdStartClass>,
    ) -> Result<Self, InvalidAddress> {
        let address = Authority::from_str(address)
            .ok()
            .filter(|a| a.port_u16().is_some())
            .ok_or_else(|| InvalidAddress(address.to_string()))?;

        Ok(Self {
            id: id.into(),
            kind,
            address,
            cold_start: cold_start.unwrap_or_else(|| kind.default_cold_start()),
        })
    }
}

/// Address could not be parsed as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid backend address '{0}', expected host:port")]
pub struct InvalidAddress(pub String);

/// Point-in-time copy of one backend, as seen by the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct BackendView {
    pub id: BackendId,
    pub kind: BackendKind,
    #[serde(serialize_with = "serialize_authority")]
    pub address: Authority,
    pub cold_start: ColdStartClass,
    pub readiness: Readiness,
    /// Selection weight; zero for backends that must not be selected.
    pub weight: f64,
    /// No successful request inside the current warm period.
    pub cold: bool,
    #[serde(serialize_with = "serialize_latency_ms")]
    pub ewma_latency: Option<Duration>,
    pub failure_rate: f64,
    pub consecutive_failures: u32,
    pub records: usize,
}

impl BackendView {
    /// Ready or warming backends may receive traffic.
    pub fn is_eligible(&self) -> bool {
        matches!(self.readiness, Readiness::Ready | Readiness::Warming)
    }
}

fn serialize_authority<S: serde::Serializer>(a: &Authority, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(a.as_str())
}

fn serialize_latency_ms<S: serde::Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&(d.as_secs_f64() * 1000.0)),
        None => s.serialize_none(),
    }
}
