//! Backend readiness state machine.
//!
//! # States
//! - Unknown: registered, no successful observation yet
//! - Warming: bounded-delay backend with a request in flight, nothing succeeded yet
//! - Ready: recent success and failure rate below threshold
//! - Degraded: failure rate over threshold, not yet ejected
//! - Ejected: consecutive-failure limit reached; excluded until reset
//!
//! # State Transitions
//! ```text
//! Unknown  → Warming:  request starts against a bounded-delay backend
//! *        → Ready:    success, failure rate below threshold
//! *        → Degraded: failure rate >= threshold (after min_samples)
//! Warming  → Unknown:  failure below thresholds
//! Ready    → Degraded: consecutive-failure limit reached (limit > 1)
//! *        → Ejected:  consecutive failures >= limit
//! Ejected  → Unknown:  manual or timed reset only
//! ```
//!
//! Ready never jumps straight to Ejected unless the limit is 1.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Unknown,
    Warming,
    Ready,
    Degraded,
    Ejected,
}

impl Readiness {
    pub fn as_str(self) -> &'static str {
        match self {
            Readiness::Unknown => "unknown",
            Readiness::Warming => "warming",
            Readiness::Ready => "ready",
            Readiness::Degraded => "degraded",
            Readiness::Ejected => "ejected",
        }
    }

    /// Numeric encoding for the readiness gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            Readiness::Unknown => 0.0,
            Readiness::Warming => 1.0,
            Readiness::Ready => 2.0,
            Readiness::Degraded => 3.0,
            Readiness::Ejected => 4.0,
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits that drive the transitions.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub degrade_failure_rate: f64,
    pub min_samples: usize,
    pub eject_after_failures: u32,
}

/// Window statistics right after an outcome was appended.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub success: bool,
    pub failure_rate: f64,
    pub samples: usize,
    pub consecutive_failures: u32,
}

impl Observation {
    fn rate_exceeded(&self, t: &Thresholds) -> bool {
        self.samples >= t.min_samples && self.failure_rate >= t.degrade_failure_rate
    }
}

/// Compute the state following an outcome.
pub fn on_outcome(current: Readiness, obs: Observation, t: &Thresholds) -> Readiness {
    if current == Readiness::Ejected {
        return Readiness::Ejected;
    }

    if !obs.success {
        if obs.consecutive_failures >= t.eject_after_failures {
            if current == Readiness::Ready && t.eject_after_failures > 1 {
                return Readiness::Degraded;
            }
            return Readiness::Ejected;
        }
        if obs.rate_exceeded(t) {
            return Readiness::Degraded;
        }
        return match current {
            Readiness::Warming => Readiness::Unknown,
            other => other,
        };
    }

    if obs.rate_exceeded(t) {
        Readiness::Degraded
    } else {
        Readiness::Ready
    }
}

/// State after a request starts; only cold bounded-delay backends move.
pub fn on_request_start(current: Readiness, bounded_delay: bool) -> Readiness {
    match current {
        Readiness::Unknown if bounded_delay => Readiness::Warming,
        other => other,
    }
}

/// State after a sweep found no success inside the retention window.
pub fn on_stale(current: Readiness) -> Readiness {
    match current {
        Readiness::Warming | Readiness::Ready | Readiness::Degraded => Readiness::Unknown,
        other => other,
    }
}
