//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered backend's health path
//! - Feed probe results into the tracker as outcomes
//! - Flag backends serving a different artifact version than expected

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time;

use crate::artifact::VERSION_HEADER;
use crate::config::schema::HealthCheckConfig;
use crate::health::state::Readiness;
use crate::health::tracker::Tracker;
use crate::load_balancer::backend::{BackendView, ColdStartClass};
use crate::observability::metrics;

pub const PROBE_USER_AGENT: &str = "artifact-gateway-health-check";

/// Why a probe failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    Status(u16),
    VersionMismatch { expected: String, found: Option<String> },
    Connect(String),
    Timeout,
}

pub struct HealthMonitor {
    tracker: Arc<Tracker>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
    expected_version: Arc<ArcSwapOption<String>>,
}

impl HealthMonitor {
    pub fn new(tracker: Arc<Tracker>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let expected_version = Arc::new(ArcSwapOption::from(
            config.expected_artifact_version.clone().map(Arc::new),
        ));

        Self {
            tracker,
            config,
            client,
            expected_version,
        }
    }

    /// Share the expected artifact version with a reloader.
    pub fn with_expected_version(mut self, expected: Arc<ArcSwapOption<String>>) -> Self {
        self.expected_version = expected;
        self
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every non-ejected backend once, concurrently.
    pub async fn check_all(&self) {
        let snapshot = self.tracker.snapshot();
        let mut probes = JoinSet::new();

        for backend in snapshot.iter().filter(|b| b.readiness != Readiness::Ejected) {
            let probe = Probe {
                tracker: self.tracker.clone(),
                client: self.client.clone(),
                path: self.config.path.clone(),
                timeout: Duration::from_secs(self.config.timeout_secs),
                expected: self.expected_version.load_full(),
                backend: backend.clone(),
            };
            probes.spawn(probe.run());
        }

        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Health probe task failed");
            }
        }
    }
}

struct Probe {
    tracker: Arc<Tracker>,
    client: Client<HttpConnector, Body>,
    path: String,
    timeout: Duration,
    expected: Option<Arc<String>>,
    backend: BackendView,
}

impl Probe {
    async fn run(self) {
        let id = &self.backend.id;
        let Some(cold) = self.tracker.mark_in_flight(id) else {
            return;
        };

        let mut timeout = self.timeout;
        if cold && self.backend.cold_start == ColdStartClass::BoundedDelay {
            let allowance = self.tracker.settings().cold_start_allowance.get(self.backend.cold_start);
            timeout += Duration::from_millis(allowance);
        }

        let started = Instant::now();
        let result = self.probe(timeout).await;
        let latency = started.elapsed();

        match &result {
            Ok(()) => {
                tracing::debug!(backend_id = %id, latency_ms = latency.as_millis() as u64, "Health check passed");
            }
            Err(ProbeFailure::Status(status)) => {
                tracing::warn!(backend_id = %id, status, "Health check failed: non-success status");
            }
            Err(ProbeFailure::VersionMismatch { expected, found }) => {
                tracing::warn!(backend_id = %id, expected = %expected, found = ?found, "Health check failed: artifact version mismatch");
            }
            Err(ProbeFailure::Connect(e)) => {
                tracing::warn!(backend_id = %id, error = %e, "Health check failed: connection error");
            }
            Err(ProbeFailure::Timeout) => {
                tracing::warn!(backend_id = %id, "Health check failed: timeout");
            }
        }

        metrics::record_health_probe(id.as_str(), result.is_ok());
        self.tracker.record_outcome(id, result.is_ok(), latency);
    }

    async fn probe(&self, timeout: Duration) -> Result<(), ProbeFailure> {
        let uri = format!("http://{}{}", self.backend.address, self.path);
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", PROBE_USER_AGENT)
            .body(Body::empty())
            .map_err(|e| ProbeFailure::Connect(e.to_string()))?;

        let response = match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ProbeFailure::Connect(e.to_string())),
            Err(_) => return Err(ProbeFailure::Timeout),
        };

        if !response.status().is_success() {
            return Err(ProbeFailure::Status(response.status().as_u16()));
        }

        if let Some(expected) = &self.expected {
            let found = response
                .headers()
                .get(VERSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if found.as_deref() != Some(expected.as_str()) {
                return Err(ProbeFailure::VersionMismatch {
                    expected: expected.to_string(),
                    found,
                });
            }
        }

        Ok(())
    }
}
