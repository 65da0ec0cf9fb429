//! The dispatch loop.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use tokio::time;
use uuid::Uuid;

use crate::config::schema::DispatchConfig;
use crate::dispatch::{DispatchDecision, DispatchError, Forwarder};
use crate::health::passive::is_healthy_response;
use crate::health::tracker::Tracker;
use crate::http::request::X_REQUEST_ID;
use crate::load_balancer::{self, backend::BackendView, LoadBalancer};
use crate::observability::metrics;
use crate::resilience::{backoff::retry_delay, retries::is_retryable, timeouts::forward_timeout};

/// Selects a backend for each request and forwards it.
pub struct Dispatcher<F> {
    tracker: Arc<Tracker>,
    balancer: Box<dyn LoadBalancer>,
    forwarder: F,
    config: DispatchConfig,
}

impl<F: Forwarder> Dispatcher<F> {
    pub fn new(tracker: Arc<Tracker>, forwarder: F, config: DispatchConfig) -> Self {
        Self {
            tracker,
            balancer: load_balancer::from_policy(config.policy),
            forwarder,
            config,
        }
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    /// Route one request to one backend.
    ///
    /// The response carries the [`DispatchDecision`] as an extension.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Result<Response<Body>, DispatchError> {
        // Requests that bypassed the request-id layer still get a traceable id
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let retryable = self.config.retry_enabled && is_retryable(request.method());

        let snapshot = self.tracker.snapshot();
        self.balancer.retain(&|id| snapshot.contains(id));
        let mut candidates = snapshot.eligible();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let Some(backend) = self.balancer.next_server(&candidates) else {
                tracing::warn!(
                    request_id = %request_id,
                    registered = snapshot.len(),
                    "No backend available for dispatch"
                );
                metrics::record_no_backend();
                return Err(DispatchError::NoBackendAvailable);
            };

            let decision = DispatchDecision::new(backend.id.clone(), &request_id, self.balancer.name(), attempt);
            tracing::debug!(
                request_id = %request_id,
                backend_id = %backend.id,
                kind = %backend.kind,
                policy = decision.policy,
                attempt,
                "Dispatching request"
            );

            let failure = match self.forward_once(&backend, replay(&request)).await {
                Ok(mut response) => {
                    response.extensions_mut().insert(decision);
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            tracing::warn!(request_id = %request_id, attempt, error = %failure, "Upstream attempt failed");
            candidates.retain(|b| b.id != backend.id);

            if attempt == 1 && retryable && !candidates.is_empty() {
                metrics::record_retry();
                let delay = retry_delay(&self.config);
                tracing::info!(request_id = %request_id, delay = ?delay, "Retrying on another backend");
                time::sleep(delay).await;
                continue;
            }
            return Err(failure);
        }
    }

    /// Forward to one backend and report the outcome to the tracker.
    async fn forward_once(&self, backend: &BackendView, request: Request<Bytes>) -> Result<Response<Body>, DispatchError> {
        let cold = self.tracker.mark_in_flight(&backend.id).unwrap_or(backend.cold);
        let deadline = forward_timeout(&self.config, backend.cold_start, cold);

        let started = Instant::now();
        let result = time::timeout(deadline, self.forwarder.forward(&backend.address, request)).await;
        let latency = started.elapsed();

        match result {
            Ok(Ok(response)) => {
                self.tracker
                    .record_outcome(&backend.id, is_healthy_response(response.status()), latency);
                Ok(response)
            }
            Ok(Err(e)) => {
                self.tracker.record_outcome(&backend.id, false, latency);
                Err(DispatchError::Transport {
                    backend: backend.id.clone(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                self.tracker.record_outcome(&backend.id, false, latency);
                Err(DispatchError::Timeout {
                    backend: backend.id.clone(),
                    after: deadline,
                })
            }
        }
    }
}

/// Copy a buffered request so it can be sent more than once.
fn replay(request: &Request<Bytes>) -> Request<Bytes> {
    let mut copy = Request::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}
