//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all dispatch handler
//! - Wire up middleware (tracing, limits, request ID, overall deadline)
//! - Start the health monitor and the retention sweeper
//! - Serve plain HTTP or HTTPS until shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::{DispatchConfig, GatewayConfig};
use crate::dispatch::{DispatchDecision, Dispatcher, HyperForwarder};
use crate::health::active::HealthMonitor;
use crate::health::sweeper::Sweeper;
use crate::health::tracker::{Tracker, TrackerError, TrackerSettings};
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::lifecycle::{shutdown, startup};
use crate::net::tls::load_tls_config;
use crate::observability::metrics;

/// Grace period for in-flight requests once shutdown starts (TLS listener).
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher<HyperForwarder>>,
    pub max_body_bytes: usize,
    /// Bounds concurrent inbound requests; excess requests wait.
    pub in_flight: Arc<Semaphore>,
}

/// The inbound endpoint of the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    tracker: Arc<Tracker>,
    expected_version: Arc<ArcSwapOption<String>>,
}

impl HttpServer {
    /// Build the server and register the configured static backends.
    pub fn new(config: GatewayConfig) -> Result<Self, TrackerError> {
        let mut settings = TrackerSettings::from_config(&config.tracker, &config.dispatch);
        settings.admit_unknown = !config.health_check.enabled;
        let tracker = Arc::new(Tracker::new(settings));
        startup::register_static_backends(&tracker, &config.backends)?;
        Ok(Self::with_tracker(config, tracker))
    }

    /// Build the server around an existing registry.
    pub fn with_tracker(config: GatewayConfig, tracker: Arc<Tracker>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            tracker.clone(),
            HyperForwarder::new(),
            config.dispatch.clone(),
        ));
        let state = AppState {
            dispatcher,
            max_body_bytes: config.listener.max_body_bytes,
            in_flight: Arc::new(Semaphore::new(config.listener.max_connections)),
        };
        let router = Self::build_router(&config, state);
        let expected_version = Arc::new(ArcSwapOption::from(
            config.health_check.expected_artifact_version.clone().map(Arc::new),
        ));

        Self {
            router,
            config,
            tracker,
            expected_version,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(overall_deadline(&config.dispatch)))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    pub fn tracker(&self) -> Arc<Tracker> {
        self.tracker.clone()
    }

    /// Version health probes expect; swap it to follow artifact updates.
    pub fn expected_version(&self) -> Arc<ArcSwapOption<String>> {
        self.expected_version.clone()
    }

    /// The router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            tls = self.config.listener.tls.is_some(),
            backends = self.tracker.len(),
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            let monitor = HealthMonitor::new(self.tracker.clone(), self.config.health_check.clone())
                .with_expected_version(self.expected_version.clone());
            tokio::spawn(monitor.run(shutdown.resubscribe()));
        }

        let sweeper = Sweeper::new(
            self.tracker.clone(),
            Duration::from_secs(self.config.tracker.sweep_interval_secs),
        );
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        match &self.config.listener.tls {
            Some(tls) => {
                let rustls = load_tls_config(tls).await?;
                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                tokio::spawn(async move {
                    shutdown::recv(shutdown).await;
                    drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
                });

                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
            None => {
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(shutdown::recv(shutdown))
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Upper bound on one inbound request: two cold attempts plus the retry pause.
fn overall_deadline(dispatch: &DispatchConfig) -> Duration {
    let multiplier = dispatch
        .timeout_multipliers
        .zero
        .max(dispatch.timeout_multipliers.bounded_delay)
        .max(1.0);
    let attempt = Duration::from_millis(dispatch.request_timeout_ms).mul_f64(multiplier);
    attempt * 2 + Duration::from_millis(dispatch.retry_max_delay_ms) + Duration::from_secs(1)
}

/// Buffer the body and hand the request to the dispatcher.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let request_id = request.request_id().unwrap_or("-").to_string();
    let Ok(_permit) = state.in_flight.clone().acquire_owned().await else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Shutting down").into_response();
    };

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        "Dispatching inbound request"
    );

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejecting request body");
            metrics::record_request(StatusCode::PAYLOAD_TOO_LARGE.as_u16(), None, started);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    match state.dispatcher.dispatch(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let backend = response
                .extensions()
                .get::<DispatchDecision>()
                .map(|d| d.backend.clone());
            metrics::record_request(
                response.status().as_u16(),
                backend.as_ref().map(|b| b.as_str()),
                started,
            );
            response
        }
        Err(e) => {
            metrics::record_request(e.status().as_u16(), e.backend().map(|b| b.as_str()), started);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[test]
    fn test_overall_deadline_covers_cold_retry() {
        let dispatch = DispatchConfig::default();
        // 2 × (10s × 3.0) + 100ms + 1s
        assert_eq!(overall_deadline(&dispatch), Duration::from_millis(61_100));
    }

    #[tokio::test]
    async fn test_empty_registry_is_service_unavailable() {
        let server = HttpServer::new(GatewayConfig::default()).unwrap();
        let response = server
            .router()
            .oneshot(Request::builder().uri("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut config = GatewayConfig::default();
        config.listener.max_body_bytes = 4;
        let server = HttpServer::new(config).unwrap();
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .body(Body::from("too long"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
