//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;

use artifact_gateway::artifact::host::host_router;
use artifact_gateway::artifact::{ArtifactWatcher, VERSION_HEADER};

/// Switches for a mock backend, flipped by the test while it runs.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    pub healthy: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn fail_health(&self) {
        self.healthy.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct MockState {
    id: &'static str,
    version: &'static str,
    healthy: Arc<AtomicBool>,
}

/// Start a backend on an ephemeral port that answers every path with its id.
pub async fn start_mock_backend(id: &'static str, version: &'static str) -> MockBackend {
    let healthy = Arc::new(AtomicBool::new(true));
    let state = MockState {
        id,
        version,
        healthy: healthy.clone(),
    };
    let app = Router::new()
        .route("/health", get(mock_health))
        .fallback(mock_serve)
        .with_state(state);

    MockBackend {
        addr: serve(app).await,
        healthy,
    }
}

async fn mock_health(State(state): State<MockState>) -> Response {
    let status = if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, [(VERSION_HEADER, state.version)]).into_response()
}

async fn mock_serve(State(state): State<MockState>) -> Response {
    (StatusCode::OK, [(VERSION_HEADER, state.version)], state.id).into_response()
}

/// Write a manifest plus module into `dir` and return the manifest path.
pub fn write_artifact(dir: &Path, version: &str) -> std::path::PathBuf {
    std::fs::write(dir.join("app.wasm"), b"shared-module-bytes").unwrap();
    let manifest = dir.join("artifact.toml");
    std::fs::write(
        &manifest,
        format!("name = \"hello\"\nmodule = \"app.wasm\"\nversion = \"{}\"\n", version),
    )
    .unwrap();
    manifest
}

/// Start an artifact host serving the manifest at `manifest`, reloading it on change.
pub async fn start_artifact_host(manifest: &Path, id: &str) -> SocketAddr {
    let (watcher, _updates) = ArtifactWatcher::new(manifest).unwrap();
    let app = host_router(watcher.current(), None, id);
    let watch = watcher.run().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _watch = watch;
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
