//! Backend side of the shared artifact contract.
//!
//! # Responsibilities
//! - Serve the health path independently of the application path
//! - Health means the artifact on shared storage still verifies
//! - Report the served version in every response

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::artifact::{ArtifactReference, VERSION_HEADER};

pub const DEFAULT_HEALTH_PATH: &str = "/health";

#[derive(Clone)]
struct HostState {
    artifact: Arc<ArcSwap<ArtifactReference>>,
    backend_id: Arc<str>,
}

/// Router for one backend serving `artifact`.
///
/// `health_path` falls back to the manifest's, then to [`DEFAULT_HEALTH_PATH`].
pub fn host_router(artifact: Arc<ArcSwap<ArtifactReference>>, health_path: Option<&str>, backend_id: &str) -> Router {
    let path = health_path
        .map(str::to_string)
        .or_else(|| artifact.load().health_path.clone())
        .unwrap_or_else(|| DEFAULT_HEALTH_PATH.to_string());

    let state = HostState {
        artifact,
        backend_id: Arc::from(backend_id),
    };

    Router::new()
        .route(&path, get(health))
        .fallback(serve_artifact)
        .with_state(state)
}

async fn health(State(state): State<HostState>) -> Response {
    let artifact = state.artifact.load_full();
    let version = version_header(&artifact);

    // Reads and hashes the whole module
    let checked = artifact.clone();
    let verified = match tokio::task::spawn_blocking(move || checked.verify()).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("verification task failed: {}", e)),
    };

    match verified {
        Ok(()) => (
            StatusCode::OK,
            [version],
            Json(json!({ "status": "ok", "version": artifact.version })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Artifact failed verification");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [version],
                Json(json!({ "status": "unavailable", "error": e })),
            )
                .into_response()
        }
    }
}

async fn serve_artifact(State(state): State<HostState>, method: Method, uri: Uri) -> Response {
    let artifact = state.artifact.load_full();
    (
        StatusCode::OK,
        [version_header(&artifact)],
        Json(json!({
            "backend": &*state.backend_id,
            "artifact": artifact.name,
            "version": artifact.version,
            "digest": artifact.digest,
            "method": method.as_str(),
            "path": uri.path(),
        })),
    )
        .into_response()
}

fn version_header(artifact: &ArtifactReference) -> (HeaderName, HeaderValue) {
    let value = HeaderValue::from_str(&artifact.version).unwrap_or_else(|_| HeaderValue::from_static("invalid"));
    (HeaderName::from_static(VERSION_HEADER), value)
}
