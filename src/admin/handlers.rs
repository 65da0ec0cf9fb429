use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::health::state::Readiness;
use crate::health::tracker::{Registration, TrackerError};
use crate::load_balancer::backend::{BackendId, BackendKind, BackendSpec, BackendView, ColdStartClass};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub uptime_secs: u64,
    pub backends: usize,
    pub eligible: usize,
    pub by_readiness: BTreeMap<String, usize>,
}

/// Announcement body for `POST /admin/backends`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub id: String,
    pub kind: BackendKind,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cold_start_class: Option<ColdStartClass>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Created,
    Unchanged,
    Moved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: String,
    pub outcome: RegistrationOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub id: String,
    pub previous: String,
    pub readiness: String,
}

/// Registration misuse, as the admin API reports it.
#[derive(Debug)]
pub struct AdminError(TrackerError);

impl From<TrackerError> for AdminError {
    fn from(e: TrackerError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TrackerError::Duplicate { .. } => StatusCode::CONFLICT,
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.tracker.snapshot();
    let mut by_readiness = BTreeMap::new();
    for backend in &snapshot {
        *by_readiness.entry(backend.readiness.to_string()).or_insert(0) += 1;
    }

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        backends: snapshot.len(),
        eligible: snapshot.iter().filter(|b| b.is_eligible()).count(),
        by_readiness,
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendView>> {
    Json(state.tracker.snapshot().iter().cloned().collect())
}

pub async fn get_backend(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<BackendView>, AdminError> {
    let id = BackendId::from(id);
    state
        .tracker
        .get(&id)
        .map(Json)
        .ok_or_else(|| TrackerError::NotFound(id).into())
}

pub async fn register_backend(
    State(state): State<AdminState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AdminError> {
    let spec = BackendSpec::new(req.id.as_str(), req.kind, &req.address, req.cold_start_class)
        .map_err(TrackerError::from)?;

    let (status, outcome) = match state.tracker.announce(spec)? {
        Registration::Created(_) => (StatusCode::CREATED, RegistrationOutcome::Created),
        Registration::Unchanged(_) => (StatusCode::OK, RegistrationOutcome::Unchanged),
        Registration::Moved(_) => (StatusCode::OK, RegistrationOutcome::Moved),
    };
    Ok((status, Json(RegisterResponse { id: req.id, outcome })))
}

pub async fn deregister_backend(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AdminError> {
    state.tracker.deregister(&BackendId::from(id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_backend(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<ResetResponse>, AdminError> {
    let backend = BackendId::from(id);
    let previous = state.tracker.reset(&backend)?;
    tracing::info!(backend_id = %backend, from = %previous, "Backend reset by operator");

    Ok(Json(ResetResponse {
        id: backend.to_string(),
        previous: previous.to_string(),
        readiness: Readiness::Unknown.to_string(),
    }))
}
