//! Dispatch failures as the inbound caller sees them.

use std::time::Duration;

use axum::http::StatusCode;

use crate::load_balancer::backend::BackendId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Nothing ready or warming. Never retried.
    #[error("no backend available")]
    NoBackendAvailable,

    #[error("upstream '{backend}' failed: {message}")]
    Transport { backend: BackendId, message: String },

    #[error("upstream '{backend}' timed out after {after:?}")]
    Timeout { backend: BackendId, after: Duration },
}

impl DispatchError {
    /// Service unavailable or gateway failure; nothing else leaks out.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoBackendAvailable => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Transport { .. } => StatusCode::BAD_GATEWAY,
            DispatchError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn backend(&self) -> Option<&BackendId> {
        match self {
            DispatchError::NoBackendAvailable => None,
            DispatchError::Transport { backend, .. } | DispatchError::Timeout { backend, .. } => Some(backend),
        }
    }
}
