//! Response mapping for dispatch failures.
//!
//! # Design Decisions
//! - Backend responses pass through untouched, whatever their status
//! - Gateway failures collapse to 503, 502 or 504 with a short text body
//! - Internal detail (addresses, transport errors) stays in the logs

use axum::response::{IntoResponse, Response};

use crate::dispatch::DispatchError;

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let message = match &self {
            DispatchError::NoBackendAvailable => "No backend available",
            DispatchError::Transport { .. } => "Upstream request failed",
            DispatchError::Timeout { .. } => "Upstream request timed out",
        };
        (self.status(), message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            DispatchError::NoBackendAvailable.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let timeout = DispatchError::Timeout {
            backend: "fn".into(),
            after: Duration::from_secs(1),
        };
        assert_eq!(timeout.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
