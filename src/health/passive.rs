//! Passive health checking (failure detection).
//!
//! # Design Decisions
//! - Connection errors and timeouts are failures
//! - 502/503/504 from a backend are failures; the response still reaches the caller
//! - Other statuses, 4xx and 500 included, are application answers and count as success

use axum::http::StatusCode;

/// Whether an upstream response counts as a healthy outcome.
pub fn is_healthy_response(status: StatusCode) -> bool {
    !matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(is_healthy_response(StatusCode::OK));
        assert!(is_healthy_response(StatusCode::NOT_FOUND));
        assert!(is_healthy_response(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_healthy_response(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_healthy_response(StatusCode::GATEWAY_TIMEOUT));
    }
}
