//! Retry eligibility.
//!
//! # Design Decisions
//! - Only safe methods (GET, HEAD, OPTIONS, TRACE) are retried
//! - Only transport failures and timeouts trigger a retry; HTTP responses never do
//! - The retry must go to a backend that has not been tried for this request

use axum::http::Method;

/// Whether a failed forward of this method may be replayed elsewhere.
pub fn is_retryable(method: &Method) -> bool {
    method.is_safe()
}
