//! Routing decision record.

use std::time::Instant;

use crate::load_balancer::backend::BackendId;

/// One routing choice. Not persisted; attached to the response as an extension.
#[derive(Debug, Clone)]
pub struct DispatchDecision {
    /// Selected backend.
    pub backend: BackendId,

    /// Inbound request identifier.
    pub request_id: String,

    pub decided_at: Instant,

    /// Selection policy that made the choice.
    pub policy: &'static str,

    /// 1 for the first choice, 2 for the retry.
    pub attempt: u32,
}

impl DispatchDecision {
    pub fn new(backend: BackendId, request_id: impl Into<String>, policy: &'static str, attempt: u32) -> Self {
        Self {
            backend,
            request_id: request_id.into(),
            decided_at: Instant::now(),
            policy,
            attempt,
        }
    }
}
