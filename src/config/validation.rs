//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, rates within 0..=1, ports valid)
//! - Detect duplicate static backends
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;
use crate::load_balancer::backend::BackendSpec;

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut check = |ok: bool, field: &str, message: &str| {
        if !ok {
            errors.push(ValidationError::new(field, message));
        }
    };

    let listener = &config.listener;
    check(
        listener.bind_address.parse::<SocketAddr>().is_ok(),
        "listener.bind_address",
        "must be a socket address",
    );
    check(listener.max_connections > 0, "listener.max_connections", "must be > 0");
    check(listener.max_body_bytes > 0, "listener.max_body_bytes", "must be > 0");
    if let Some(tls) = &listener.tls {
        check(!tls.cert_path.is_empty(), "listener.tls.cert_path", "must not be empty");
        check(!tls.key_path.is_empty(), "listener.tls.key_path", "must not be empty");
    }

    let health = &config.health_check;
    check(health.interval_secs > 0, "health_check.interval_secs", "must be > 0");
    check(health.timeout_secs > 0, "health_check.timeout_secs", "must be > 0");
    check(health.path.starts_with('/'), "health_check.path", "must start with '/'");

    let tracker = &config.tracker;
    check(tracker.retention_secs > 0, "tracker.retention_secs", "must be > 0");
    check(tracker.max_records > 0, "tracker.max_records", "must be > 0");
    check(
        tracker.ewma_alpha > 0.0 && tracker.ewma_alpha <= 1.0,
        "tracker.ewma_alpha",
        "must be in (0, 1]",
    );
    check(
        tracker.degrade_failure_rate > 0.0 && tracker.degrade_failure_rate <= 1.0,
        "tracker.degrade_failure_rate",
        "must be in (0, 1]",
    );
    check(tracker.min_samples > 0, "tracker.min_samples", "must be > 0");
    check(tracker.eject_after_failures > 0, "tracker.eject_after_failures", "must be > 0");
    check(tracker.sweep_interval_secs > 0, "tracker.sweep_interval_secs", "must be > 0");
    check(
        (0.0..=1.0).contains(&tracker.warming_weight_factor),
        "tracker.warming_weight_factor",
        "must be in [0, 1]",
    );
    check(tracker.latency_floor_ms > 0, "tracker.latency_floor_ms", "must be > 0");
    check(
        tracker.latency_floor_ms <= tracker.latency_ceiling_ms,
        "tracker.latency_ceiling_ms",
        "must not be below latency_floor_ms",
    );

    let dispatch = &config.dispatch;
    check(dispatch.request_timeout_ms > 0, "dispatch.request_timeout_ms", "must be > 0");
    let weights = &dispatch.base_weights;
    for (field, weight) in [
        ("dispatch.base_weights.persistent_instance", weights.persistent_instance),
        ("dispatch.base_weights.managed_container", weights.managed_container),
        ("dispatch.base_weights.ephemeral_function", weights.ephemeral_function),
    ] {
        check(weight.is_finite() && weight >= 0.0, field, "must be a non-negative number");
    }
    for (field, multiplier) in [
        ("dispatch.timeout_multipliers.zero", dispatch.timeout_multipliers.zero),
        ("dispatch.timeout_multipliers.bounded_delay", dispatch.timeout_multipliers.bounded_delay),
    ] {
        check(multiplier.is_finite() && multiplier >= 1.0, field, "must be >= 1.0");
    }
    check(
        dispatch.retry_base_delay_ms <= dispatch.retry_max_delay_ms,
        "dispatch.retry_max_delay_ms",
        "must not be below retry_base_delay_ms",
    );

    let obs = &config.observability;
    if obs.metrics_enabled {
        check(
            obs.metrics_address.parse::<SocketAddr>().is_ok(),
            "observability.metrics_address",
            "must be a socket address",
        );
    }

    let admin = &config.admin;
    if admin.enabled {
        check(
            admin.bind_address.parse::<SocketAddr>().is_ok(),
            "admin.bind_address",
            "must be a socket address",
        );
        check(!admin.api_key.trim().is_empty(), "admin.api_key", "must not be empty");
    }

    let mut seen = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        let field = format!("backends[{}]", i);
        if backend.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.id", field), "must not be empty"));
        } else if !seen.insert(backend.id.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.id", field),
                format!("duplicate backend id '{}'", backend.id),
            ));
        }
        if let Err(e) = BackendSpec::new(backend.id.as_str(), backend.kind, &backend.address, backend.cold_start_class) {
            errors.push(ValidationError::new(format!("{}.address", field), e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
