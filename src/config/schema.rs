//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::backend::{BackendKind, ColdStartClass};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Inbound listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Backends registered at startup, as if they had announced themselves.
    pub backends: Vec<BackendConfig>,

    /// Active health check settings.
    pub health_check: HealthCheckConfig,

    /// Readiness tracker thresholds and windows.
    pub tracker: TrackerConfig,

    /// Request dispatch settings.
    pub dispatch: DispatchConfig,

    /// Shared artifact location.
    pub artifact: ArtifactConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Registration/admin API.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Largest request body buffered for forwarding.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Statically configured backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Stable backend identifier.
    pub id: String,

    pub kind: BackendKind,

    /// Backend address (e.g., "10.0.0.12:3000").
    pub address: String,

    /// Overrides the class implied by `kind`.
    #[serde(default)]
    pub cold_start_class: Option<ColdStartClass>,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// When set, a probe reporting a different `x-artifact-version` fails.
    pub expected_artifact_version: Option<String>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
            path: "/health".to_string(),
            expected_artifact_version: None,
        }
    }
}

/// Readiness tracker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Health record retention window in seconds.
    pub retention_secs: u64,

    /// Hard cap on records kept per backend.
    pub max_records: usize,

    /// Smoothing factor for the latency EWMA (0 < alpha <= 1).
    pub ewma_alpha: f64,

    /// Failure rate at or above which a backend is degraded.
    pub degrade_failure_rate: f64,

    /// Records needed before the failure rate is trusted.
    pub min_samples: usize,

    /// Consecutive failures that eject a backend.
    pub eject_after_failures: u32,

    /// Interval of the retention sweep in seconds.
    pub sweep_interval_secs: u64,

    /// Latency above which a warm success counts as slow.
    pub slow_latency_ms: u64,

    /// Extra latency tolerated on a cold request, per cold-start class.
    pub cold_start_allowance_ms: ClassAllowances,

    /// Latency assumed for a backend with no samples yet.
    pub initial_latency_ms: u64,

    /// Lower clamp for latency when computing weights.
    pub latency_floor_ms: u64,

    /// Upper clamp for latency when computing weights.
    pub latency_ceiling_ms: u64,

    /// Weight multiplier applied to warming backends.
    pub warming_weight_factor: f64,

    /// Ejected backends return to unknown after this long.
    pub auto_reset_secs: Option<u64>,

    /// Ejected backends are deregistered after this long.
    pub removal_after_secs: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            retention_secs: 60,
            max_records: 256,
            ewma_alpha: 0.3,
            degrade_failure_rate: 0.5,
            min_samples: 3,
            eject_after_failures: 5,
            sweep_interval_secs: 5,
            slow_latency_ms: 1000,
            cold_start_allowance_ms: ClassAllowances::default(),
            initial_latency_ms: 100,
            latency_floor_ms: 5,
            latency_ceiling_ms: 5000,
            warming_weight_factor: 0.25,
            auto_reset_secs: None,
            removal_after_secs: None,
        }
    }
}

/// Millisecond allowances keyed by cold-start class.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassAllowances {
    pub zero: u64,
    pub bounded_delay: u64,
}

impl Default for ClassAllowances {
    fn default() -> Self {
        Self {
            zero: 0,
            bounded_delay: 10_000,
        }
    }
}

impl ClassAllowances {
    pub fn get(&self, class: ColdStartClass) -> u64 {
        match class {
            ColdStartClass::Zero => self.zero,
            ColdStartClass::BoundedDelay => self.bounded_delay,
        }
    }
}

/// Multipliers keyed by cold-start class.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassMultipliers {
    pub zero: f64,
    pub bounded_delay: f64,
}

impl Default for ClassMultipliers {
    fn default() -> Self {
        Self {
            zero: 1.0,
            bounded_delay: 3.0,
        }
    }
}

impl ClassMultipliers {
    pub fn get(&self, class: ColdStartClass) -> f64 {
        match class {
            ColdStartClass::Zero => self.zero,
            ColdStartClass::BoundedDelay => self.bounded_delay,
        }
    }
}

/// Operator-assigned base weight per backend kind.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct KindWeights {
    pub persistent_instance: f64,
    pub managed_container: f64,
    pub ephemeral_function: f64,
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            persistent_instance: 1.0,
            managed_container: 1.0,
            ephemeral_function: 1.0,
        }
    }
}

impl KindWeights {
    pub fn get(&self, kind: BackendKind) -> f64 {
        match kind {
            BackendKind::PersistentInstance => self.persistent_instance,
            BackendKind::ManagedContainer => self.managed_container,
            BackendKind::EphemeralFunction => self.ephemeral_function,
        }
    }
}

/// Selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    WeightedFair,
    RoundRobin,
}

/// Dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub policy: PolicyKind,

    /// Base weight per kind, multiplied into the latency-derived weight.
    pub base_weights: KindWeights,

    /// Forwarding timeout for a warm backend, in milliseconds.
    pub request_timeout_ms: u64,

    /// Timeout multiplier for the first request of a warm period, per class.
    pub timeout_multipliers: ClassMultipliers,

    /// Allow the single retry of idempotent requests on another backend.
    pub retry_enabled: bool,

    /// Base delay before the retry in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay before the retry in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::WeightedFair,
            base_weights: KindWeights::default(),
            request_timeout_ms: 10_000,
            timeout_multipliers: ClassMultipliers::default(),
            retry_enabled: true,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 100,
        }
    }
}

/// Shared artifact configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Manifest on shared storage; its version becomes the expected probe version.
    pub manifest_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the registration/admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
