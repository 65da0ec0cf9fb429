//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::{GatewayConfig, PolicyKind};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load, apply `GATEWAY_*` overrides and validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let mut config = read_config(path)?;
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment variables onto a parsed config.
///
/// `lookup` is the variable source; pass `std::env::var` in production.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("GATEWAY_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(v) = lookup("GATEWAY_ADMIN_API_KEY") {
        config.admin.api_key = v;
    }
    if let Some(v) = lookup("GATEWAY_ARTIFACT_MANIFEST") {
        config.artifact.manifest_path = Some(v);
    }
    if let Some(v) = lookup("GATEWAY_EXPECTED_ARTIFACT_VERSION") {
        config.health_check.expected_artifact_version = Some(v);
    }

    override_parsed(&lookup, "GATEWAY_HEALTH_INTERVAL_SECS", &mut config.health_check.interval_secs)?;
    override_parsed(&lookup, "GATEWAY_RETENTION_SECS", &mut config.tracker.retention_secs)?;
    override_parsed(&lookup, "GATEWAY_DEGRADE_FAILURE_RATE", &mut config.tracker.degrade_failure_rate)?;
    override_parsed(&lookup, "GATEWAY_EJECT_AFTER_FAILURES", &mut config.tracker.eject_after_failures)?;
    override_parsed(&lookup, "GATEWAY_REQUEST_TIMEOUT_MS", &mut config.dispatch.request_timeout_ms)?;
    override_parsed(
        &lookup,
        "GATEWAY_WEIGHT_PERSISTENT_INSTANCE",
        &mut config.dispatch.base_weights.persistent_instance,
    )?;
    override_parsed(
        &lookup,
        "GATEWAY_WEIGHT_MANAGED_CONTAINER",
        &mut config.dispatch.base_weights.managed_container,
    )?;
    override_parsed(
        &lookup,
        "GATEWAY_WEIGHT_EPHEMERAL_FUNCTION",
        &mut config.dispatch.base_weights.ephemeral_function,
    )?;
    override_parsed(
        &lookup,
        "GATEWAY_TIMEOUT_MULTIPLIER_BOUNDED_DELAY",
        &mut config.dispatch.timeout_multipliers.bounded_delay,
    )?;

    if let Some(v) = lookup("GATEWAY_POLICY") {
        config.dispatch.policy = match v.as_str() {
            "weighted_fair" => PolicyKind::WeightedFair,
            "round_robin" => PolicyKind::RoundRobin,
            _ => return Err(ConfigError::Env { var: "GATEWAY_POLICY", value: v }),
        };
    }
    Ok(())
}

fn override_parsed<F, T>(lookup: &F, var: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(var) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("GATEWAY_BIND_ADDRESS", "127.0.0.1:9000"),
                ("GATEWAY_EJECT_AFTER_FAILURES", "3"),
                ("GATEWAY_WEIGHT_EPHEMERAL_FUNCTION", "0.5"),
                ("GATEWAY_POLICY", "round_robin"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.tracker.eject_after_failures, 3);
        assert_eq!(config.dispatch.base_weights.ephemeral_function, 0.5);
        assert_eq!(config.dispatch.policy, PolicyKind::RoundRobin);
    }

    #[test]
    fn test_bad_env_value_is_reported() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("GATEWAY_RETENTION_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "GATEWAY_RETENTION_SECS", .. }));
    }

    #[test]
    fn test_load_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        fs::write(&path, "[tracker]\nretention_secs = 0\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));

        fs::write(&path, "[listener]\nbind_address = \"127.0.0.1:0\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:0");
    }
}
