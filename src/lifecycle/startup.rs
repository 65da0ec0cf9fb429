//! Startup orchestration.
//!
//! # Responsibilities
//! - Register statically configured backends
//! - Resolve the artifact version health probes expect
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - An explicit expected version pins probes; otherwise it follows the manifest

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use notify::RecommendedWatcher;

use crate::artifact::{ArtifactError, ArtifactWatcher};
use crate::config::schema::{BackendConfig, GatewayConfig};
use crate::health::tracker::{Tracker, TrackerError};
use crate::load_balancer::backend::BackendSpec;

/// Register every configured backend as if it had announced itself.
pub fn register_static_backends(tracker: &Tracker, backends: &[BackendConfig]) -> Result<usize, TrackerError> {
    for backend in backends {
        let spec = BackendSpec::new(
            backend.id.as_str(),
            backend.kind,
            &backend.address,
            backend.cold_start_class,
        )?;
        tracker.register(spec)?;
    }
    if !backends.is_empty() {
        tracing::info!(count = backends.len(), "Static backends registered");
    }
    Ok(backends.len())
}

/// Populate `expected` and keep it current.
///
/// Returns the file watcher when the version follows a manifest; the caller
/// must keep it alive for updates to continue.
pub fn track_expected_version(
    config: &GatewayConfig,
    expected: Arc<ArcSwapOption<String>>,
) -> Result<Option<RecommendedWatcher>, ArtifactError> {
    if let Some(version) = &config.health_check.expected_artifact_version {
        tracing::info!(version = %version, "Health probes pinned to artifact version");
        expected.store(Some(Arc::new(version.clone())));
        return Ok(None);
    }

    let Some(manifest) = &config.artifact.manifest_path else {
        return Ok(None);
    };

    let (watcher, mut updates) = ArtifactWatcher::new(manifest)?;
    let version = watcher.current().load().version.clone();
    tracing::info!(manifest = %manifest, version = %version, "Health probes follow artifact manifest");
    expected.store(Some(Arc::new(version)));

    let handle = watcher.run()?;
    tokio::spawn(async move {
        while let Some(reference) = updates.recv().await {
            expected.store(Some(Arc::new(reference.version.clone())));
        }
    });
    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::Readiness;
    use crate::load_balancer::backend::BackendKind;

    #[test]
    fn test_static_backends_start_unknown() {
        let tracker = Tracker::default();
        let backends = vec![
            BackendConfig {
                id: "vm-1".into(),
                kind: BackendKind::PersistentInstance,
                address: "10.0.0.1:3000".into(),
                cold_start_class: None,
            },
            BackendConfig {
                id: "fn-1".into(),
                kind: BackendKind::EphemeralFunction,
                address: "fn.internal:3000".into(),
                cold_start_class: None,
            },
        ];

        assert_eq!(register_static_backends(&tracker, &backends).unwrap(), 2);
        assert!(tracker.snapshot().iter().all(|b| b.readiness == Readiness::Unknown));
    }

    #[tokio::test]
    async fn test_expected_version_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.wasm"), b"module").unwrap();
        let manifest = dir.path().join("artifact.toml");
        std::fs::write(&manifest, "name = \"hello\"\nmodule = \"app.wasm\"\nversion = \"v7\"\n").unwrap();

        let mut config = GatewayConfig::default();
        config.artifact.manifest_path = Some(manifest.display().to_string());
        let expected = Arc::new(ArcSwapOption::empty());

        let watcher = track_expected_version(&config, expected.clone()).unwrap();
        assert!(watcher.is_some());
        assert_eq!(expected.load_full().as_deref().map(String::as_str), Some("v7"));

        // An explicit pin wins over the manifest
        config.health_check.expected_artifact_version = Some("v6".into());
        assert!(track_expected_version(&config, expected.clone()).unwrap().is_none());
        assert_eq!(expected.load_full().as_deref().map(String::as_str), Some("v6"));
    }
}
