//! Shared-storage watcher for artifact reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::artifact::reference::{ArtifactError, ArtifactReference};

/// Monitors the manifest and module of an Artifact Reference for changes.
pub struct ArtifactWatcher {
    current: Arc<ArcSwap<ArtifactReference>>,
    update_tx: mpsc::UnboundedSender<Arc<ArtifactReference>>,
}

impl ArtifactWatcher {
    /// Load the reference once and prepare to watch it.
    ///
    /// Returns the watcher and a receiver that sees every reference whose
    /// version differs from the one before it.
    pub fn new(
        manifest_path: impl AsRef<Path>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Arc<ArtifactReference>>), ArtifactError> {
        let reference = ArtifactReference::load(manifest_path)?;
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        Ok((
            Self {
                current: Arc::new(ArcSwap::from_pointee(reference)),
                update_tx,
            },
            update_rx,
        ))
    }

    /// Handle to the live reference.
    pub fn current(&self) -> Arc<ArcSwap<ArtifactReference>> {
        self.current.clone()
    }

    /// Re-load from disk. A failed load keeps the previous reference.
    ///
    /// New module content under an unchanged version is refused: it is a
    /// partial or out-of-band write, and the health path should say so.
    pub fn reload(&self) -> Result<Arc<ArtifactReference>, ArtifactError> {
        reload(&self.current, &self.update_tx)
    }

    /// Start watching the artifact directory in a background thread.
    ///
    /// The directory is watched rather than the files, so updates made by
    /// atomic rename are seen. Keep the returned handle alive.
    pub fn run(self) -> Result<RecommendedWatcher, ArtifactError> {
        let loaded = self.current.load_full();
        let manifest = loaded.manifest_path.clone();
        let module = loaded.module_path.clone();
        let dir = manifest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let current = self.current.clone();
        let tx = self.update_tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.paths.iter().any(|p| same_file(p, &manifest) || same_file(p, &module));
                    if relevant && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::info!("Artifact change detected, reloading...");
                        if let Err(e) = reload(&current, &tx) {
                            tracing::error!(error = %e, "Failed to reload artifact, keeping current reference");
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?dir, version = %loaded.version, "Artifact watcher started");
        Ok(watcher)
    }
}

fn reload(
    current: &ArcSwap<ArtifactReference>,
    tx: &mpsc::UnboundedSender<Arc<ArtifactReference>>,
) -> Result<Arc<ArtifactReference>, ArtifactError> {
    let previous = current.load_full();
    let next = Arc::new(ArtifactReference::load(&previous.manifest_path)?);
    if next.version == previous.version && next.digest != previous.digest {
        return Err(ArtifactError::UntaggedChange {
            version: previous.version.clone(),
        });
    }

    if *next != *previous {
        current.store(next.clone());
        if next.version != previous.version {
            tracing::info!(from = %previous.version, to = %next.version, "Artifact version changed");
            let _ = tx.send(next.clone());
        }
    }
    Ok(next)
}

// Events carry absolute paths; the watch is one directory deep, so names suffice.
fn same_file(event_path: &Path, watched: &Path) -> bool {
    event_path.file_name().is_some() && event_path.file_name() == watched.file_name()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup(dir: &Path, module: &[u8]) -> PathBuf {
        fs::write(dir.join("app.wasm"), module).unwrap();
        let path = dir.join("artifact.toml");
        fs::write(&path, "name = \"hello\"\nmodule = \"app.wasm\"\n").unwrap();
        path
    }

    #[test]
    fn test_reload_publishes_new_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = setup(dir.path(), b"first");
        let (watcher, mut updates) = ArtifactWatcher::new(&path).unwrap();
        let current = watcher.current();
        let first = current.load().version.clone();

        // Unchanged content publishes nothing
        watcher.reload().unwrap();
        assert!(updates.try_recv().is_err());

        fs::write(dir.path().join("app.wasm"), b"second").unwrap();
        let next = watcher.reload().unwrap();
        assert_ne!(next.version, first);
        assert_eq!(current.load().version, next.version);
        assert_eq!(updates.try_recv().unwrap().version, next.version);
    }

    #[test]
    fn test_content_change_under_same_tag_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.wasm"), b"first-module").unwrap();
        let path = dir.path().join("artifact.toml");
        fs::write(&path, "name = \"hello\"\nmodule = \"app.wasm\"\nversion = \"v1\"\n").unwrap();
        let (watcher, mut updates) = ArtifactWatcher::new(&path).unwrap();
        let before = watcher.current().load_full();

        fs::write(dir.path().join("app.wasm"), b"first").unwrap();
        assert!(matches!(watcher.reload(), Err(ArtifactError::UntaggedChange { .. })));
        assert_eq!(*watcher.current().load_full(), *before);
        assert!(before.verify().is_err());
        assert!(updates.try_recv().is_err());

        // The deployment finishes by bumping the tag
        fs::write(&path, "name = \"hello\"\nmodule = \"app.wasm\"\nversion = \"v2\"\n").unwrap();
        assert_eq!(watcher.reload().unwrap().version, "v2");
        assert_eq!(updates.try_recv().unwrap().version, "v2");
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = setup(dir.path(), b"first");
        let (watcher, _updates) = ArtifactWatcher::new(&path).unwrap();
        let before = watcher.current().load_full();

        fs::write(dir.path().join("app.wasm"), b"").unwrap();
        assert!(watcher.reload().is_err());
        assert_eq!(*watcher.current().load_full(), *before);
    }
}
