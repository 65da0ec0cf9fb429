//! Artifact Reference loading and verification.
//!
//! # Layout
//! ```text
//! <shared dir>/
//!     artifact.toml   name, module, optional version, digest, size, health_path
//!     app.wasm        the portable module, path relative to the manifest
//! ```
//!
//! # Design Decisions
//! - Read-only: nothing here writes to shared storage
//! - Logical version is the explicit tag, or a short content digest
//! - A short or altered module is an error, never a partial load
//! - A manifest that declares `digest`/`size` pins the module it may load

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex digits of the content digest kept in derived versions.
const SHORT_DIGEST_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("module {0} is empty")]
    EmptyModule(PathBuf),

    #[error("module is {found} bytes, expected {expected}")]
    Truncated { expected: u64, found: u64 },

    #[error("module digest changed: expected {expected}, found {found}")]
    DigestMismatch { expected: String, found: String },

    #[error("module content changed but version {version} did not")]
    UntaggedChange { version: String },

    #[error("artifact watch failed: {0}")]
    Watch(#[from] notify::Error),
}

/// On-disk manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    /// Logical deployment name.
    pub name: String,

    /// Module file, relative to the manifest directory.
    pub module: String,

    /// Explicit version tag; the content digest is used when absent.
    #[serde(default)]
    pub version: Option<String>,

    /// Health path the hosting backend should serve.
    #[serde(default)]
    pub health_path: Option<String>,

    /// Hex SHA-256 of the module, optionally prefixed with `sha256:`.
    #[serde(default)]
    pub digest: Option<String>,

    /// Module size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

/// The shared module plus its serving manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReference {
    pub name: String,
    pub manifest_path: PathBuf,
    pub module_path: PathBuf,
    /// Explicit tag or `sha256:<12 hex>`.
    pub version: String,
    /// Full lowercase hex SHA-256 of the module.
    pub digest: String,
    pub size: u64,
    pub health_path: Option<String>,
}

impl ArtifactReference {
    /// Read the manifest and the module it names.
    pub fn load(manifest_path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let manifest_path = manifest_path.as_ref().to_path_buf();
        let raw = read_to_string(&manifest_path)?;
        let manifest: Manifest = toml::from_str(&raw).map_err(|source| ArtifactError::Manifest {
            path: manifest_path.clone(),
            source,
        })?;

        let module_path = manifest_path
            .parent()
            .map(|dir| dir.join(&manifest.module))
            .unwrap_or_else(|| PathBuf::from(&manifest.module));
        let module = read(&module_path)?;
        if module.is_empty() {
            return Err(ArtifactError::EmptyModule(module_path));
        }

        let size = module.len() as u64;
        if let Some(expected) = manifest.size.filter(|&expected| expected != size) {
            return Err(ArtifactError::Truncated { expected, found: size });
        }

        let digest = hex_digest(&module);
        if let Some(expected) = &manifest.digest {
            let expected = expected.trim().trim_start_matches("sha256:").to_ascii_lowercase();
            if expected != digest {
                return Err(ArtifactError::DigestMismatch { expected, found: digest });
            }
        }

        let version = manifest
            .version
            .clone()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| format!("sha256:{}", &digest[..SHORT_DIGEST_LEN]));

        Ok(Self {
            name: manifest.name,
            manifest_path,
            module_path,
            version,
            digest,
            size,
            health_path: manifest.health_path,
        })
    }

    /// Re-read the module and check it still matches what was loaded.
    pub fn verify(&self) -> Result<(), ArtifactError> {
        let module = read(&self.module_path)?;
        let found = module.len() as u64;
        if found != self.size {
            return Err(ArtifactError::Truncated {
                expected: self.size,
                found,
            });
        }

        let digest = hex_digest(&module);
        if digest != self.digest {
            return Err(ArtifactError::DigestMismatch {
                expected: self.digest.clone(),
                found: digest,
            });
        }
        Ok(())
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_to_string(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_artifact(dir: &Path, manifest: &str, module: &[u8]) -> PathBuf {
        fs::write(dir.join("app.wasm"), module).unwrap();
        let path = dir.join("artifact.toml");
        fs::write(&path, manifest).unwrap();
        path
    }

    #[test]
    fn test_version_from_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(dir.path(), "name = \"hello\"\nmodule = \"app.wasm\"\n", b"\0asm-module");

        let reference = ArtifactReference::load(&path).unwrap();
        assert_eq!(reference.name, "hello");
        assert_eq!(reference.module_path, dir.path().join("app.wasm"));
        assert_eq!(reference.digest.len(), 64);
        assert_eq!(reference.version, format!("sha256:{}", &reference.digest[..12]));
        assert!(reference.health_path.is_none());

        // Same bytes, same logical version
        let again = ArtifactReference::load(&path).unwrap();
        assert_eq!(again.version, reference.version);
    }

    #[test]
    fn test_explicit_tag_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(
            dir.path(),
            "name = \"hello\"\nmodule = \"app.wasm\"\nversion = \"v3\"\nhealth_path = \"/ready\"\n",
            b"module",
        );
        let reference = ArtifactReference::load(&path).unwrap();
        assert_eq!(reference.version, "v3");
        assert_eq!(reference.health_path.as_deref(), Some("/ready"));
    }

    #[test]
    fn test_verify_detects_partial_and_changed_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(dir.path(), "name = \"hello\"\nmodule = \"app.wasm\"\n", b"0123456789");
        let reference = ArtifactReference::load(&path).unwrap();
        reference.verify().unwrap();

        fs::write(dir.path().join("app.wasm"), b"01234").unwrap();
        assert!(matches!(reference.verify(), Err(ArtifactError::Truncated { expected: 10, found: 5 })));

        fs::write(dir.path().join("app.wasm"), b"9876543210").unwrap();
        assert!(matches!(reference.verify(), Err(ArtifactError::DigestMismatch { .. })));

        fs::remove_file(dir.path().join("app.wasm")).unwrap();
        assert!(matches!(reference.verify(), Err(ArtifactError::Io { .. })));
    }

    #[test]
    fn test_declared_digest_and_size_pin_the_module() {
        let dir = tempfile::tempdir().unwrap();
        let digest = hex_digest(b"0123456789");
        let manifest = format!(
            "name = \"hello\"\nmodule = \"app.wasm\"\nversion = \"v1\"\ndigest = \"sha256:{}\"\nsize = 10\n",
            digest
        );
        let path = write_artifact(dir.path(), &manifest, b"0123456789");
        assert_eq!(ArtifactReference::load(&path).unwrap().digest, digest);

        // Module caught mid-write
        fs::write(dir.path().join("app.wasm"), b"01234").unwrap();
        assert!(matches!(
            ArtifactReference::load(&path),
            Err(ArtifactError::Truncated { expected: 10, found: 5 })
        ));

        fs::write(dir.path().join("app.wasm"), b"9876543210").unwrap();
        assert!(matches!(ArtifactReference::load(&path), Err(ArtifactError::DigestMismatch { .. })));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ArtifactReference::load(dir.path().join("missing.toml")),
            Err(ArtifactError::Io { .. })
        ));

        let path = write_artifact(dir.path(), "module = ", b"x");
        assert!(matches!(ArtifactReference::load(&path), Err(ArtifactError::Manifest { .. })));

        let path = write_artifact(dir.path(), "name = \"a\"\nmodule = \"app.wasm\"\n", b"");
        assert!(matches!(ArtifactReference::load(&path), Err(ArtifactError::EmptyModule(_))));
    }
}
