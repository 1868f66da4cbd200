//! Artifact storage
//!
//! Layout on disk:
//!
//! ```text
//! <root>/<run_id>/<target>/<binary>
//! <root>/<run_id>/<target>/<companion files>
//! <root>/<run_id>/<target>/metadata.json
//! <root>/<run_id>/release.json
//! ```

use ferry_core::domain::artifact::Artifact;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("target '{0}' cannot be used as a directory name")]
    InvalidTarget(String),

    #[error("{0} has no file name")]
    NoFileName(PathBuf),

    #[error("file name '{0}' is used twice in one artifact directory")]
    NameCollision(String),

    #[error("failed to encode metadata: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub version: String,
    pub target: String,
    pub stage: String,
    pub task: String,
    pub binary: String,
    pub companions: Vec<String>,
    pub sha256: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// What to store for one target
#[derive(Debug, Clone)]
pub struct StoreRequest<'a> {
    pub run_id: Uuid,
    pub version: &'a str,
    pub stage: &'a str,
    pub task: &'a str,
    pub target: &'a str,
    pub binary: &'a Path,
    pub companions: &'a [PathBuf],
}

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    pub fn target_dir(&self, run_id: Uuid, target: &str) -> Result<PathBuf, StorageError> {
        let invalid = target.is_empty()
            || target == "."
            || target == ".."
            || target.contains(['/', '\\']);
        if invalid {
            return Err(StorageError::InvalidTarget(target.to_string()));
        }
        Ok(self.run_dir(run_id).join(target))
    }

    /// Copies the binary and companions into the target directory and writes its metadata
    pub fn store(&self, request: &StoreRequest<'_>) -> Result<Artifact, StorageError> {
        let dir = self.target_dir(request.run_id, request.target)?;
        check_names(request)?;
        std::fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let binary = copy_into(&dir, request.binary)?;
        let sha256 = sha256_file(&binary)?;

        let mut companions = Vec::with_capacity(request.companions.len());
        for companion in request.companions {
            companions.push(copy_into(&dir, companion)?);
        }

        let created_at = chrono::Utc::now();
        let metadata = ArtifactMetadata {
            version: request.version.to_string(),
            target: request.target.to_string(),
            stage: request.stage.to_string(),
            task: request.task.to_string(),
            binary: file_name(&binary)?,
            companions: companions
                .iter()
                .map(|c| file_name(c))
                .collect::<Result<_, _>>()?,
            sha256: sha256.clone(),
            created_at,
        };

        let metadata_path = dir.join(METADATA_FILE);
        let json = serde_json::to_vec_pretty(&metadata)?;
        std::fs::write(&metadata_path, json).map_err(io_error(&metadata_path))?;

        debug!(target = %request.target, path = %binary.display(), "Stored artifact");

        Ok(Artifact {
            target: metadata.target,
            version: metadata.version,
            stage: metadata.stage,
            task: metadata.task,
            binary,
            companions,
            sha256,
            created_at,
        })
    }

    pub fn read_metadata(&self, run_id: Uuid, target: &str) -> Result<ArtifactMetadata, StorageError> {
        let path = self.target_dir(run_id, target)?.join(METADATA_FILE);
        let bytes = std::fs::read(&path).map_err(io_error(&path))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Removes a target directory; used to undo a partially stored set
    pub fn remove_target(&self, run_id: Uuid, target: &str) -> Result<(), StorageError> {
        let dir = self.target_dir(run_id, target)?;
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&dir)(e)),
        }
    }
}

fn file_name(path: &Path) -> Result<String, StorageError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| StorageError::NoFileName(path.to_path_buf()))
}

/// Binary, companions and metadata share one directory, so their names must be distinct
fn check_names(request: &StoreRequest<'_>) -> Result<(), StorageError> {
    let mut seen = HashSet::from([METADATA_FILE.to_string()]);
    for path in std::iter::once(request.binary).chain(request.companions.iter().map(PathBuf::as_path)) {
        let name = file_name(path)?;
        if !seen.insert(name.clone()) {
            return Err(StorageError::NameCollision(name));
        }
    }
    Ok(())
}

fn copy_into(dir: &Path, source: &Path) -> Result<PathBuf, StorageError> {
    let name = source
        .file_name()
        .ok_or_else(|| StorageError::NoFileName(source.to_path_buf()))?;
    let dest = dir.join(name);
    std::fs::copy(source, &dest).map_err(io_error(source))?;
    Ok(dest)
}

/// Calculate SHA-256 hash of a file
pub fn sha256_file(path: &Path) -> Result<String, StorageError> {
    let data = std::fs::read(path).map_err(io_error(path))?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_lays_out_target_dir() {
        let work = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let binary = work.path().join("cargo-shuttle");
        let license = work.path().join("LICENSE");
        std::fs::write(&binary, b"abc").unwrap();
        std::fs::write(&license, b"MIT").unwrap();

        let store = ArtifactStore::new(root.path());
        let run_id = Uuid::new_v4();
        let artifact = store
            .store(&StoreRequest {
                run_id,
                version: "v0.48.0",
                stage: "build",
                task: "linux",
                target: "x86_64-unknown-linux-musl",
                binary: &binary,
                companions: std::slice::from_ref(&license),
            })
            .unwrap();

        let dir = root
            .path()
            .join(run_id.to_string())
            .join("x86_64-unknown-linux-musl");
        assert_eq!(artifact.binary, dir.join("cargo-shuttle"));
        assert_eq!(artifact.companions, vec![dir.join("LICENSE")]);
        // sha256("abc")
        assert_eq!(
            artifact.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let metadata = store
            .read_metadata(run_id, "x86_64-unknown-linux-musl")
            .unwrap();
        assert_eq!(metadata.version, "v0.48.0");
        assert_eq!(metadata.task, "linux");
        assert_eq!(metadata.binary, "cargo-shuttle");
        assert_eq!(metadata.companions, vec!["LICENSE"]);
        assert_eq!(metadata.sha256, artifact.sha256);
    }

    #[test]
    fn test_rejects_path_like_targets() {
        let store = ArtifactStore::new("/tmp/ferry");
        let run_id = Uuid::new_v4();
        for target in ["", ".", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.target_dir(run_id, target),
                Err(StorageError::InvalidTarget(_))
            ));
        }
    }

    #[test]
    fn test_colliding_file_names_are_rejected() {
        let work = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let binary = work.path().join("app");
        let metadata = work.path().join("docs").join(METADATA_FILE);
        let shadow = work.path().join("docs").join("app");
        std::fs::create_dir_all(work.path().join("docs")).unwrap();
        for path in [&binary, &metadata, &shadow] {
            std::fs::write(path, b"x").unwrap();
        }

        let store = ArtifactStore::new(root.path());
        let run_id = Uuid::new_v4();
        for companion in [metadata, shadow] {
            let result = store.store(&StoreRequest {
                run_id,
                version: "v1",
                stage: "build",
                task: "linux",
                target: "linux",
                binary: &binary,
                companions: std::slice::from_ref(&companion),
            });
            assert!(matches!(result, Err(StorageError::NameCollision(_))));
        }
        assert!(!root.path().join(run_id.to_string()).exists());
    }

    #[test]
    fn test_remove_missing_target_is_ok() {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path());
        assert!(store.remove_target(Uuid::new_v4(), "linux").is_ok());
    }
}
