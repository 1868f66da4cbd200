//! Release publication
//!
//! Invoked once per run, after every required stage succeeded, with the
//! run's final artifact set.

use async_trait::async_trait;
use ferry_core::domain::artifact::ArtifactSet;
use ferry_core::domain::run::ReleaseRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::service::storage::ArtifactStore;

pub const MANIFEST_FILE: &str = "release.json";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode release manifest: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(String),
}

/// Everything a publisher is given about the release
#[derive(Debug, Clone)]
pub struct Release {
    pub run_id: Uuid,
    pub pipeline: String,
    pub version: String,
    pub artifacts: ArtifactSet,
}

#[async_trait]
pub trait ReleasePublisher: Send + Sync {
    async fn publish(&self, release: &Release) -> Result<ReleaseRecord, PublishError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    pub pipeline: String,
    pub version: String,
    pub run_id: Uuid,
    pub published_at: chrono::DateTime<chrono::Utc>,
    pub artifacts: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub target: String,
    pub binary: PathBuf,
    pub companions: Vec<PathBuf>,
    pub sha256: String,
}

/// Writes `release.json` next to the run's artifacts
pub struct ManifestPublisher {
    store: Arc<ArtifactStore>,
}

impl ManifestPublisher {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReleasePublisher for ManifestPublisher {
    async fn publish(&self, release: &Release) -> Result<ReleaseRecord, PublishError> {
        let dir = self.store.run_dir(release.run_id);
        let published_at = chrono::Utc::now();

        let manifest = ReleaseManifest {
            pipeline: release.pipeline.clone(),
            version: release.version.clone(),
            run_id: release.run_id,
            published_at,
            artifacts: release
                .artifacts
                .iter()
                .map(|a| ManifestEntry {
                    target: a.target.clone(),
                    binary: a.binary.clone(),
                    companions: a.companions.clone(),
                    sha256: a.sha256.clone(),
                })
                .collect(),
        };

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| PublishError::Io {
                path: dir.clone(),
                source,
            })?;

        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(&manifest)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| PublishError::Io {
                path: path.clone(),
                source,
            })?;

        info!(
            version = %release.version,
            artifacts = release.artifacts.len(),
            "Published release manifest to {}",
            path.display()
        );

        Ok(ReleaseRecord {
            version: release.version.clone(),
            pipeline: release.pipeline.clone(),
            run_id: release.run_id,
            manifest: path,
            artifact_count: release.artifacts.len(),
            published_at,
        })
    }
}
