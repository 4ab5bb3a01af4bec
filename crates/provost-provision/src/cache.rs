use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use provost_core::{Channel, ManagedArtifact};
use provost_metadata::InstallationLayout;

use crate::ProvisioningConfig;

/// One artifact recorded in the local cache after a successful provision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedArtifact {
    #[serde(flatten)]
    pub artifact: ManagedArtifact,
    /// Digest of the cached content blob, when the source repository was
    /// local enough to copy from. Coordinates-only entries have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecordFile {
    #[serde(default = "cache_file_version")]
    version: u32,
    #[serde(default)]
    artifacts: Vec<CachedArtifact>,
}

fn cache_file_version() -> u32 {
    1
}

/// Persists the exact resolved artifact set of a provisioning run into the
/// installation's local cache, so a later run can reproduce the installation
/// or resolve offline. Runs only after the manifest commit; its failures are
/// reported, never unwound.
#[derive(Debug, Default)]
pub struct CacheExporter;

impl CacheExporter {
    pub fn new() -> Self {
        Self
    }

    pub fn cache_artifacts(
        &self,
        channels: &[Channel],
        layout: &InstallationLayout,
        config: &ProvisioningConfig,
        resolved: &[ManagedArtifact],
    ) -> Result<()> {
        let blob_dir = layout.cache_dir().join("blobs");
        fs::create_dir_all(&blob_dir)
            .with_context(|| format!("failed to create {}", blob_dir.display()))?;

        let mut referenced: Vec<ManagedArtifact> = config.feature_packs.clone();
        for artifact in resolved {
            if !referenced.iter().any(|known| known.id == artifact.id) {
                referenced.push(artifact.clone());
            }
        }

        let mut records = Vec::with_capacity(referenced.len());
        for artifact in &referenced {
            records.push(cache_one_artifact(channels, &blob_dir, artifact)?);
        }

        let record_file = CacheRecordFile {
            version: cache_file_version(),
            artifacts: records,
        };
        let path = layout.cache_record_path();
        let serialized = toml::to_string_pretty(&record_file)
            .context("failed to serialize artifact cache records")?;
        fs::write(&path, serialized)
            .with_context(|| format!("failed to write artifact cache records: {}", path.display()))?;
        Ok(())
    }
}

/// Returns the cached artifact records for an installation, if any.
pub fn read_cache_records(layout: &InstallationLayout) -> Result<Vec<CachedArtifact>> {
    let path = layout.cache_record_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read artifact cache records: {}", path.display())
            });
        }
    };

    let record_file: CacheRecordFile = toml::from_str(&raw)
        .with_context(|| format!("failed to parse artifact cache records: {}", path.display()))?;
    Ok(record_file.artifacts)
}

fn cache_one_artifact(
    channels: &[Channel],
    blob_dir: &Path,
    artifact: &ManagedArtifact,
) -> Result<CachedArtifact> {
    for channel in channels {
        for repository in &channel.repositories {
            let Some(root) = local_repository_root(&repository.url) else {
                continue;
            };
            let source = root.join(content_rel_path(artifact));
            if !source.exists() {
                continue;
            }

            let target = blob_dir.join(blob_file_name(artifact));
            fs::copy(&source, &target).with_context(|| {
                format!(
                    "failed to copy {} into cache: {}",
                    source.display(),
                    target.display()
                )
            })?;
            let digest = sha256_file(&target)?;
            return Ok(CachedArtifact {
                artifact: artifact.clone(),
                sha256: Some(digest),
                repository_id: Some(repository.id.clone()),
            });
        }
    }

    // No local content available; record coordinates only.
    Ok(CachedArtifact {
        artifact: artifact.clone(),
        sha256: None,
        repository_id: None,
    })
}

fn content_rel_path(artifact: &ManagedArtifact) -> PathBuf {
    PathBuf::from(artifact.id.group_id.replace('.', "/"))
        .join(&artifact.id.artifact_id)
        .join(blob_file_name(artifact))
}

fn blob_file_name(artifact: &ManagedArtifact) -> String {
    match &artifact.id.classifier {
        Some(classifier) => format!(
            "{}-{}-{}-{}.artifact",
            artifact.id.group_id, artifact.id.artifact_id, artifact.version, classifier
        ),
        None => format!(
            "{}-{}-{}.artifact",
            artifact.id.group_id, artifact.id.artifact_id, artifact.version
        ),
    }
}

fn sha256_file(path: &Path) -> Result<String> {
    let content = fs::read(path)
        .with_context(|| format!("failed to read cached blob: {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

fn local_repository_root(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return None;
    }
    Some(PathBuf::from(url))
}
