use std::path::PathBuf;

use thiserror::Error;

use crate::{ArtifactId, Repository};

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error surface of one update operation. Callers match on the variant
/// to decide remediation; messages carry enough context to render on their
/// own.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The installed-state store could not be read, opened or committed.
    /// Fatal; no partial operation is usable after this.
    #[error("failed to access installation state at {}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: Source,
    },

    /// The provisioning engine reported a structural failure unrelated to
    /// artifact resolution. Nothing was committed.
    #[error("provisioning failed")]
    Provisioning {
        #[source]
        source: Source,
    },

    /// One or more artifacts could not be found in any configured
    /// repository, during update-finding or during provisioning.
    #[error("{}", render_resolution_failure(.artifacts, .repositories, *.offline))]
    ArtifactResolution {
        artifacts: Vec<ArtifactId>,
        repositories: Vec<Repository>,
        offline: bool,
    },

    /// Exporting resolved artifacts to the local cache failed after the
    /// manifest was already committed. Reported, never unwound.
    #[error("failed to export resolved artifacts to the local cache")]
    CacheExport {
        #[source]
        source: Source,
    },
}

impl OperationError {
    pub fn metadata(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::Metadata {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn provisioning(source: anyhow::Error) -> Self {
        Self::Provisioning {
            source: source.into(),
        }
    }

    pub fn cache_export(source: anyhow::Error) -> Self {
        Self::CacheExport {
            source: source.into(),
        }
    }
}

fn render_resolution_failure(
    artifacts: &[ArtifactId],
    repositories: &[Repository],
    offline: bool,
) -> String {
    let listed = artifacts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let consulted = if repositories.is_empty() {
        "no repositories are configured".to_string()
    } else {
        let ids = repositories
            .iter()
            .map(|repository| format!("{} ({})", repository.id, repository.url))
            .collect::<Vec<_>>()
            .join(", ");
        format!("repositories consulted: {ids}")
    };
    let remediation = if offline {
        "resolution was restricted to offline sources; retry without --offline or populate the local cache"
    } else {
        "add a repository that provides the artifact or check the channel configuration"
    };

    format!("unable to resolve artifact(s) {listed}; {consulted}; {remediation}")
}
