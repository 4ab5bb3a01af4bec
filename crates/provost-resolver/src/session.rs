use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use semver::Version;
use serde::Deserialize;
use thiserror::Error;

use provost_core::{ArtifactId, Channel, Repository};

/// Explicit session settings. There is no ambient, process-wide resolver
/// state; everything the session needs arrives through this value.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// When set, remote repositories are never consulted; only `file` and
    /// plain-path repositories can answer.
    pub offline: bool,
    /// Timeout for remote version-index requests. `None` uses the client
    /// default.
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("artifact {id} was not found in any configured repository")]
    NotFound { id: ArtifactId },
    #[error("failed to query repository '{repository_id}' for {id}")]
    Repository {
        repository_id: String,
        id: ArtifactId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Resolves the latest available version for an artifact identity under one
/// effective channel set.
pub trait ResolverSession {
    fn resolve_latest(&mut self, id: &ArtifactId) -> Result<Version, ResolveError>;
}

impl<S: ResolverSession + ?Sized> ResolverSession for &mut S {
    fn resolve_latest(&mut self, id: &ArtifactId) -> Result<Version, ResolveError> {
        (**self).resolve_latest(id)
    }
}

/// The shipped session: walks every repository of every channel in order and
/// keeps the highest version any of them publishes.
///
/// Repository wire layout is minimal and resolver-owned: each repository
/// serves `<group as path>/<artifact>/versions.toml` listing the published
/// versions for that identity.
#[derive(Debug)]
pub struct RepositorySession {
    repositories: Vec<Repository>,
    config: SessionConfig,
    client: Option<reqwest::blocking::Client>,
}

#[derive(Debug, Deserialize)]
struct VersionIndexFile {
    #[serde(default)]
    versions: Vec<String>,
}

impl RepositorySession {
    pub fn new(channels: &[Channel], config: SessionConfig) -> anyhow::Result<Self> {
        let mut seen = std::collections::HashSet::new();
        let mut repositories = Vec::new();
        for channel in channels {
            for repository in &channel.repositories {
                if seen.insert(repository.id.clone()) {
                    repositories.push(repository.clone());
                }
            }
        }

        let client = if config.offline {
            None
        } else {
            let mut builder = reqwest::blocking::Client::builder();
            if let Some(timeout) = config.request_timeout {
                builder = builder.timeout(timeout);
            }
            Some(
                builder
                    .build()
                    .context("failed to build repository http client")?,
            )
        };

        Ok(Self {
            repositories,
            config,
            client,
        })
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn offline(&self) -> bool {
        self.config.offline
    }

    fn published_versions(
        &self,
        repository: &Repository,
        id: &ArtifactId,
    ) -> Result<Vec<Version>, ResolveError> {
        let raw = match self.fetch_version_index(repository, id) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(Vec::new()),
            Err(source) => {
                return Err(ResolveError::Repository {
                    repository_id: repository.id.clone(),
                    id: id.clone(),
                    source: source.into(),
                });
            }
        };

        parse_version_index(&raw, id).map_err(|source| ResolveError::Repository {
            repository_id: repository.id.clone(),
            id: id.clone(),
            source: source.into(),
        })
    }

    fn fetch_version_index(
        &self,
        repository: &Repository,
        id: &ArtifactId,
    ) -> anyhow::Result<Option<String>> {
        let rel_path = version_index_rel_path(id);

        if let Some(local_root) = local_repository_root(&repository.url) {
            let path = local_root.join(rel_path);
            return read_local_index(&path);
        }

        if self.config.offline {
            // Remote repositories are silently out of reach offline; the
            // not-found path reports the restriction.
            return Ok(None);
        }

        let Some(client) = &self.client else {
            return Ok(None);
        };
        let url = format!("{}/{}", repository.url.trim_end_matches('/'), rel_path);
        let response = client
            .get(&url)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .with_context(|| format!("request to {url} failed"))?;
        let body = response
            .text()
            .with_context(|| format!("failed to read response body from {url}"))?;
        Ok(Some(body))
    }
}

impl ResolverSession for RepositorySession {
    fn resolve_latest(&mut self, id: &ArtifactId) -> Result<Version, ResolveError> {
        let mut latest: Option<Version> = None;
        for repository in &self.repositories {
            for version in self.published_versions(repository, id)? {
                match &latest {
                    Some(current) if *current >= version => {}
                    _ => latest = Some(version),
                }
            }
        }

        latest.ok_or_else(|| ResolveError::NotFound { id: id.clone() })
    }
}

fn version_index_rel_path(id: &ArtifactId) -> String {
    format!(
        "{}/{}/versions.toml",
        id.group_id.replace('.', "/"),
        id.artifact_id
    )
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

fn read_local_index(path: &Path) -> anyhow::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err)
            .with_context(|| format!("failed to read version index: {}", path.display())),
    }
}

fn parse_version_index(raw: &str, id: &ArtifactId) -> anyhow::Result<Vec<Version>> {
    let index: VersionIndexFile =
        toml::from_str(raw).with_context(|| format!("invalid version index for {id}"))?;

    index
        .versions
        .iter()
        .map(|value| {
            Version::parse(value)
                .with_context(|| format!("invalid version '{value}' in index for {id}"))
        })
        .collect()
}
