use std::fmt;

use anyhow::anyhow;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Identity of a managed artifact, stable across versions. Two artifacts are
/// the same if group, name and classifier all match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
}

impl ArtifactId {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Parses `group:artifact` or `group:artifact:classifier`.
    pub fn parse(spec: &str) -> anyhow::Result<Self> {
        let mut parts = spec.split(':');
        let group_id = parts.next().unwrap_or_default();
        let Some(artifact_id) = parts.next() else {
            return Err(anyhow!(
                "invalid artifact coordinate '{spec}': expected group:artifact[:classifier]"
            ));
        };
        let classifier = parts.next();
        if parts.next().is_some() {
            return Err(anyhow!(
                "invalid artifact coordinate '{spec}': too many segments"
            ));
        }
        if group_id.trim().is_empty() || artifact_id.trim().is_empty() {
            return Err(anyhow!(
                "invalid artifact coordinate '{spec}': group and artifact must not be empty"
            ));
        }
        if let Some(classifier) = classifier {
            if classifier.trim().is_empty() {
                return Err(anyhow!(
                    "invalid artifact coordinate '{spec}': classifier must not be empty"
                ));
            }
        }

        let mut id = Self::new(group_id, artifact_id);
        if let Some(classifier) = classifier {
            id = id.with_classifier(classifier);
        }
        Ok(id)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}

/// One artifact as recorded in the installed manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagedArtifact {
    #[serde(flatten)]
    pub id: ArtifactId,
    pub version: Version,
}

impl ManagedArtifact {
    pub fn new(id: ArtifactId, version: Version) -> Self {
        Self { id, version }
    }
}

impl fmt::Display for ManagedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}
