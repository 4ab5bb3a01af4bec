use anyhow::{anyhow, Context, Result};
use provost_core::{Channel, ManagedArtifact};
use serde::{Deserialize, Serialize};

/// The recorded set of artifact coordinates actually installed, tied to the
/// channels that produced them. One per installation; rewritten as a whole
/// on each successful provision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledManifest {
    #[serde(default = "manifest_file_version")]
    pub version: u32,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub artifacts: Vec<ManagedArtifact>,
}

impl Default for InstalledManifest {
    fn default() -> Self {
        Self {
            version: manifest_file_version(),
            channels: Vec::new(),
            artifacts: Vec::new(),
        }
    }
}

fn manifest_file_version() -> u32 {
    1
}

impl InstalledManifest {
    pub fn new(channels: Vec<Channel>, artifacts: Vec<ManagedArtifact>) -> Self {
        Self {
            version: manifest_file_version(),
            channels,
            artifacts,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: Self =
            toml::from_str(content).context("failed to parse installed manifest")?;
        let expected = manifest_file_version();
        if manifest.version != expected {
            return Err(anyhow!(
                "unsupported manifest version {} (expected {}): update manifest.toml to version {}",
                manifest.version,
                expected,
                expected
            ));
        }
        Ok(manifest)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize installed manifest")
    }
}
