use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use provost_core::ManagedArtifact;
use serde::{Deserialize, Serialize};

/// Description of the feature layout to provision. Owned by the provisioning
/// engine; the update core reads it before provisioning and reuses it
/// unchanged across an update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningConfig {
    #[serde(default = "config_file_version")]
    pub version: u32,
    #[serde(default)]
    pub feature_packs: Vec<ManagedArtifact>,
    #[serde(default)]
    pub layers: Vec<String>,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            version: config_file_version(),
            feature_packs: Vec::new(),
            layers: Vec::new(),
        }
    }
}

fn config_file_version() -> u32 {
    1
}

impl ProvisioningConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("failed to parse provisioning config")?;
        let expected = config_file_version();
        if config.version != expected {
            return Err(anyhow!(
                "unsupported provisioning config version {} (expected {}): update provisioning.toml to version {}",
                config.version,
                expected,
                expected
            ));
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize provisioning config")
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read provisioning config: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("failed parsing provisioning config: {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("failed to write provisioning config: {}", path.display()))
    }
}
