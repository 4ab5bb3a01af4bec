use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Path schema for the `.provost` state directory inside one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationLayout {
    install_dir: PathBuf,
}

impl InstallationLayout {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn state_dir(&self) -> PathBuf {
        self.install_dir.join(".provost")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.state_dir().join("manifest.toml")
    }

    pub fn channels_path(&self) -> PathBuf {
        self.state_dir().join("channels.toml")
    }

    pub fn provisioning_config_path(&self) -> PathBuf {
        self.state_dir().join("provisioning.toml")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.state_dir().join("history")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.state_dir().join("cache")
    }

    pub fn cache_record_path(&self) -> PathBuf {
        self.cache_dir().join("artifacts.toml")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("lock")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.state_dir(), self.history_dir(), self.cache_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
