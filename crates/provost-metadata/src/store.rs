use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use provost_core::{ChannelConfig, ManagedArtifact};

use crate::history::{append_provision_record, current_unix_timestamp};
use crate::{InstallationLayout, InstalledManifest, ProvisionKind, ProvisionRecord};

/// Scoped handle on the installed-state of one installation directory.
///
/// Holds an exclusive advisory lock on the state directory for its whole
/// lifetime: at most one update operation per installation at a time. The
/// lock is released by `close` or on drop, whichever comes first.
#[derive(Debug)]
pub struct InstallationMetadata {
    layout: InstallationLayout,
    lock_file: Option<File>,
    manifest: InstalledManifest,
    channel_config: ChannelConfig,
}

impl InstallationMetadata {
    /// Opens an existing installation. Fails when the directory is not a
    /// provost installation, the state files are unreadable, or another
    /// operation holds the lock.
    pub fn open(install_dir: impl Into<PathBuf>) -> Result<Self> {
        let layout = InstallationLayout::new(install_dir);
        if !layout.state_dir().exists() {
            return Err(anyhow!(
                "{} is not a provost installation (missing {})",
                layout.install_dir().display(),
                layout.state_dir().display()
            ));
        }

        let lock_file = acquire_lock(&layout)?;
        let manifest = read_manifest(&layout.manifest_path())?;
        let channel_config = read_channel_config(&layout.channels_path())?;

        Ok(Self {
            layout,
            lock_file: Some(lock_file),
            manifest,
            channel_config,
        })
    }

    /// Seeds a fresh installation with its initial manifest and channel
    /// configuration, then opens it.
    pub fn create(
        install_dir: impl Into<PathBuf>,
        manifest: InstalledManifest,
        channel_config: ChannelConfig,
    ) -> Result<Self> {
        let layout = InstallationLayout::new(install_dir);
        layout.ensure_base_dirs()?;

        write_atomic(&layout.manifest_path(), &manifest.to_toml_string()?)?;
        write_atomic(&layout.channels_path(), &channel_config.to_toml_string()?)?;

        Self::open(layout.install_dir())
    }

    pub fn layout(&self) -> &InstallationLayout {
        &self.layout
    }

    pub fn artifacts(&self) -> &[ManagedArtifact] {
        &self.manifest.artifacts
    }

    pub fn manifest(&self) -> &InstalledManifest {
        &self.manifest
    }

    pub fn channel_config(&self) -> &ChannelConfig {
        &self.channel_config
    }

    /// Replaces the in-memory artifact set with the resolved result of a
    /// provisioning run. Nothing is persisted until `record_provision`.
    pub fn set_manifest(&mut self, artifacts: Vec<ManagedArtifact>) {
        self.manifest =
            InstalledManifest::new(self.channel_config.channels.clone(), artifacts);
    }

    /// Durably commits the current manifest and appends a history record.
    /// A full reprovision also rewrites the channel configuration.
    pub fn record_provision(&mut self, full_reprovision: bool) -> Result<()> {
        self.ensure_open()?;
        self.layout.ensure_base_dirs()?;

        write_atomic(&self.layout.manifest_path(), &self.manifest.to_toml_string()?)?;
        if full_reprovision {
            write_atomic(
                &self.layout.channels_path(),
                &self.channel_config.to_toml_string()?,
            )?;
        }

        let kind = if full_reprovision {
            ProvisionKind::Provision
        } else {
            ProvisionKind::Update
        };
        append_provision_record(
            &self.layout,
            &ProvisionRecord {
                kind,
                recorded_at_unix: current_unix_timestamp()?,
                artifact_count: self.manifest.artifacts.len(),
            },
        )?;

        Ok(())
    }

    /// Releases the installation lock. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if let Some(lock_file) = self.lock_file.take() {
            let _ = FileExt::unlock(&lock_file);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.lock_file.is_none() {
            return Err(anyhow!(
                "installation metadata for {} is already closed",
                self.layout.install_dir().display()
            ));
        }
        Ok(())
    }
}

impl Drop for InstallationMetadata {
    fn drop(&mut self) {
        self.close();
    }
}

fn acquire_lock(layout: &InstallationLayout) -> Result<File> {
    let path = layout.lock_path();
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .with_context(|| format!("failed to open installation lock: {}", path.display()))?;
    lock_file.try_lock_exclusive().with_context(|| {
        format!(
            "another operation is already running against {}",
            layout.install_dir().display()
        )
    })?;
    Ok(lock_file)
}

fn read_manifest(path: &Path) -> Result<InstalledManifest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read installed manifest: {}", path.display()))?;
    InstalledManifest::from_toml_str(&raw)
        .with_context(|| format!("failed parsing installed manifest: {}", path.display()))
}

fn read_channel_config(path: &Path) -> Result<ChannelConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read channel configuration: {}", path.display()))?;
    ChannelConfig::from_toml_str(&raw)
        .with_context(|| format!("failed parsing channel configuration: {}", path.display()))
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let part_path = path.with_file_name(format!(
        "{}.part",
        path.file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("state")
    ));
    fs::write(&part_path, content)
        .with_context(|| format!("failed to write {}", part_path.display()))?;
    fs::rename(&part_path, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
