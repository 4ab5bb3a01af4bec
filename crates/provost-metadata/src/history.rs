use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::InstallationLayout;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionKind {
    /// Initial provision or full reprovision of the installation.
    Provision,
    /// In-place update against the existing provisioning config.
    Update,
}

impl ProvisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Update => "update",
        }
    }
}

/// One completed provisioning run, appended after the manifest commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionRecord {
    pub kind: ProvisionKind,
    pub recorded_at_unix: u64,
    pub artifact_count: usize,
}

pub(crate) fn append_provision_record(
    layout: &InstallationLayout,
    record: &ProvisionRecord,
) -> Result<()> {
    let dir = layout.history_dir();
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let serialized =
        toml::to_string_pretty(record).context("failed to serialize provision record")?;

    // Several commits can land within the same second; probe for a free
    // name so no record ever overwrites an earlier one.
    let base = format!("{}-{}", record.recorded_at_unix, record.kind.as_str());
    let mut attempt = 0u32;
    loop {
        let file_name = if attempt == 0 {
            format!("{base}.toml")
        } else {
            format!("{base}-{attempt}.toml")
        };
        let path = dir.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(serialized.as_bytes()).with_context(|| {
                    format!("failed to write provision record: {}", path.display())
                })?;
                return Ok(());
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                attempt += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to create provision record: {}", path.display())
                });
            }
        }
    }
}

/// Returns every recorded provisioning run, oldest first.
pub fn read_provision_records(layout: &InstallationLayout) -> Result<Vec<ProvisionRecord>> {
    let dir = layout.history_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for entry in
        fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|v| v.to_str()) != Some("toml") {
            continue;
        }
        records.push(read_record(&path)?);
    }

    records.sort_by_key(|record| record.recorded_at_unix);
    Ok(records)
}

fn read_record(path: &Path) -> Result<ProvisionRecord> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read provision record: {}", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("failed to parse provision record: {}", path.display()))
}

pub(crate) fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}
