use std::collections::HashSet;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

/// One artifact source. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub url: String,
}

impl Repository {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    #[default]
    Latest,
}

impl ResolutionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
        }
    }
}

/// Named resolution scope pairing an ordered repository list with a
/// version-resolution strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    #[serde(default)]
    pub strategy: ResolutionStrategy,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

/// The channel configuration of one installation. Replaced wholesale on
/// configuration changes, never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    #[serde(default = "config_file_version")]
    pub version: u32,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            version: config_file_version(),
            channels: Vec::new(),
        }
    }
}

fn config_file_version() -> u32 {
    1
}

impl ChannelConfig {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            version: config_file_version(),
            channels,
        }
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self =
            toml::from_str(content).context("failed to parse channel configuration")?;
        let expected = config_file_version();
        if config.version != expected {
            return Err(anyhow!(
                "unsupported channel configuration version {} (expected {}): update channels.toml to version {}",
                config.version,
                expected,
                expected
            ));
        }
        validate_channels(&config.channels)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to serialize channel configuration")
    }

    /// Every repository across all channels, in channel order, deduplicated
    /// by id. This is the "repositories consulted" list attached to
    /// resolution failures.
    pub fn all_repositories(&self) -> Vec<Repository> {
        let mut seen = HashSet::new();
        let mut repositories = Vec::new();
        for channel in &self.channels {
            for repository in &channel.repositories {
                if seen.insert(repository.id.clone()) {
                    repositories.push(repository.clone());
                }
            }
        }
        repositories
    }
}

/// Returns a new channel list where every channel's repositories are fully
/// replaced by `overrides`. Empty `overrides` returns `base` unchanged. The
/// input is never mutated; the persisted configuration is not touched.
pub fn override_repositories(base: &[Channel], overrides: &[Repository]) -> Vec<Channel> {
    if overrides.is_empty() {
        return base.to_vec();
    }

    base.iter()
        .map(|channel| Channel {
            name: channel.name.clone(),
            strategy: channel.strategy,
            repositories: overrides.to_vec(),
        })
        .collect()
}

pub(crate) fn validate_channel_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        return Err(anyhow!("invalid channel name: must not be empty"));
    }
    if name.len() > 64 {
        return Err(anyhow!(
            "invalid channel name '{name}': must be at most 64 characters"
        ));
    }

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(anyhow!("invalid channel name: '{name}'"));
    };

    let first_is_valid = first.is_ascii_lowercase() || first.is_ascii_digit();
    let rest_is_valid =
        chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
    if !first_is_valid || !rest_is_valid {
        return Err(anyhow!("invalid channel name: '{name}'"));
    }

    Ok(())
}

pub(crate) fn validate_channels(channels: &[Channel]) -> anyhow::Result<()> {
    let mut seen_names: HashSet<&str> = HashSet::with_capacity(channels.len());
    for channel in channels {
        validate_channel_name(&channel.name)?;
        if !seen_names.insert(channel.name.as_str()) {
            return Err(anyhow!(
                "duplicate channel name '{}' in channels.toml: remove or rename one entry",
                channel.name
            ));
        }

        let mut seen_repos: HashSet<&str> = HashSet::with_capacity(channel.repositories.len());
        for repository in &channel.repositories {
            if repository.id.trim().is_empty() {
                return Err(anyhow!(
                    "channel '{}' has a repository with an empty id",
                    channel.name
                ));
            }
            if !seen_repos.insert(repository.id.as_str()) {
                return Err(anyhow!(
                    "duplicate repository id '{}' in channel '{}'",
                    repository.id,
                    channel.name
                ));
            }
        }
    }

    Ok(())
}
