use std::path::Path;

use anyhow::Result;

use provost_core::{
    override_repositories, Channel, OperationError, Repository,
};
use provost_metadata::InstallationMetadata;
use provost_provision::{
    CacheExporter, ProvisionError, Provisioner, ProvisioningConfig, ProvisioningOptions,
    ResolvingProvisioner,
};
use provost_resolver::{RepositorySession, ResolverSession, SessionConfig, UpdateFinder, UpdateSet};

/// Result of one completed `perform_update` run.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The installed set already matches the channels; nothing was touched.
    NoChanges,
    /// The update was provisioned and the manifest committed. A cache-export
    /// failure after the commit is carried as a warning, not an error: the
    /// update itself already happened.
    Applied {
        updates: UpdateSet,
        cache_warning: Option<String>,
    },
}

/// Sequences one update of one installation: override resolution, session
/// setup, update finding, provisioning, metadata commit, cache export. Later
/// steps never run when an earlier one failed; the metadata commit is the
/// durable commit point.
///
/// Holds the installation lock and the resolver session for its whole
/// lifetime; both are released when the updater is dropped, whichever way
/// the run ended.
#[derive(Debug)]
pub struct Updater<S, P> {
    metadata: InstallationMetadata,
    channels: Vec<Channel>,
    repositories: Vec<Repository>,
    offline: bool,
    session: S,
    provisioner: P,
    provisioning_config: ProvisioningConfig,
}

impl Updater<RepositorySession, ResolvingProvisioner<RepositorySession>> {
    /// Opens an installation for updating. Temporary repository overrides
    /// replace every channel's repositories for this updater only; the
    /// persisted configuration is never touched. Any failure here is fatal:
    /// no partially constructed updater is usable.
    pub fn open(
        install_dir: &Path,
        overrides: &[Repository],
        session_config: SessionConfig,
    ) -> Result<Self> {
        let metadata = InstallationMetadata::open(install_dir)
            .map_err(|err| OperationError::metadata(install_dir, err))?;

        let channels = override_repositories(&metadata.channel_config().channels, overrides);
        let repositories = all_repositories(&channels);

        let provisioning_config =
            ProvisioningConfig::read(&metadata.layout().provisioning_config_path())
                .map_err(|err| OperationError::metadata(install_dir, err))?;

        let session = RepositorySession::new(&channels, session_config.clone())?;
        let tracked = metadata
            .artifacts()
            .iter()
            .map(|artifact| artifact.id.clone())
            .collect();
        let provisioner = ResolvingProvisioner::new(
            RepositorySession::new(&channels, session_config.clone())?,
            provisioning_config.clone(),
            tracked,
        );

        Ok(Self {
            metadata,
            channels,
            repositories,
            offline: session_config.offline,
            session,
            provisioner,
            provisioning_config,
        })
    }
}

impl<S: ResolverSession, P: Provisioner> Updater<S, P> {
    /// Assembles an updater from already-constructed collaborators.
    pub fn from_parts(
        metadata: InstallationMetadata,
        overrides: &[Repository],
        offline: bool,
        session: S,
        provisioner: P,
        provisioning_config: ProvisioningConfig,
    ) -> Self {
        let channels = override_repositories(&metadata.channel_config().channels, overrides);
        let repositories = all_repositories(&channels);
        Self {
            metadata,
            channels,
            repositories,
            offline,
            session,
            provisioner,
            provisioning_config,
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn metadata(&self) -> &InstallationMetadata {
        &self.metadata
    }

    /// Read-only diff against the channels, for previews. Applies nothing.
    pub fn find_updates(&mut self) -> Result<UpdateSet> {
        let mut finder = UpdateFinder::new(
            &mut self.session,
            self.repositories.clone(),
            self.offline,
        );
        finder.find_updates(self.metadata.artifacts())
    }

    /// Runs the full sequence. An empty update set returns `NoChanges`
    /// without touching any state; this path is idempotent.
    pub fn perform_update(&mut self) -> Result<UpdateOutcome> {
        let updates = self.find_updates()?;
        if updates.is_empty() {
            return Ok(UpdateOutcome::NoChanges);
        }

        let cache_warning = self.apply_updates()?;
        Ok(UpdateOutcome::Applied {
            updates,
            cache_warning,
        })
    }

    /// Releases the installation lock and the session. Also runs on drop.
    pub fn close(self) {
        drop(self);
    }

    fn apply_updates(&mut self) -> Result<Option<String>> {
        let options = ProvisioningOptions {
            offline: self.offline,
        };
        // Error-translation boundary: the engine's unresolved-artifact
        // failure becomes the domain resolution error, with the consulted
        // repositories and offline state attached.
        let outcome = self
            .provisioner
            .provision(&self.provisioning_config, &options)
            .map_err(|err| match err {
                ProvisionError::UnresolvedArtifacts { artifacts } => {
                    OperationError::ArtifactResolution {
                        artifacts,
                        repositories: self.repositories.clone(),
                        offline: self.offline,
                    }
                }
                ProvisionError::Engine { source } => OperationError::Provisioning { source },
            })?;

        // Durable commit point: after this, the update has happened.
        self.metadata.set_manifest(outcome.artifacts.clone());
        self.metadata.record_provision(false).map_err(|err| {
            OperationError::metadata(self.metadata.layout().install_dir(), err)
        })?;

        let export = CacheExporter::new().cache_artifacts(
            &self.channels,
            self.metadata.layout(),
            &self.provisioning_config,
            &outcome.artifacts,
        );
        Ok(export
            .err()
            .map(|err| format!("{:#}", anyhow::Error::from(OperationError::cache_export(err)))))
    }
}

fn all_repositories(channels: &[Channel]) -> Vec<Repository> {
    let mut seen = std::collections::HashSet::new();
    let mut repositories = Vec::new();
    for channel in channels {
        for repository in &channel.repositories {
            if seen.insert(repository.id.clone()) {
                repositories.push(repository.clone());
            }
        }
    }
    repositories
}
