use anyhow::Result;
use thiserror::Error;

use provost_core::{ArtifactId, ManagedArtifact};
use provost_resolver::{ResolveError, ResolverSession};

use crate::ProvisioningConfig;

/// Per-run execution options for the provisioning engine.
#[derive(Debug, Clone, Default)]
pub struct ProvisioningOptions {
    /// Resolve exclusively from already-cached sources.
    pub offline: bool,
}

/// What a completed provisioning run actually resolved and laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub artifacts: Vec<ManagedArtifact>,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The engine could not resolve one or more artifacts. Carries the
    /// identities so the caller can attach repository context.
    #[error("provisioning could not resolve {} artifact(s)", artifacts.len())]
    UnresolvedArtifacts { artifacts: Vec<ArtifactId> },

    /// Structural engine failure unrelated to artifact resolution.
    #[error("provisioning engine failed")]
    Engine {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl ProvisionError {
    pub fn engine(source: anyhow::Error) -> Self {
        Self::Engine {
            source: source.into(),
        }
    }
}

/// The provisioning engine boundary. The engine is the only collaborator
/// permitted to mutate the installed file tree; from the update core's point
/// of view a run either completes or fails as a whole.
pub trait Provisioner {
    fn provisioning_config(&self) -> Result<ProvisioningConfig>;

    fn provision(
        &mut self,
        config: &ProvisioningConfig,
        options: &ProvisioningOptions,
    ) -> Result<ProvisionOutcome, ProvisionError>;
}

/// The shipped engine: re-resolves every artifact the provisioning config
/// and the tracked set reference to its latest channel version. File
/// materialization beyond the state directory is delegated to the feature
/// packs themselves and is not this engine's concern.
#[derive(Debug)]
pub struct ResolvingProvisioner<S> {
    session: S,
    config: ProvisioningConfig,
    tracked: Vec<ArtifactId>,
}

impl<S: ResolverSession> ResolvingProvisioner<S> {
    pub fn new(session: S, config: ProvisioningConfig, tracked: Vec<ArtifactId>) -> Self {
        Self {
            session,
            config,
            tracked,
        }
    }
}

impl<S: ResolverSession> Provisioner for ResolvingProvisioner<S> {
    fn provisioning_config(&self) -> Result<ProvisioningConfig> {
        Ok(self.config.clone())
    }

    fn provision(
        &mut self,
        config: &ProvisioningConfig,
        _options: &ProvisioningOptions,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let mut identities: Vec<ArtifactId> = config
            .feature_packs
            .iter()
            .map(|pack| pack.id.clone())
            .collect();
        for id in &self.tracked {
            if !identities.contains(id) {
                identities.push(id.clone());
            }
        }

        let mut resolved = Vec::with_capacity(identities.len());
        let mut unresolved = Vec::new();
        for id in identities {
            match self.session.resolve_latest(&id) {
                Ok(version) => resolved.push(ManagedArtifact::new(id, version)),
                Err(ResolveError::NotFound { id }) => unresolved.push(id),
                Err(err @ ResolveError::Repository { .. }) => {
                    return Err(ProvisionError::engine(err.into()));
                }
            }
        }

        if !unresolved.is_empty() {
            return Err(ProvisionError::UnresolvedArtifacts {
                artifacts: unresolved,
            });
        }

        Ok(ProvisionOutcome {
            artifacts: resolved,
        })
    }
}
