use std::collections::HashMap;

use anyhow::Result;
use semver::Version;

use provost_core::{ArtifactId, ManagedArtifact, OperationError, Repository};

use crate::{ResolveError, ResolverSession};

/// One pending version transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactChange {
    pub id: ArtifactId,
    pub current: Version,
    pub new: Version,
}

/// The diff between the installed artifact set and what the channels
/// currently resolve to. Entry order is the scan order over the installed
/// set; an empty set means the whole update is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSet {
    entries: Vec<ArtifactChange>,
}

impl UpdateSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[ArtifactChange] {
        &self.entries
    }

    /// Inserts a change, tolerating duplicate identities in the scanned
    /// input: the entry with the widest version gap wins.
    fn insert(&mut self, positions: &mut HashMap<ArtifactId, usize>, change: ArtifactChange) {
        if let Some(&position) = positions.get(&change.id) {
            if change.current < self.entries[position].current {
                self.entries[position] = change;
            }
            return;
        }

        positions.insert(change.id.clone(), self.entries.len());
        self.entries.push(change);
    }
}

/// Compares the installed artifact set against the resolver session. Owns
/// the session for its scope; dropping the finder releases it, error or not.
#[derive(Debug)]
pub struct UpdateFinder<S> {
    session: S,
    repositories: Vec<Repository>,
    offline: bool,
}

impl<S: ResolverSession> UpdateFinder<S> {
    pub fn new(session: S, repositories: Vec<Repository>, offline: bool) -> Self {
        Self {
            session,
            repositories,
            offline,
        }
    }

    /// Resolves the latest version for every installed artifact and returns
    /// the diff. Fail-closed: if any artifact is unresolvable the whole call
    /// fails with an artifact-resolution error naming every missing identity,
    /// never a partial set.
    pub fn find_updates(&mut self, installed: &[ManagedArtifact]) -> Result<UpdateSet> {
        let mut updates = UpdateSet::default();
        let mut positions = HashMap::new();
        let mut unresolved: Vec<ArtifactId> = Vec::new();

        for artifact in installed {
            match self.session.resolve_latest(&artifact.id) {
                Ok(latest) => {
                    if latest != artifact.version {
                        updates.insert(
                            &mut positions,
                            ArtifactChange {
                                id: artifact.id.clone(),
                                current: artifact.version.clone(),
                                new: latest,
                            },
                        );
                    }
                }
                Err(ResolveError::NotFound { id }) => {
                    if !unresolved.contains(&id) {
                        unresolved.push(id);
                    }
                }
                Err(err @ ResolveError::Repository { .. }) => return Err(err.into()),
            }
        }

        if !unresolved.is_empty() {
            return Err(OperationError::ArtifactResolution {
                artifacts: unresolved,
                repositories: self.repositories.clone(),
                offline: self.offline,
            }
            .into());
        }

        Ok(updates)
    }
}
