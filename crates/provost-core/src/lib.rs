mod artifact;
mod channel;
mod error;

pub use artifact::{ArtifactId, ManagedArtifact};
pub use channel::{
    override_repositories, Channel, ChannelConfig, Repository, ResolutionStrategy,
};
pub use error::OperationError;
