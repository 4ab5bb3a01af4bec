mod session;
mod updates;

pub use session::{RepositorySession, ResolveError, ResolverSession, SessionConfig};
pub use updates::{ArtifactChange, UpdateFinder, UpdateSet};
