mod cache;
mod config;
mod provisioner;

pub use cache::{read_cache_records, CacheExporter, CachedArtifact};
pub use config::ProvisioningConfig;
pub use provisioner::{
    ProvisionError, ProvisionOutcome, Provisioner, ProvisioningOptions, ResolvingProvisioner,
};

#[cfg(test)]
mod tests;
