mod history;
mod layout;
mod manifest;
mod store;

pub use history::{read_provision_records, ProvisionKind, ProvisionRecord};
pub use layout::InstallationLayout;
pub use manifest::InstalledManifest;
pub use store::InstallationMetadata;

#[cfg(test)]
mod tests;
