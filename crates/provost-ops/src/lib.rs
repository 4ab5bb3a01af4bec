mod update;

pub use update::{Updater, UpdateOutcome};
