pub mod config_file;
pub mod locks;
pub mod provisioner;
pub mod service;
pub mod target;

pub use config_file::{ensure_listed, ConfigFileError, DEFAULT_RULE_FILES_FIELD};
pub use locks::TargetLocks;
pub use provisioner::{
    write_if_changed, ProvisionError, ProvisionOutcome, ProvisionerSettings, RuleProvisioner,
};
pub use service::{ProvisionFailure, ProvisionReport, ProvisionService};
pub use target::{InvalidName, ProvisionTarget};
