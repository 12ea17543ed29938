pub mod api;
pub mod config;
pub mod observability;
pub mod provision;
pub mod reload;
pub mod storage;

pub use config::Config;
pub use provision::{ProvisionOutcome, ProvisionService, ProvisionTarget, RuleProvisioner};
pub use reload::{HttpReloader, Reloader};
