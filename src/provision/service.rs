use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::observability::MetricsRegistry;
use crate::reload::{ReloadError, Reloader};

use super::locks::TargetLocks;
use super::provisioner::{ProvisionError, ProvisionOutcome, RuleProvisioner};
use super::target::ProvisionTarget;

/// Ways a provisioning request can fail.
#[derive(Error, Debug)]
pub enum ProvisionFailure {
    /// Nothing was reloaded; the rule file may or may not have been written.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The new state is on disk but the engine was not reloaded.
    #[error("rules provisioned but reload failed: {source}")]
    Reload {
        report: ProvisionReport,
        source: ReloadError,
    },

    #[error("provisioning task failed: {0}")]
    Task(#[from] JoinError),
}

/// Result of a completed provisioning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Rule file that was provisioned
    pub path: PathBuf,

    /// What changed on disk
    pub outcome: ProvisionOutcome,

    /// Whether a reload was triggered successfully
    pub reloaded: bool,
}

/// Serialized compare, write, register, reload pipeline.
pub struct ProvisionService {
    provisioner: Arc<RuleProvisioner>,
    reloader: Arc<dyn Reloader>,
    locks: TargetLocks,
    metrics: Arc<MetricsRegistry>,
}

impl ProvisionService {
    pub fn new(
        provisioner: RuleProvisioner,
        reloader: Arc<dyn Reloader>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        ProvisionService {
            provisioner: Arc::new(provisioner),
            reloader,
            locks: TargetLocks::new(),
            metrics,
        }
    }

    pub fn provisioner(&self) -> &RuleProvisioner {
        &self.provisioner
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Where reloads are sent.
    pub fn reloader_endpoint(&self) -> &str {
        self.reloader.endpoint()
    }

    /// Provision `payload` into `target` and reload the engine if anything
    /// changed.
    ///
    /// The target's lock is held from the first read until the reload
    /// finishes. File work runs on the blocking pool and always completes,
    /// even if this future is dropped; only the reload is cancellable.
    pub async fn provision<P>(
        &self,
        target: ProvisionTarget,
        payload: P,
    ) -> Result<ProvisionReport, ProvisionFailure>
    where
        P: AsRef<[u8]> + Send + 'static,
    {
        let target_guard = self.locks.lock(target.path()).await;

        // Config lock is always taken after the target lock.
        let config_guard = match self.provisioner.registration_config(&target) {
            Some(config) => Some(self.locks.lock(config).await),
            None => None,
        };

        let start = Instant::now();
        let provisioner = self.provisioner.clone();
        let blocking_target = target.clone();

        let (target_guard, result) = tokio::task::spawn_blocking(move || {
            let result = provisioner.provision(&blocking_target, payload.as_ref());
            drop(config_guard);
            (target_guard, result)
        })
        .await
        .inspect_err(|_| self.metrics.record_provision_error())?;

        self.metrics.record_latency(start);

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(rule_file = %target, error = %e, "Provisioning failed");
                self.metrics.record_provision_error();
                return Err(e.into());
            }
        };
        self.metrics.record_provision(&outcome);

        let mut report = ProvisionReport {
            path: target.path().to_path_buf(),
            outcome,
            reloaded: false,
        };

        if !outcome.changed() {
            info!(rule_file = %target, "Rules unchanged, skipping reload");
            return Ok(report);
        }

        info!(
            rule_file = %target,
            rules_changed = outcome.rules_changed,
            config_changed = outcome.config_changed,
            endpoint = self.reloader.endpoint(),
            "Reloading monitoring engine"
        );

        let reload = self.reloader.reload().await;
        self.metrics.record_reload(reload.is_ok());
        drop(target_guard);

        match reload {
            Ok(()) => {
                report.reloaded = true;
                Ok(report)
            }
            Err(source) => {
                warn!(rule_file = %target, error = %source, "Reload failed after provisioning");
                Err(ProvisionFailure::Reload { report, source })
            }
        }
    }
}
