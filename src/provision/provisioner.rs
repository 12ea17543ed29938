use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::storage::{file_matches, write_atomic, AtomicWriteError};

use super::config_file::{ensure_listed, ConfigFileError, DEFAULT_RULE_FILES_FIELD};
use super::target::{InvalidName, ProvisionTarget};

/// Errors that can occur while provisioning a rule file.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("compare existing rules at {}: {source}", .path.display())]
    Compare { path: PathBuf, source: io::Error },

    #[error("provision rule file: {0}")]
    Write(#[from] AtomicWriteError),

    #[error("register rule file: {0}")]
    Config(#[from] ConfigFileError),

    #[error(transparent)]
    InvalidName(#[from] InvalidName),

    #[error("no {0} configured for this endpoint")]
    NotConfigured(&'static str),

    #[error("resolve {}: {source}", .path.display())]
    Resolve { path: PathBuf, source: io::Error },
}

/// Static provisioning settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct ProvisionerSettings {
    /// Single rule file served by the fixed endpoint
    pub rule_file: Option<PathBuf>,

    /// Directory holding per-mixin rule files
    pub rules_dir: Option<PathBuf>,

    /// Host configuration to register per-mixin files in
    pub prometheus_config: Option<PathBuf>,

    /// List field of the host configuration that names rule files
    pub rule_files_field: String,
}

impl ProvisionerSettings {
    /// Resolve every configured path to its canonical absolute form.
    ///
    /// Registration entries are derived relative to the config's directory
    /// and per-path locks are keyed by path, so both sides must agree on one
    /// spelling. Files may be absent, but their parent directories must exist.
    pub fn canonicalize(self) -> Result<Self, ProvisionError> {
        let resolve = |path: Option<PathBuf>| match path {
            Some(path) => match resolve_path(&path) {
                Ok(resolved) => Ok(Some(resolved)),
                Err(source) => Err(ProvisionError::Resolve { path, source }),
            },
            None => Ok(None),
        };

        Ok(ProvisionerSettings {
            rule_file: resolve(self.rule_file)?,
            rules_dir: resolve(self.rules_dir)?,
            prometheus_config: resolve(self.prometheus_config)?,
            rule_files_field: self.rule_files_field,
        })
    }
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        ProvisionerSettings {
            rule_file: None,
            rules_dir: None,
            prometheus_config: None,
            rule_files_field: DEFAULT_RULE_FILES_FIELD.to_string(),
        }
    }
}

/// What a provisioning run changed on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionOutcome {
    /// Rule file content was replaced
    pub rules_changed: bool,

    /// Rule file was newly registered in the host config
    pub config_changed: bool,
}

impl ProvisionOutcome {
    /// Whether the monitoring engine must reload.
    pub fn changed(&self) -> bool {
        self.rules_changed || self.config_changed
    }
}

/// Idempotent, atomic rule file provisioning.
///
/// Callers must hold the target's lock (and the config's, when
/// [`registration_config`](Self::registration_config) returns a path) for
/// the duration of [`provision`](Self::provision).
#[derive(Debug, Clone)]
pub struct RuleProvisioner {
    settings: ProvisionerSettings,
}

impl RuleProvisioner {
    pub fn new(settings: ProvisionerSettings) -> Self {
        RuleProvisioner { settings }
    }

    pub fn settings(&self) -> &ProvisionerSettings {
        &self.settings
    }

    /// Target for the fixed rule file endpoint.
    pub fn fixed_target(&self) -> Result<ProvisionTarget, ProvisionError> {
        self.settings
            .rule_file
            .clone()
            .map(ProvisionTarget::Fixed)
            .ok_or(ProvisionError::NotConfigured("--rule-file"))
    }

    /// Target for a named mixin.
    pub fn mixin_target(&self, name: &str) -> Result<ProvisionTarget, ProvisionError> {
        let rules_dir = self
            .settings
            .rules_dir
            .as_deref()
            .ok_or(ProvisionError::NotConfigured("--rules-dir"))?;

        let target = ProvisionTarget::mixin(rules_dir, name)?;

        // A mixin must never overwrite the host config or the fixed rule file;
        // sharing the config's path would also self-deadlock on its lock.
        let reserved = [
            (
                self.settings.prometheus_config.as_deref(),
                "name resolves to the Prometheus config file",
            ),
            (
                self.settings.rule_file.as_deref(),
                "name resolves to the fixed rule file",
            ),
        ];
        for (path, reason) in reserved {
            if path.is_some_and(|path| same_file(path, target.path())) {
                return Err(InvalidName {
                    name: name.to_string(),
                    reason,
                }
                .into());
            }
        }

        Ok(target)
    }

    /// Host config that `target` gets registered in, if any.
    pub fn registration_config(&self, target: &ProvisionTarget) -> Option<&Path> {
        match target {
            ProvisionTarget::Mixin { .. } => self.settings.prometheus_config.as_deref(),
            ProvisionTarget::Fixed(_) => None,
        }
    }

    /// Write `payload` to the target if it differs from what is on disk, then
    /// register the file in the host config when applicable.
    pub fn provision(
        &self,
        target: &ProvisionTarget,
        payload: &[u8],
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let rules_changed = write_if_changed(target.path(), payload)?;

        // Register after the write so the config never names a missing file.
        let config_changed = match self.registration_config(target) {
            Some(config) => {
                let entry = config_entry(config, target.path());
                ensure_listed(config, &self.settings.rule_files_field, &entry)?
            }
            None => false,
        };

        Ok(ProvisionOutcome {
            rules_changed,
            config_changed,
        })
    }
}

/// Replace the file at `path` with `payload` unless it already matches.
///
/// A missing file is an empty baseline. Returns whether a write happened.
pub fn write_if_changed(path: &Path, payload: &[u8]) -> Result<bool, ProvisionError> {
    let unchanged = file_matches(path, payload).map_err(|source| ProvisionError::Compare {
        path: path.to_path_buf(),
        source,
    })?;

    // An empty payload matches a missing file, but the file should still exist.
    if unchanged && (!payload.is_empty() || path.exists()) {
        debug!(path = %path.display(), "Rule file unchanged");
        return Ok(false);
    }

    write_atomic(path, payload)?;

    info!(path = %path.display(), bytes = payload.len(), "Provisioned rule file");
    Ok(true)
}

/// Canonical form of `path`. A missing final component is resolved through
/// its parent directory.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(resolved) => Ok(resolved),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let file_name = path.file_name().ok_or(e)?;
            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            Ok(fs::canonicalize(parent)?.join(file_name))
        }
        Err(e) => Err(e),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    let resolve = |p: &Path| resolve_path(p).unwrap_or_else(|_| p.to_path_buf());
    a == b || resolve(a) == resolve(b)
}

/// Name under which a rule file is listed in the host config.
///
/// Prometheus resolves `rule_files` relative to the config's directory, so
/// files inside it are listed relative to it. Anything else is listed as
/// given.
fn config_entry(config: &Path, rule_file: &Path) -> String {
    let base = config.parent().unwrap_or_else(|| Path::new(""));

    rule_file
        .strip_prefix(base)
        .unwrap_or(rule_file)
        .to_string_lossy()
        .into_owned()
}
