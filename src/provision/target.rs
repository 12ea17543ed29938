use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension given to per-mixin rule files.
pub const MIXIN_RULE_EXTENSION: &str = "yaml";

/// Where a provisioning request writes its rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionTarget {
    /// The single rule file configured with `--rule-file`.
    Fixed(PathBuf),

    /// `<rules_dir>/<name>.yaml`, registered in the host config when one is set.
    Mixin { name: String, path: PathBuf },
}

impl ProvisionTarget {
    /// Build the target for a mixin, validating its name.
    pub fn mixin(rules_dir: &Path, name: &str) -> Result<Self, InvalidName> {
        validate_mixin_name(name)?;

        let path = rules_dir.join(format!("{}.{}", name, MIXIN_RULE_EXTENSION));
        Ok(ProvisionTarget::Mixin {
            name: name.to_string(),
            path,
        })
    }

    /// Path of the rule file on disk.
    pub fn path(&self) -> &Path {
        match self {
            ProvisionTarget::Fixed(path) => path,
            ProvisionTarget::Mixin { path, .. } => path,
        }
    }

    /// Mixin name, if this is a per-mixin target.
    pub fn mixin_name(&self) -> Option<&str> {
        match self {
            ProvisionTarget::Fixed(_) => None,
            ProvisionTarget::Mixin { name, .. } => Some(name),
        }
    }
}

impl fmt::Display for ProvisionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// A mixin name that cannot be turned into a file inside the rules directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid mixin name {name:?}: {reason}")]
pub struct InvalidName {
    pub name: String,
    pub reason: &'static str,
}

/// Mixin names map one-to-one onto file names, so anything that could escape
/// the rules directory or produce a hidden file is rejected.
fn validate_mixin_name(name: &str) -> Result<(), InvalidName> {
    let reject = |reason| {
        Err(InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("name is empty");
    }
    if name.len() > 200 {
        return reject("name is too long");
    }
    if name.starts_with('.') {
        return reject("name must not start with '.'");
    }
    if name.contains("..") {
        return reject("name must not contain '..'");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return reject("only ASCII letters, digits, '-', '_' and '.' are allowed");
    }

    Ok(())
}
