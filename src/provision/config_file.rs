use serde_yaml::{Mapping, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::storage::{write_atomic, AtomicWriteError};

/// Default list field in a Prometheus configuration that names rule files.
pub const DEFAULT_RULE_FILES_FIELD: &str = "rule_files";

/// Errors that can occur while updating the host configuration file.
#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("read config {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("config {} is not a mapping at the top level", .0.display())]
    NotAMapping(PathBuf),

    #[error("field {field:?} in {} is not a list", .path.display())]
    NotAList { path: PathBuf, field: String },

    #[error("serialize config: {0}")]
    Serialize(serde_yaml::Error),

    #[error(transparent)]
    Write(#[from] AtomicWriteError),
}

/// Ensure `filename` appears exactly once in the list field `field` of the
/// YAML document at `config_path`.
///
/// Returns `true` if the file on disk was changed. All other keys, and the
/// order of existing list entries, pass through unchanged. Comments and
/// formatting do not survive the round-trip.
pub fn ensure_listed(
    config_path: impl AsRef<Path>,
    field: &str,
    filename: &str,
) -> Result<bool, ConfigFileError> {
    let path = config_path.as_ref();

    let original = fs::read(path).map_err(|source| ConfigFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut doc = parse_document(path, &original)?;

    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| ConfigFileError::NotAMapping(path.to_path_buf()))?;

    if !append_unique(root, field, filename).map_err(|()| ConfigFileError::NotAList {
        path: path.to_path_buf(),
        field: field.to_string(),
    })? {
        debug!(config = %path.display(), filename, "Rule file already registered");
        return Ok(false);
    }

    let updated = serde_yaml::to_string(&doc).map_err(ConfigFileError::Serialize)?;

    if updated.as_bytes() == original.as_slice() {
        return Ok(false);
    }

    write_atomic(path, updated.as_bytes())?;

    info!(config = %path.display(), field, filename, "Registered rule file");
    Ok(true)
}

/// Read the entries of list field `field`, for inspection and tests.
pub fn listed_files(
    config_path: impl AsRef<Path>,
    field: &str,
) -> Result<Vec<String>, ConfigFileError> {
    let path = config_path.as_ref();
    let content = fs::read(path).map_err(|source| ConfigFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = parse_document(path, &content)?;

    let entries = match doc.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(_) => {
            return Err(ConfigFileError::NotAList {
                path: path.to_path_buf(),
                field: field.to_string(),
            })
        }
    };

    Ok(entries)
}

fn parse_document(path: &Path, content: &[u8]) -> Result<Value, ConfigFileError> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Mapping(Mapping::new()));
    }

    let doc = serde_yaml::from_slice(content).map_err(|source| ConfigFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    // A document with no content (only comments, or `---`) is null.
    match doc {
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        doc => Ok(doc),
    }
}

/// Append `filename` to `root[field]` unless present. `Err(())` means the
/// field exists but is not a list.
fn append_unique(root: &mut Mapping, field: &str, filename: &str) -> Result<bool, ()> {
    let key = Value::String(field.to_string());

    match root.get_mut(&key) {
        None => {
            root.insert(key, Value::Sequence(vec![Value::String(filename.to_string())]));
            Ok(true)
        }
        Some(value) => {
            if value.is_null() {
                *value = Value::Sequence(Vec::new());
            }

            let entries = value.as_sequence_mut().ok_or(())?;
            if entries.iter().any(|v| v.as_str() == Some(filename)) {
                return Ok(false);
            }
            entries.push(Value::String(filename.to_string()));
            Ok(true)
        }
    }
}
