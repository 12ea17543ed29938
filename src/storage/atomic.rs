use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while replacing a file.
#[derive(Error, Debug)]
pub enum AtomicWriteError {
    #[error("create temp file in {}: {source}", .dir.display())]
    CreateTemp { dir: PathBuf, source: io::Error },

    #[error("write temp file for {}: {source}", .target.display())]
    Write { target: PathBuf, source: io::Error },

    #[error("sync temp file for {}: {source}", .target.display())]
    Sync { target: PathBuf, source: io::Error },

    #[error("rename temp file over {}: {source}", .target.display())]
    Rename { target: PathBuf, source: io::Error },

    #[error("target path has no file name: {}", .0.display())]
    InvalidTarget(PathBuf),
}

/// Payload that has been written and synced next to its target but not yet
/// renamed into place.
///
/// Dropping a `StagedWrite` without calling [`commit`](Self::commit) removes
/// the temp file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Write `payload` to a temp file in the target's directory and sync it.
    pub fn stage(target: impl AsRef<Path>, payload: &[u8]) -> Result<Self, AtomicWriteError> {
        let target = target.as_ref().to_path_buf();
        let name = target
            .file_name()
            .ok_or_else(|| AtomicWriteError::InvalidTarget(target.clone()))?
            .to_string_lossy()
            .into_owned();
        let dir = parent_dir(&target);

        // Same directory as the target keeps the rename on one filesystem.
        let mut temp = Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|source| AtomicWriteError::CreateTemp {
                dir: dir.clone(),
                source,
            })?;

        copy_permissions(&target, temp.as_file());

        temp.write_all(payload)
            .and_then(|_| temp.flush())
            .map_err(|source| AtomicWriteError::Write {
                target: target.clone(),
                source,
            })?;

        temp.as_file()
            .sync_all()
            .map_err(|source| AtomicWriteError::Sync {
                target: target.clone(),
                source,
            })?;

        Ok(StagedWrite { temp, target })
    }

    /// Path of the staged temp file.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Rename the staged file over the target.
    pub fn commit(self) -> Result<(), AtomicWriteError> {
        let StagedWrite { temp, target } = self;

        // On failure the returned NamedTempFile is dropped, deleting the temp file.
        temp.persist(&target)
            .map_err(|e| AtomicWriteError::Rename {
                target: target.clone(),
                source: e.error,
            })?;

        sync_dir(&parent_dir(&target));

        debug!(path = %target.display(), "Atomically replaced file");
        Ok(())
    }
}

/// Replace `target` with `payload` via write-to-temp, sync, rename.
///
/// Readers observe either the previous content or the full payload, never a
/// partial write. On any error the target is left as it was.
pub fn write_atomic(target: impl AsRef<Path>, payload: &[u8]) -> Result<(), AtomicWriteError> {
    StagedWrite::stage(target, payload)?.commit()
}

fn parent_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Keep the mode of an existing target; new files get 0644 so the
/// monitoring engine can read them when running as another user.
fn copy_permissions(target: &Path, temp: &File) {
    let perms = match fs::metadata(target) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };

    if let Some(perms) = perms {
        if let Err(e) = temp.set_permissions(perms) {
            debug!(error = %e, "Failed to set temp file permissions");
        }
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Best-effort fsync of the directory so the rename itself is durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(dir = %dir.display(), error = %e, "Directory sync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
