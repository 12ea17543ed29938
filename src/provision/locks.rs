use ahash::AHasher;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Number of shards for the lock registry.
/// Must be a power of 2 for fast modulo via bitwise AND.
const NUM_SHARDS: usize = 16;

/// Registry of per-path mutexes.
///
/// Every provisioning sequence (compare, write, register, reload) for one
/// file runs while holding that file's lock, so two requests for the same
/// target cannot both observe a stale baseline. Distinct paths never
/// contend beyond the brief shard lookup.
pub struct TargetLocks {
    shards: Vec<RwLock<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl TargetLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        TargetLocks { shards }
    }

    /// Get or lazily create the mutex for `path`.
    pub fn get_or_create(&self, path: &Path) -> Arc<Mutex<()>> {
        let shard = &self.shards[self.shard_index(path)];

        // Fast path: lock already exists
        {
            let read_guard = shard.read();
            if let Some(lock) = read_guard.get(path) {
                return lock.clone();
            }
        }

        let mut write_guard = shard.write();

        // Double-check after acquiring write lock
        if let Some(lock) = write_guard.get(path) {
            return lock.clone();
        }

        let lock = Arc::new(Mutex::new(()));
        write_guard.insert(path.to_path_buf(), lock.clone());
        lock
    }

    /// Wait for exclusive access to `path`.
    ///
    /// The guard is owned so it can move into a blocking task and outlive a
    /// cancelled request.
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        self.get_or_create(path).lock_owned().await
    }

    /// Number of distinct paths that have been locked.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn shard_index(&self, path: &Path) -> usize {
        let mut hasher = AHasher::default();
        path.hash(&mut hasher);
        (hasher.finish() as usize) & (NUM_SHARDS - 1)
    }
}

impl Default for TargetLocks {
    fn default() -> Self {
        Self::new()
    }
}
