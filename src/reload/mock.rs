// src/reload/mock.rs
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ReloadError, Reloader};

/// Mock reloader for testing.
#[derive(Debug, Default)]
pub struct MockReloader {
    calls: AtomicUsize,
    fail_with: Mutex<Option<StatusCode>>,
    delay: Mutex<Option<Duration>>,
}

impl MockReloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent reloads fail with `status` (for testing).
    pub fn fail_with(&self, status: StatusCode) {
        *self.fail_with.lock() = Some(status);
    }

    /// Make subsequent reloads take `delay` before answering (for testing).
    pub fn delay_by(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of reloads attempted (for assertions).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reloader for MockReloader {
    async fn reload(&self) -> Result<(), ReloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match *self.fail_with.lock() {
            Some(status) => Err(ReloadError::Status { status }),
            None => Ok(()),
        }
    }

    fn endpoint(&self) -> &str {
        "mock"
    }
}
