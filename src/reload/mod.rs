pub mod http;
pub mod mock;

pub use http::HttpReloader;
pub use mock::MockReloader;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Default reload endpoint of a local Prometheus.
pub const DEFAULT_RELOAD_URL: &str = "http://127.0.0.1:9090/-/reload";

/// Errors that can occur while asking the monitoring engine to reload.
#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("build reload client: {0}")]
    Client(reqwest::Error),

    #[error("reload request to {url}: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("exhausting reload response body: {0}")]
    Body(reqwest::Error),

    #[error("reload request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error(
        "received non-200 response: {status}; have you set `--web.enable-lifecycle` Prometheus flag?"
    )]
    Status { status: StatusCode },
}

/// Signals a running monitoring engine to re-read its configuration.
#[async_trait]
pub trait Reloader: Send + Sync {
    /// Trigger a reload. Dropping the returned future aborts the attempt.
    async fn reload(&self) -> Result<(), ReloadError>;

    /// Human-readable description of where reloads go.
    fn endpoint(&self) -> &str;
}
