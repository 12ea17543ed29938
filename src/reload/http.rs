use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{info, warn};

use super::{ReloadError, Reloader};

/// Reloads Prometheus through its lifecycle API (`POST /-/reload`).
#[derive(Debug, Clone)]
pub struct HttpReloader {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpReloader {
    /// Create a reloader for `url`, bounding each attempt by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ReloadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ReloadError::Client)?;

        Ok(HttpReloader {
            client,
            url: url.into(),
            timeout,
        })
    }

    fn classify(&self, source: reqwest::Error) -> ReloadError {
        if source.is_timeout() {
            ReloadError::Timeout {
                url: self.url.clone(),
                timeout: self.timeout,
            }
        } else {
            ReloadError::Request {
                url: self.url.clone(),
                source,
            }
        }
    }
}

#[async_trait]
impl Reloader for HttpReloader {
    async fn reload(&self) -> Result<(), ReloadError> {
        let response = self
            .client
            .post(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();

        // Drain the body so the connection can go back to the pool.
        response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                self.classify(e)
            } else {
                ReloadError::Body(e)
            }
        })?;

        if status != StatusCode::OK {
            warn!(url = %self.url, status = %status, "Reload rejected");
            return Err(ReloadError::Status { status });
        }

        info!(url = %self.url, "Reload triggered");
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
