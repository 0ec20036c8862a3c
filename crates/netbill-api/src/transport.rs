// Shared transport configuration for router sessions.
//
// Every session applies the same connect/read bound, so the timeout lives
// here instead of being threaded through each operation.

use std::future::Future;
use std::time::Duration;

use crate::error::Error;

/// Default bound for socket connect and each reply read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport settings applied to every session a client opens.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// No bound on connect or reads.
    pub fn unbounded() -> Self {
        Self { timeout: None }
    }

    /// Run `fut` under the configured bound, mapping expiry to [`Error::Timeout`].
    pub(crate) async fn bounded<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::Timeout {
                    timeout_secs: limit.as_secs(),
                })?,
            None => fut.await,
        }
    }
}
