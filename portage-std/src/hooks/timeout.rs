//! Best-effort timeout watch.
//!
//! An action that outlives its declared timeout is reported, not cancelled:
//! the call keeps running and its result is still returned. Platforms that
//! enforce hard limits do so outside the process.

use std::{future::Future, time::Duration};

/// Output of a watched call.
#[derive(Debug, Clone, PartialEq)]
pub struct Watched<T> {
    /// What the call produced.
    pub output: T,
    /// Whether the call ran past its limit.
    pub overran: bool,
}

/// Reports calls that run past `limit`.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutWatch {
    limit: Duration,
}

impl TimeoutWatch {
    /// Watch with `limit`.
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// The configured limit.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Drive `fut` to completion, warning once if it passes the limit.
    #[cfg(feature = "tokio")]
    pub async fn watch<F: Future>(&self, action: &str, fut: F) -> Watched<F::Output> {
        let mut fut = std::pin::pin!(fut);
        match tokio::time::timeout(self.limit, fut.as_mut()).await {
            Ok(output) => Watched { output, overran: false },
            Err(_) => {
                tracing::warn!(
                    action,
                    limit = ?self.limit,
                    "action exceeded its timeout and is still running"
                );
                Watched {
                    output: fut.await,
                    overran: true,
                }
            }
        }
    }

    /// Drive `fut` to completion. Without a timer nothing is reported.
    #[cfg(not(feature = "tokio"))]
    pub async fn watch<F: Future>(&self, action: &str, fut: F) -> Watched<F::Output> {
        let _ = action;
        Watched {
            output: fut.await,
            overran: false,
        }
    }
}
