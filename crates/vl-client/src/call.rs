//! Per-call deadlines and cooperative cancellation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use vl_core::{ConnectionConfig, LoadError, Result};

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag. Clones observe the same state.
#[derive(Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken").field("cancelled", &self.is_cancelled()).finish()
    }
}

/// Deadlines and the cancellation token every store call runs under.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub request_timeout: Option<Duration>,
    pub task_timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}

impl CallContext {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            task_timeout: config.task_timeout,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Await a single request under the request deadline.
    pub async fn request<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        self.guard(operation, self.request_timeout, fut).await
    }

    /// Await a long-running store task under the task deadline.
    pub async fn task<F>(&self, operation: &str, fut: F) -> Result<()>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        self.guard(operation, self.task_timeout, fut).await
    }

    /// Run `fut` until it completes, the deadline passes, or the token fires.
    pub async fn guard<T, F>(&self, operation: &str, timeout: Option<Duration>, fut: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(LoadError::Cancelled(operation.to_string()));
        }

        let start = Instant::now();
        let bounded = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(res) => res.map_err(LoadError::from),
                    Err(_) => Err(LoadError::TimedOut {
                        operation: operation.to_string(),
                        elapsed: start.elapsed(),
                    }),
                },
                None => fut.await.map_err(LoadError::from),
            }
        };

        tokio::select! {
            res = bounded => res,
            _ = self.cancel.cancelled() => {
                tracing::debug!(operation, "call cancelled");
                Err(LoadError::Cancelled(operation.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let ctx = CallContext { request_timeout: Some(Duration::from_millis(50)), ..CallContext::default() };
        let err = ctx
            .request("slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::TimedOut { ref operation, .. } if operation == "slow"));
    }

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let ctx = CallContext::default();
        assert_eq!(ctx.request("fast", async { Ok(7) }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_store_error_is_connection_error() {
        let ctx = CallContext::default();
        let err = ctx
            .request::<(), _>("op", async { Err(anyhow::anyhow!("socket closed")) })
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Connection(_)));
        assert_eq!(err.to_string(), "socket closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let ctx = CallContext { task_timeout: None, ..CallContext::default() };
        let token = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let err = ctx
            .task("load", async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Cancelled(ref op) if op == "load"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let ctx = CallContext::default();
        ctx.cancel.cancel();
        let err = ctx.request("insert", async { Ok(()) }).await.unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }
}
