//! Deadline middleware for export operations.
//!
//! Fails operations that outlive their `timeout` with `ExportError::Timeout`.
//! Dropping the inner future on expiry fires the operation's drop guard, so
//! the strategy stops at its next checkpoint.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use fluxdemo_core::ExportTask;
use tower::{Layer, Service};
use tracing::warn;

use crate::service::operation::{ExportError, ExportOperation};

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with per-operation deadline enforcement.
///
/// The ceiling is read from each operation's `timeout` field; operations
/// without one run unbounded.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces per-operation deadlines.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<ExportOperation> for TimeoutService<S>
where
    S: Service<ExportOperation, Response = ExportTask, Error = ExportError> + Send,
    S::Future: Send + 'static,
{
    type Response = ExportTask;
    type Error = ExportError;
    type Future = Pin<Box<dyn Future<Output = Result<ExportTask, ExportError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, op: ExportOperation) -> Self::Future {
        let task_id = op.task_id;
        let limit = op.timeout;
        let fut = self.inner.call(op);
        Box::pin(async move {
            let Some(limit) = limit else {
                return fut.await;
            };
            match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    warn!(task_id, timeout_ms, "export task exceeded its deadline");
                    Err(ExportError::Timeout {
                        task_id,
                        timeout_ms,
                    })
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tower::ServiceExt;

    use super::*;
    use crate::service::operation::ExportStrategyKind;

    /// Service that takes a configurable delay before responding.
    struct SlowService {
        delay: Duration,
    }

    impl Service<ExportOperation> for SlowService {
        type Response = ExportTask;
        type Error = ExportError;
        type Future = Pin<Box<dyn Future<Output = Result<ExportTask, ExportError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, op: ExportOperation) -> Self::Future {
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(ExportTask::completed(op.task_id, "slow.csv".into(), 1, 1))
            })
        }
    }

    fn make_op(timeout: Option<Duration>) -> ExportOperation {
        ExportOperation::new(11, ExportStrategyKind::Batched, "req").with_timeout(timeout)
    }

    #[tokio::test(start_paused = true)]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(SlowService {
            delay: Duration::from_millis(10),
        });
        let task = svc
            .oneshot(make_op(Some(Duration::from_secs(1))))
            .await
            .unwrap();
        assert_eq!(task.task_id, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(SlowService {
            delay: Duration::from_secs(200),
        });
        let err = svc
            .oneshot(make_op(Some(Duration::from_secs(120))))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::Timeout {
                task_id: 11,
                timeout_ms: 120_000
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_operation_waits() {
        let svc = TimeoutLayer.layer(SlowService {
            delay: Duration::from_secs(3_600),
        });
        assert!(svc.oneshot(make_op(None)).await.is_ok());
    }
}
