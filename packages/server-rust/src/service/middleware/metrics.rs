//! Metrics middleware for export operations.
//!
//! Wraps each task in an `export` span and records its duration and outcome
//! both as span fields and through the `metrics` facade:
//!
//! - `export_tasks_total{strategy, outcome}`
//! - `export_task_duration_seconds{strategy}`

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use fluxdemo_core::ExportTask;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{ExportError, ExportOperation};

pub const EXPORT_TASKS_TOTAL: &str = "export_tasks_total";
pub const EXPORT_TASK_DURATION_SECONDS: &str = "export_task_duration_seconds";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments export tasks with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records task duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

/// Label value for a finished task.
#[must_use]
pub fn outcome_label(result: &Result<ExportTask, ExportError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(ExportError::Timeout { .. }) => "timeout",
        Err(ExportError::Cancelled { .. }) => "cancelled",
        Err(ExportError::Overloaded | ExportError::Rejected { .. }) => "rejected",
        Err(_) => "error",
    }
}

impl<S> Service<ExportOperation> for MetricsService<S>
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
        let strategy = op.strategy.as_str();
        let task_id = op.task_id;

        let span = info_span!(
            "export",
            task_id = task_id,
            strategy = strategy,
            request_id = %op.request_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(op);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();
                let outcome = outcome_label(&result);

                let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!(EXPORT_TASKS_TOTAL, "strategy" => strategy, "outcome" => outcome)
                    .increment(1);
                metrics::histogram!(EXPORT_TASK_DURATION_SECONDS, "strategy" => strategy)
                    .record(elapsed.as_secs_f64());

                tracing::info!(
                    task_id,
                    strategy,
                    duration_ms,
                    outcome,
                    "export task complete"
                );

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
