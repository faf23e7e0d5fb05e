use std::sync::Arc;

use async_trait::async_trait;
use fluxdemo_core::ExportTask;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

use super::{
    export_file_name, export_record_count, run_blocking_stages, ExportStrategy, Stage,
    BYTES_PER_RECORD,
};
use crate::service::config::ExportConfig;
use crate::service::operation::{
    cause_chain, ExportError, ExportOperation, ExportStrategyKind, StageError,
};
use crate::service::worker::WorkerPool;

// ---------------------------------------------------------------------------
// FailureInjector
// ---------------------------------------------------------------------------

/// Samples the synthetic transient failure, once per invocation.
#[derive(Debug)]
pub struct FailureInjector {
    rate: f64,
    rng: Mutex<StdRng>,
}

impl FailureInjector {
    /// Creates an injector failing with probability `rate`, seeded from the OS.
    ///
    /// Out-of-range rates are clamped to `[0, 1]`; NaN disables injection.
    #[must_use]
    pub fn new(rate: f64) -> Self {
        Self::with_rng(rate, StdRng::from_os_rng())
    }

    /// Deterministic injector for reproducible runs.
    #[must_use]
    pub fn seeded(rate: f64, seed: u64) -> Self {
        Self::with_rng(rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(rate: f64, rng: StdRng) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self {
            rate,
            rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn should_fail(&self) -> bool {
        self.rng.lock().random_bool(self.rate)
    }
}

// ---------------------------------------------------------------------------
// BlockingExport
// ---------------------------------------------------------------------------

/// Offloaded-blocking strategy: query, process and generate stages run
/// sequentially on the worker pool, followed by the injected failure draw.
pub struct BlockingExport {
    pool: WorkerPool,
    stages: [Stage; 3],
    failures: Arc<FailureInjector>,
    records: u64,
}

impl BlockingExport {
    #[must_use]
    pub fn new(pool: WorkerPool, config: &ExportConfig, failures: Arc<FailureInjector>) -> Self {
        Self {
            pool,
            stages: [
                Stage::new("query", config.query_duration),
                Stage::new("process", config.process_duration),
                Stage::new("generate", config.generate_duration),
            ],
            failures,
            records: export_record_count(),
        }
    }
}

#[async_trait]
impl ExportStrategy for BlockingExport {
    fn kind(&self) -> ExportStrategyKind {
        ExportStrategyKind::Blocking
    }

    async fn run(&self, op: ExportOperation) -> Result<ExportTask, ExportError> {
        let task_id = op.task_id;
        info!(task_id, records = self.records, "Starting async export");

        // Dropping this future (caller gone) stops the job at the next stage boundary.
        let _cancel_on_drop = op.cancel.clone().drop_guard();
        let cancel = op.cancel.clone();
        let stages = self.stages;
        let failures = Arc::clone(&self.failures);

        let outcome = self
            .pool
            .submit(move || {
                run_blocking_stages(task_id, &stages, &cancel, "Export")?;
                if failures.should_fail() {
                    return Err(StageError::SystemError);
                }
                Ok(())
            })
            .await
            .map_err(StageError::from)
            .and_then(|stages| stages);

        match outcome {
            Ok(()) => {
                let task = ExportTask::completed(
                    task_id,
                    export_file_name("user_export", task_id),
                    self.records,
                    BYTES_PER_RECORD,
                );
                info!(task_id, file = %task.file_name, "Export completed successfully");
                Ok(task)
            }
            Err(stage_error) => {
                let err = ExportError::from_stage(task_id, stage_error);
                error!(task_id, cause = %cause_chain(&err), "Export failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxdemo_core::ExportStatus;

    fn strategy(rate: f64, seed: u64) -> BlockingExport {
        BlockingExport::new(
            WorkerPool::new(4),
            &ExportConfig::instant(),
            Arc::new(FailureInjector::seeded(rate, seed)),
        )
    }

    fn op(task_id: i64) -> ExportOperation {
        ExportOperation::new(task_id, ExportStrategyKind::Blocking, "req")
    }

    #[tokio::test]
    async fn completes_with_expected_shape() {
        let task = strategy(0.0, 1).run(op(123)).await.unwrap();
        assert_eq!(task.task_id, 123);
        assert!(task.file_name.starts_with("user_export_123_"));
        assert_eq!(task.download_url, format!("/api/downloads/{}", task.file_name));
        assert_eq!(task.total_records, 10);
        assert_eq!(task.file_size_bytes, 500);
        assert_eq!(task.status, ExportStatus::Completed);
    }

    #[tokio::test]
    async fn injected_failure_is_wrapped() {
        let err = strategy(1.0, 1).run(op(5)).await.unwrap_err();
        assert!(matches!(err, ExportError::Failed { task_id: 5, .. }));
        assert_eq!(
            err.to_string(),
            "Export operation failed: Export failed due to system error"
        );
    }

    #[tokio::test]
    async fn cancelled_before_start_is_interrupted() {
        let op = op(6);
        op.cancel.cancel();
        let err = strategy(0.0, 1).run(op).await.unwrap_err();
        assert!(matches!(err, ExportError::Cancelled { task_id: 6 }));
    }

    #[tokio::test]
    async fn failure_rate_is_near_ten_percent() {
        let export = strategy(0.10, 0x5EED);
        let mut failures = 0;
        for task_id in 0..100 {
            if export.run(op(task_id)).await.is_err() {
                failures += 1;
            }
        }
        // Binomial(100, 0.1): mean 10, sd 3; the bounds sit beyond 3 sd.
        assert!((1..=22).contains(&failures), "observed {failures} failures");
    }

    #[test]
    fn injector_clamps_rate() {
        assert!((FailureInjector::seeded(7.0, 1).rate() - 1.0).abs() < f64::EPSILON);
        assert!(FailureInjector::seeded(-1.0, 1).rate().abs() < f64::EPSILON);
        assert!(FailureInjector::seeded(f64::NAN, 1).rate().abs() < f64::EPSILON);
    }

    #[test]
    fn zero_rate_never_fails() {
        let injector = FailureInjector::seeded(0.0, 9);
        assert!((0..1_000).all(|_| !injector.should_fail()));
    }
}
