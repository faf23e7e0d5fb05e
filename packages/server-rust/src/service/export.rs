//! Entry point for export tasks: assembles strategies, pool and middleware.

use std::sync::Arc;

use fluxdemo_core::ExportTask;
use tower::ServiceExt;

use super::config::{ExportConfig, ServerConfig};
use super::middleware::{build_export_pipeline, ExportPipeline};
use super::operation::{ExportError, ExportOperation, ExportStrategyKind};
use super::router::StrategyRouter;
use super::strategies::{BatchedExport, BlockingExport, FailureInjector, StagedExport};
use super::worker::WorkerPool;

/// Runs export tasks through the strategy pipeline.
///
/// Cheap to clone; all clones share the worker pool and concurrency limits.
#[derive(Clone)]
pub struct ExportService {
    pipeline: ExportPipeline,
    export: Arc<ExportConfig>,
    pool: WorkerPool,
}

impl ExportService {
    /// Builds the service with failure injection seeded from the OS.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_failures(config, FailureInjector::new(config.export.failure_rate))
    }

    /// Builds the service around a caller-supplied failure injector.
    #[must_use]
    pub fn with_failures(config: &ServerConfig, failures: FailureInjector) -> Self {
        let pool = WorkerPool::new(config.worker_pool_size);
        let router = StrategyRouter::new()
            .with(BlockingExport::new(
                pool.clone(),
                &config.export,
                Arc::new(failures),
            ))
            .with(StagedExport::new(&config.export))
            .with(BatchedExport::new(pool.clone(), &config.export));

        Self {
            pipeline: build_export_pipeline(router, config),
            export: Arc::new(config.export.clone()),
            pool,
        }
    }

    /// Runs one export task with `strategy` and waits for its outcome.
    ///
    /// Dropping the returned future cancels the task at its next checkpoint.
    ///
    /// # Errors
    ///
    /// Returns the task's terminal [`ExportError`].
    pub async fn export(
        &self,
        strategy: ExportStrategyKind,
        task_id: i64,
        request_id: &str,
    ) -> Result<ExportTask, ExportError> {
        let op = ExportOperation::new(task_id, strategy, request_id)
            .with_timeout(self.export.timeout_for(strategy));
        self.pipeline.clone().oneshot(op).await
    }

    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn config(export: ExportConfig) -> ServerConfig {
        ServerConfig {
            worker_pool_size: 4,
            export,
            ..ServerConfig::default()
        }
    }

    fn service(export: ExportConfig, failure_rate: f64) -> ExportService {
        ExportService::with_failures(&config(export), FailureInjector::seeded(failure_rate, 7))
    }

    #[tokio::test]
    async fn every_strategy_completes() {
        let svc = service(ExportConfig::instant(), 0.0);
        for (strategy, prefix, size) in [
            (ExportStrategyKind::Blocking, "user_export_9_", 500),
            (ExportStrategyKind::Staged, "user_export_reactive_9_", 500),
            (ExportStrategyKind::Batched, "batch_export_9_", 750),
        ] {
            let task = svc.export(strategy, 9, "req").await.unwrap();
            assert!(task.file_name.starts_with(prefix), "{}", task.file_name);
            assert_eq!(task.file_size_bytes, size);
        }
    }

    #[tokio::test]
    async fn blocking_failure_surfaces_wrapped_error() {
        let svc = service(ExportConfig::instant(), 1.0);
        let err = svc
            .export(ExportStrategyKind::Blocking, 1, "req")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Export operation failed: Export failed due to system error"
        );
    }

    #[tokio::test]
    async fn batched_deadline_fires_and_frees_the_worker() {
        let export = ExportConfig {
            batch_count: 5,
            batch_duration: Duration::from_millis(100),
            batch_timeout: Duration::from_millis(150),
            ..ExportConfig::instant()
        };
        let svc = ExportService::with_failures(
            &ServerConfig {
                worker_pool_size: 1,
                export,
                ..ServerConfig::default()
            },
            FailureInjector::seeded(0.0, 1),
        );

        let start = Instant::now();
        let err = svc
            .export(ExportStrategyKind::Batched, 3, "req")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::Timeout {
                task_id: 3,
                timeout_ms: 150
            }
        ));
        assert!(start.elapsed() < Duration::from_millis(400));

        // The abandoned job stops at the next batch boundary and frees its slot.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(svc.pool().available(), 1);
    }

    #[tokio::test]
    async fn staged_exports_run_concurrently() {
        let export = ExportConfig {
            query_duration: Duration::from_millis(100),
            process_duration: Duration::from_millis(100),
            generate_duration: Duration::from_millis(100),
            ..ExportConfig::instant()
        };
        let svc = service(export, 0.0);
        let start = Instant::now();
        let (a, b, c) = tokio::join!(
            svc.export(ExportStrategyKind::Staged, 1, "a"),
            svc.export(ExportStrategyKind::Staged, 2, "b"),
            svc.export(ExportStrategyKind::Staged, 3, "c"),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert!(start.elapsed() < Duration::from_millis(900));
    }
}
