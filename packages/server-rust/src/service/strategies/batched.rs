use std::time::Duration;

use async_trait::async_trait;
use fluxdemo_core::ExportTask;
use tracing::{error, info};

use super::{export_file_name, export_record_count, ExportStrategy, BATCH_BYTES_PER_RECORD};
use crate::service::config::ExportConfig;
use crate::service::operation::{
    cause_chain, ExportError, ExportOperation, ExportStrategyKind, StageError,
};
use crate::service::worker::WorkerPool;

/// Batch strategy: `batch_count` blocking batches on the worker pool.
///
/// The ceiling is carried on [`ExportOperation::timeout`] and enforced by the
/// pipeline's timeout layer; when it fires this future is dropped and the
/// remaining batches are skipped.
pub struct BatchedExport {
    pool: WorkerPool,
    batch_count: u32,
    batch_duration: Duration,
    records: u64,
}

impl BatchedExport {
    #[must_use]
    pub fn new(pool: WorkerPool, config: &ExportConfig) -> Self {
        Self {
            pool,
            batch_count: config.batch_count,
            batch_duration: config.batch_duration,
            records: export_record_count(),
        }
    }
}

#[async_trait]
impl ExportStrategy for BatchedExport {
    fn kind(&self) -> ExportStrategyKind {
        ExportStrategyKind::Batched
    }

    async fn run(&self, op: ExportOperation) -> Result<ExportTask, ExportError> {
        let task_id = op.task_id;
        info!(task_id, batches = self.batch_count, "Starting batch export");

        let _cancel_on_drop = op.cancel.clone().drop_guard();
        let cancel = op.cancel.clone();
        let (count, duration) = (self.batch_count, self.batch_duration);

        let outcome = self
            .pool
            .submit(move || {
                for batch in 1..=count {
                    if cancel.is_cancelled() {
                        return Err(StageError::Interrupted {
                            stage: "Batch processing",
                        });
                    }
                    info!(task_id, batch, total = count, "Processing batch {batch}/{count}");
                    std::thread::sleep(duration);
                }
                Ok(())
            })
            .await
            .map_err(StageError::from)
            .and_then(|batches| batches);

        match outcome {
            Ok(()) => {
                let task = ExportTask::completed(
                    task_id,
                    export_file_name("batch_export", task_id),
                    self.records,
                    BATCH_BYTES_PER_RECORD,
                );
                info!(task_id, file = %task.file_name, "Batch export completed");
                Ok(task)
            }
            Err(stage_error) => {
                let err = ExportError::from_stage(task_id, stage_error);
                error!(task_id, cause = %cause_chain(&err), "Batch export failed");
                Err(err)
            }
        }
    }
}
