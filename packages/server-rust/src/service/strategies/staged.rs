use async_trait::async_trait;
use fluxdemo_core::ExportTask;
use tracing::{info, warn};

use super::{export_file_name, export_record_count, ExportStrategy, Stage, BYTES_PER_RECORD};
use crate::service::config::ExportConfig;
use crate::service::operation::{ExportError, ExportOperation, ExportStrategyKind};

/// Non-blocking strategy: the three stages are timers, so no worker is held
/// while a task waits. Never injects failures.
pub struct StagedExport {
    stages: [Stage; 3],
    records: u64,
}

impl StagedExport {
    #[must_use]
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            stages: [
                Stage::new("query", config.query_duration),
                Stage::new("process", config.process_duration),
                Stage::new("generate", config.generate_duration),
            ],
            records: export_record_count(),
        }
    }
}

#[async_trait]
impl ExportStrategy for StagedExport {
    fn kind(&self) -> ExportStrategyKind {
        ExportStrategyKind::Staged
    }

    async fn run(&self, op: ExportOperation) -> Result<ExportTask, ExportError> {
        let task_id = op.task_id;
        info!(task_id, records = self.records, "Starting reactive export");

        for stage in &self.stages {
            tokio::select! {
                biased;
                () = op.cancel.cancelled() => {
                    warn!(task_id, stage = stage.name, "Reactive export cancelled");
                    return Err(ExportError::Cancelled { task_id });
                }
                () = tokio::time::sleep(stage.duration) => {
                    info!(task_id, stage = stage.name, "export stage completed");
                }
            }
        }

        let task = ExportTask::completed(
            task_id,
            export_file_name("user_export_reactive", task_id),
            self.records,
            BYTES_PER_RECORD,
        );
        info!(task_id, file = %task.file_name, "Reactive export completed successfully");
        Ok(task)
    }
}
