//! Interchangeable long-running export strategies.
//!
//! Every strategy honours the same contract: given a task id, produce exactly
//! one terminal outcome, either an [`ExportTask`] or an [`ExportError`].
//!
//! - [`BlockingExport`]: three blocking stages on the worker pool, then a
//!   one-shot injected failure with fixed probability.
//! - [`StagedExport`]: the same three stages as non-blocking timers.
//! - [`BatchedExport`]: fixed number of blocking batches; its ceiling is
//!   enforced by the pipeline's timeout layer.

mod batched;
mod blocking;
mod staged;

pub use batched::BatchedExport;
pub use blocking::{BlockingExport, FailureInjector};
pub use staged::StagedExport;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fluxdemo_core::ExportTask;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::operation::{ExportError, ExportOperation, ExportStrategyKind, StageError};

/// Bytes attributed to each exported record by the staged and blocking strategies.
pub const BYTES_PER_RECORD: u64 = 50;
/// Bytes attributed to each exported record by the batched strategy.
pub const BATCH_BYTES_PER_RECORD: u64 = 75;

/// One export strategy. Implementations must resolve exactly once.
#[async_trait]
pub trait ExportStrategy: Send + Sync + 'static {
    fn kind(&self) -> ExportStrategyKind;

    /// Runs the simulated workload for `op` to a single terminal outcome.
    async fn run(&self, op: ExportOperation) -> Result<ExportTask, ExportError>;
}

/// A named, timed step of simulated work.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Stage {
    pub name: &'static str,
    pub duration: Duration,
}

impl Stage {
    pub(crate) const fn new(name: &'static str, duration: Duration) -> Self {
        Self { name, duration }
    }
}

/// Builds `<prefix>_<task_id>_<epoch millis>.csv`.
pub(crate) fn export_file_name(prefix: &str, task_id: i64) -> String {
    format!("{prefix}_{task_id}_{}.csv", Utc::now().timestamp_millis())
}

/// Runs `stages` back to back on the current (blocking) thread.
///
/// Cancellation is observed only between stages; a stage that has started
/// sleeps to completion.
pub(crate) fn run_blocking_stages(
    task_id: i64,
    stages: &[Stage],
    cancel: &CancellationToken,
    interrupted: &'static str,
) -> Result<(), StageError> {
    for stage in stages {
        if cancel.is_cancelled() {
            return Err(StageError::Interrupted { stage: interrupted });
        }
        info!(
            task_id,
            stage = stage.name,
            duration_ms = u64::try_from(stage.duration.as_millis()).unwrap_or(u64::MAX),
            "export stage started"
        );
        std::thread::sleep(stage.duration);
    }
    Ok(())
}

/// Number of records in the export database.
pub(crate) fn export_record_count() -> u64 {
    u64::try_from(fluxdemo_core::UserDirectory::export_database().len()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_encodes_prefix_and_id() {
        let name = export_file_name("user_export", 42);
        assert!(name.starts_with("user_export_42_"));
        assert!(name.ends_with(".csv"));
        let millis = name
            .trim_start_matches("user_export_42_")
            .trim_end_matches(".csv");
        assert!(millis.parse::<i64>().is_ok());
    }

    #[test]
    fn blocking_stages_stop_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stages = [Stage::new("query", Duration::from_secs(60))];
        let err = run_blocking_stages(1, &stages, &cancel, "Export").unwrap_err();
        assert_eq!(err, StageError::Interrupted { stage: "Export" });
    }

    #[test]
    fn blocking_stages_complete() {
        let stages = [
            Stage::new("a", Duration::from_millis(1)),
            Stage::new("b", Duration::from_millis(1)),
        ];
        assert!(run_blocking_stages(1, &stages, &CancellationToken::new(), "Export").is_ok());
    }

    #[test]
    fn record_count_matches_database() {
        assert_eq!(export_record_count(), 10);
    }
}
