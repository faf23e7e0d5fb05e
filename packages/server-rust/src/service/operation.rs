//! Export task request, strategy discriminant, and failure types.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Selects which of the interchangeable export strategies runs a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportStrategyKind {
    /// Three blocking stages offloaded to the worker pool, with injected failure.
    Blocking,
    /// Three non-blocking timer stages; no thread is held while waiting.
    Staged,
    /// Fixed number of blocking batches under a hard deadline.
    Batched,
}

impl ExportStrategyKind {
    pub const ALL: [Self; 3] = [Self::Blocking, Self::Staged, Self::Batched];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Staged => "staged",
            Self::Batched => "batched",
        }
    }
}

impl fmt::Display for ExportStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One export invocation travelling through the pipeline.
#[derive(Debug, Clone)]
pub struct ExportOperation {
    pub task_id: i64,
    pub strategy: ExportStrategyKind,
    /// Correlation id of the request that started the task.
    pub request_id: String,
    /// Ceiling measured from entry into the timeout layer. `None` means unbounded.
    pub timeout: Option<Duration>,
    /// Cancelled when the caller goes away; checked between stages.
    pub cancel: CancellationToken,
}

impl ExportOperation {
    #[must_use]
    pub fn new(task_id: i64, strategy: ExportStrategyKind, request_id: impl Into<String>) -> Self {
        Self {
            task_id,
            strategy,
            request_id: request_id.into(),
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Failure raised inside a single stage of a strategy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("Export failed due to system error")]
    SystemError,
    #[error("{stage} interrupted")]
    Interrupted { stage: &'static str },
    #[error("worker failed: {0}")]
    Worker(#[from] PoolError),
}

/// Errors from the bounded worker pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// Terminal failure of an export task.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export operation failed: {source}")]
    Failed {
        task_id: i64,
        #[source]
        source: StageError,
    },
    #[error("Export task {task_id} did not complete within {timeout_ms}ms")]
    Timeout { task_id: i64, timeout_ms: u64 },
    #[error("Export task {task_id} was cancelled")]
    Cancelled { task_id: i64 },
    #[error("Too many concurrent export tasks, try again later")]
    Overloaded,
    #[error("Worker pool rejected export task {task_id}: {source}")]
    Rejected {
        task_id: i64,
        #[source]
        source: PoolError,
    },
    #[error("No export strategy registered for '{strategy}'")]
    UnknownStrategy { strategy: ExportStrategyKind },
}

impl ExportError {
    /// Failure kind name reported in error payloads.
    #[must_use]
    pub fn exception_name(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "RuntimeException",
            Self::Timeout { .. } => "TimeoutException",
            Self::Cancelled { .. } => "CancellationException",
            Self::Overloaded | Self::Rejected { .. } => "RejectedExecutionException",
            Self::UnknownStrategy { .. } => "IllegalStateException",
        }
    }

    /// Maps a stage failure to the task-level error, keeping the cause chain.
    #[must_use]
    pub fn from_stage(task_id: i64, source: StageError) -> Self {
        match source {
            StageError::Interrupted { .. } => Self::Cancelled { task_id },
            StageError::Worker(PoolError::Closed) => Self::Rejected {
                task_id,
                source: PoolError::Closed,
            },
            other => Self::Failed {
                task_id,
                source: other,
            },
        }
    }
}

/// Renders an error and its sources as `outer: inner: root`.
#[must_use]
pub fn cause_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
