use std::time::Duration;

use super::operation::ExportStrategyKind;

/// Server-level configuration for handlers and the export pipeline.
///
/// Controls artificial delays, worker pool sizing, and concurrency limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Delay preceding each element of the streamed user list.
    pub stream_delay: Duration,
    /// Delay before a created user is echoed back.
    pub create_delay: Duration,
    /// Whether the access policy is enforced. When `false` every route is open.
    pub security_enabled: bool,
    /// Number of blocking stage simulations allowed to run at once.
    pub worker_pool_size: usize,
    /// Maximum number of export tasks in flight before new ones are rejected.
    pub max_concurrent_exports: u32,
    /// Export pipeline timings and failure injection.
    pub export: ExportConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            stream_delay: Duration::from_millis(100),
            create_delay: Duration::from_millis(200),
            security_enabled: true,
            worker_pool_size: 16,
            max_concurrent_exports: 64,
            export: ExportConfig::default(),
        }
    }
}

/// Timings and failure injection for the long-running export strategies.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Simulated database query stage.
    pub query_duration: Duration,
    /// Simulated record processing stage.
    pub process_duration: Duration,
    /// Simulated file generation stage.
    pub generate_duration: Duration,
    /// Number of batches run by the batched strategy.
    pub batch_count: u32,
    /// Simulated work per batch.
    pub batch_duration: Duration,
    /// Hard ceiling for the batched strategy, measured from task start.
    pub batch_timeout: Duration,
    /// Probability in `[0, 1]` that the offloaded-blocking strategy fails.
    pub failure_rate: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            query_duration: Duration::from_secs(2),
            process_duration: Duration::from_secs(3),
            generate_duration: Duration::from_secs(2),
            batch_count: 5,
            batch_duration: Duration::from_secs(1),
            batch_timeout: Duration::from_secs(120),
            failure_rate: 0.10,
        }
    }
}

impl ExportConfig {
    /// Returns the deadline enforced for a strategy, if any.
    ///
    /// Only the batched strategy runs under a ceiling.
    #[must_use]
    pub fn timeout_for(&self, strategy: ExportStrategyKind) -> Option<Duration> {
        match strategy {
            ExportStrategyKind::Batched => Some(self.batch_timeout),
            ExportStrategyKind::Blocking | ExportStrategyKind::Staged => None,
        }
    }

    /// Configuration with every delay zeroed, for tests.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            query_duration: Duration::ZERO,
            process_duration: Duration::ZERO,
            generate_duration: Duration::ZERO,
            batch_duration: Duration::ZERO,
            ..Self::default()
        }
    }
}
