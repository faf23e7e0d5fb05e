//! Tower middleware layers for the export pipeline.
//!
//! - [`metrics`]: Task timing and counting via `tracing` spans and `metrics`
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`timeout`]: Per-operation deadline enforcement
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod load_shed;
pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_export_pipeline, ExportPipeline};
pub use timeout::TimeoutLayer;
