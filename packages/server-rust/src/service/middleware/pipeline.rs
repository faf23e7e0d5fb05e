//! Pipeline composition: combines all middleware layers into a single service stack.

use fluxdemo_core::ExportTask;
use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::service::config::ServerConfig;
use crate::service::operation::{ExportError, ExportOperation};
use crate::service::router::StrategyRouter;

/// Type-erased export pipeline, cheap to clone into handlers.
pub type ExportPipeline = BoxCloneSyncService<ExportOperation, ExportTask, ExportError>;

/// Build the export pipeline by wrapping the `StrategyRouter` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record timing and outcome, including rejections and timeouts
/// 2. `LoadShedLayer` -- reject when too many tasks are in flight
/// 3. `TimeoutLayer` -- enforce per-operation deadlines
#[must_use]
pub fn build_export_pipeline(router: StrategyRouter, config: &ServerConfig) -> ExportPipeline {
    let stack = ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(LoadShedLayer::new(config.max_concurrent_exports))
        .layer(TimeoutLayer)
        .service(router);
    BoxCloneSyncService::new(stack)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
