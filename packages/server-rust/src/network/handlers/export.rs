//! Export endpoints, one per strategy. Each request runs one task to its
//! single terminal outcome; a disconnecting client cancels the task.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use fluxdemo_core::{CorrelationContext, ExportTask};

use super::{parse_id, AppState};
use crate::network::error::ApiError;
use crate::service::ExportStrategyKind;

async fn run(
    state: &AppState,
    strategy: ExportStrategyKind,
    id: Result<Path<String>, PathRejection>,
    ctx: Option<Extension<CorrelationContext>>,
) -> Result<Json<ExportTask>, ApiError> {
    let task_id = parse_id(id)?;
    let request_id = ctx.map_or_else(
        || CorrelationContext::fallback().id().to_owned(),
        |Extension(ctx)| ctx.id().to_owned(),
    );
    let task = state.exports.export(strategy, task_id, &request_id).await?;
    Ok(Json(task))
}

/// `GET /api/users/export/{id}`: offloaded-blocking strategy.
pub async fn export_blocking(
    State(state): State<AppState>,
    ctx: Option<Extension<CorrelationContext>>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<ExportTask>, ApiError> {
    run(&state, ExportStrategyKind::Blocking, id, ctx).await
}

/// `GET /api/users/export-reactive/{id}`: non-blocking staged strategy.
pub async fn export_staged(
    State(state): State<AppState>,
    ctx: Option<Extension<CorrelationContext>>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<ExportTask>, ApiError> {
    run(&state, ExportStrategyKind::Staged, id, ctx).await
}

/// `GET /api/users/export-batch/{id}`: batched strategy under its ceiling.
pub async fn export_batched(
    State(state): State<AppState>,
    ctx: Option<Extension<CorrelationContext>>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<ExportTask>, ApiError> {
    run(&state, ExportStrategyKind::Batched, id, ctx).await
}
