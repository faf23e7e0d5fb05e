//! HTTP handler definitions.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod auth;
pub mod export;
pub mod health;
pub mod users;

pub use auth::{admin_endpoint, current_user, protected_endpoint, public_endpoint};
pub use export::{export_batched, export_blocking, export_staged};
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use users::{
    create_user, delete_user, get_user, list_users, method_not_allowed, route_not_found,
    test_bad_request, test_error,
};

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::PathRejection;

use super::error::ApiError;
use super::ShutdownController;
use crate::service::{ExportService, ServerConfig};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Delays and limits for handlers and the export pipeline.
    pub config: Arc<ServerConfig>,
    /// Long-running export pipeline.
    pub exports: ExportService,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let exports = ExportService::new(&config);
        Self::with_exports(config, exports)
    }

    #[must_use]
    pub fn with_exports(config: ServerConfig, exports: ExportService) -> Self {
        Self {
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(config),
            exports,
            start_time: Instant::now(),
        }
    }
}

/// Parses a numeric path id, classifying failures as input errors.
pub(crate) fn parse_id(
    raw: Result<axum::extract::Path<String>, PathRejection>,
) -> Result<i64, ApiError> {
    let axum::extract::Path(raw) =
        raw.map_err(|rejection| ApiError::input(rejection.body_text(), rejection))?;
    raw.parse::<i64>().map_err(|err| {
        ApiError::input(
            format!("Type mismatch: '{raw}' is not a valid id"),
            err,
        )
    })
}
