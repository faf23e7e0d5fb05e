//! `fluxdemo` server: streamed and deferred responses, a long-running export
//! pipeline with three strategies, structured error reporting and request
//! correlation over axum.

pub mod cli;
pub mod network;
pub mod service;
pub mod telemetry;

pub use network::{build_app, AppState, NetworkConfig, NetworkModule};
pub use service::{ExportService, ServerConfig};
