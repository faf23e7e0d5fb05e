//! HTTP surface: configuration, middleware, error intercepts, access
//! control, handlers and the server lifecycle.

pub mod auth;
pub mod config;
pub mod correlation;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use auth::{AccessPolicy, AuthState, CredentialStore};
pub use config::{NetworkConfig, TlsConfig};
pub use correlation::REQUEST_ID_HEADER;
pub use error::{ApiError, FailureKind};
pub use handlers::AppState;
pub use module::{build_app, NetworkModule};
pub use shutdown::{HealthState, ShutdownController};
