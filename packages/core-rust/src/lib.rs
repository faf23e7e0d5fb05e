//! Core types for fluxdemo: users, export tasks, error records, and the correlation context.

pub mod context;
pub mod directory;
pub mod error_record;
pub mod types;

pub use context::{CorrelationContext, FALLBACK_REQUEST_ID};
pub use directory::UserDirectory;
pub use error_record::ErrorRecord;
pub use types::{ExportStatus, ExportTask, Principal, Role, User};
