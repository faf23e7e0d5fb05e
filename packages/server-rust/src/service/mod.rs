//! Export task execution framework.
//!
//! 1. **Strategies** (`strategies`): blocking, staged and batched exports
//! 2. **Routing** (`router`): dispatch to a strategy by kind
//! 3. **Middleware** (`middleware`): Tower layers (metrics, load-shedding, deadlines)
//! 4. **Worker pool** (`worker`): bounded offload for blocking stages
//! 5. **Primitives** (`emitter`, `deferred`): delayed streams and single values

pub mod config;
pub mod deferred;
pub mod emitter;
pub mod export;
pub mod middleware;
pub mod operation;
pub mod router;
pub mod strategies;
pub mod worker;

// Re-export key types for convenient access.
pub use config::{ExportConfig, ServerConfig};
pub use deferred::Deferred;
pub use emitter::StreamingEmitter;
pub use export::ExportService;
pub use operation::{
    cause_chain, ExportError, ExportOperation, ExportStrategyKind, PoolError, StageError,
};
pub use router::StrategyRouter;
pub use strategies::{ExportStrategy, FailureInjector};
pub use worker::WorkerPool;
