//! Strategy routing: dispatches `ExportOperation` to the registered strategy
//! named by its `strategy` discriminant.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use fluxdemo_core::ExportTask;
use tower::Service;

use super::operation::{ExportError, ExportOperation, ExportStrategyKind};
use super::strategies::ExportStrategy;

type BoxedFuture = Pin<Box<dyn Future<Output = Result<ExportTask, ExportError>> + Send>>;

// ---------------------------------------------------------------------------
// StrategyRouter
// ---------------------------------------------------------------------------

/// Routes each `ExportOperation` to the strategy registered for its kind.
///
/// Operations naming an unregistered strategy fail with
/// `ExportError::UnknownStrategy`. Strategies are shared, so cloning the
/// router is cheap.
#[derive(Clone, Default)]
pub struct StrategyRouter {
    strategies: HashMap<ExportStrategyKind, Arc<dyn ExportStrategy>>,
}

impl StrategyRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `strategy` under its own kind, replacing any previous one.
    pub fn register<S: ExportStrategy>(&mut self, strategy: S) {
        self.strategies.insert(strategy.kind(), Arc::new(strategy));
    }

    #[must_use]
    pub fn with<S: ExportStrategy>(mut self, strategy: S) -> Self {
        self.register(strategy);
        self
    }

    #[must_use]
    pub fn contains(&self, kind: ExportStrategyKind) -> bool {
        self.strategies.contains_key(&kind)
    }
}

impl Service<ExportOperation> for StrategyRouter {
    type Response = ExportTask;
    type Error = ExportError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: ExportOperation) -> Self::Future {
        match self.strategies.get(&op.strategy) {
            Some(strategy) => {
                let strategy = Arc::clone(strategy);
                Box::pin(async move { strategy.run(op).await })
            }
            None => {
                let strategy = op.strategy;
                Box::pin(async move { Err(ExportError::UnknownStrategy { strategy }) })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
