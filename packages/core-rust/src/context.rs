use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Identifier used when a fresh correlation id cannot be produced.
pub const FALLBACK_REQUEST_ID: &str = "unknown-request-id";

/// Per-request correlation identity and timing start.
///
/// Created once by the boundary layer before any handler logic runs and read
/// by every downstream stage (handlers, export pipeline, error classifier).
/// Cloning is cheap; the id is shared, never mutated.
#[derive(Debug, Clone)]
pub struct CorrelationContext {
    id: Arc<str>,
    started_at: Instant,
}

impl CorrelationContext {
    /// Creates a context with a freshly generated UUID v4 id.
    #[must_use]
    pub fn generate() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Creates a context around an already known id.
    #[must_use]
    pub fn with_id(id: impl Into<Arc<str>>) -> Self {
        Self {
            id: id.into(),
            started_at: Instant::now(),
        }
    }

    /// Creates a context carrying [`FALLBACK_REQUEST_ID`].
    #[must_use]
    pub fn fallback() -> Self {
        Self::with_id(FALLBACK_REQUEST_ID)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time elapsed since the request entered the boundary layer.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        &*self.id == FALLBACK_REQUEST_ID
    }
}

impl fmt::Display for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let ids: HashSet<String> = (0..1_000)
            .map(|_| CorrelationContext::generate().id().to_string())
            .collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn generated_id_parses_as_uuid() {
        let ctx = CorrelationContext::generate();
        assert!(Uuid::parse_str(ctx.id()).is_ok());
        assert!(!ctx.is_fallback());
    }

    #[test]
    fn clone_shares_id_and_start() {
        let ctx = CorrelationContext::with_id("abc");
        let copy = ctx.clone();
        assert_eq!(copy.id(), "abc");
        assert_eq!(copy.started_at(), ctx.started_at());
    }

    #[test]
    fn fallback_uses_constant_id() {
        let ctx = CorrelationContext::fallback();
        assert_eq!(ctx.id(), FALLBACK_REQUEST_ID);
        assert!(ctx.is_fallback());
        assert_eq!(ctx.to_string(), FALLBACK_REQUEST_ID);
    }
}
