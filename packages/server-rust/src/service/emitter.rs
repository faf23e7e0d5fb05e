//! Time-spaced, finite, ordered streaming of domain values.

use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};

/// Produces a lazy stream yielding each source element after a fixed delay.
///
/// The delay precedes every emission, so the first element appears after one
/// delay and `N` elements take at least `N * delay`. Elements keep source
/// order and at most one element is in flight. Dropping the stream skips every
/// pending emission.
#[derive(Debug)]
pub struct StreamingEmitter<T> {
    items: Vec<T>,
    delay: Duration,
}

impl<T: Send + 'static> StreamingEmitter<T> {
    #[must_use]
    pub fn new(items: Vec<T>, delay: Duration) -> Self {
        Self { items, delay }
    }

    /// Consumes the emitter; the returned stream cannot be restarted.
    pub fn into_stream(self) -> BoxStream<'static, T> {
        let delay = self.delay;
        stream::iter(self.items)
            .then(move |item| async move {
                tokio::time::sleep(delay).await;
                item
            })
            .boxed()
    }
}
