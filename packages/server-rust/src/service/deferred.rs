//! Single-value results resolved after an artificial delay.

use std::time::Duration;

/// One value released no earlier than `delay` after resolution starts.
///
/// The value is handed back unchanged. Dropping the future before the delay
/// elapses abandons it without side effects.
#[derive(Debug)]
pub struct Deferred<T> {
    value: T,
    delay: Duration,
}

impl<T> Deferred<T> {
    #[must_use]
    pub fn new(value: T, delay: Duration) -> Self {
        Self { value, delay }
    }

    pub async fn resolve(self) -> T {
        tokio::time::sleep(self.delay).await;
        self.value
    }
}
