//! Bounded pool for blocking stage simulations.
//!
//! Jobs run on tokio's blocking threads so request-handling workers are never
//! occupied by a sleeping stage. A semaphore bounds how many jobs run at once;
//! submitters beyond the bound wait for a permit rather than being rejected.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::Span;

use super::operation::PoolError;

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// Submit/await handle to the blocking worker pool.
///
/// Cloning shares the same permits.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Creates a pool allowing `size` concurrent blocking jobs (minimum 1).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of jobs that could start right now without waiting.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs `job` on a blocking thread and awaits its result.
    ///
    /// The job inherits the caller's tracing span. The permit is held by the
    /// job itself, so if the caller stops waiting the job still finishes and
    /// only then frees its slot.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`] after [`WorkerPool::close`], and
    /// [`PoolError::Panicked`] if the job panics.
    pub async fn submit<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        let span = Span::current();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _entered = span.enter();
            job()
        })
        .await
        .map_err(|e| PoolError::Panicked(e.to_string()))
    }

    /// Stops accepting jobs. Jobs already running finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use super::*;

    #[tokio::test]
    async fn submit_returns_job_result() {
        let pool = WorkerPool::new(2);
        let out = pool.submit(|| 21 * 2).await.unwrap();
        assert_eq!(out, 42);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn zero_size_is_clamped_to_one() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.submit(|| "ok").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn panicking_job_reports_error() {
        let pool = WorkerPool::new(1);
        let err = pool
            .submit(|| -> u8 { panic!("stage exploded") })
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Panicked(_)));
        // The permit is released even though the job panicked.
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn submit_after_close_returns_error() {
        let pool = WorkerPool::new(1);
        pool.close();
        let err = pool.submit(|| ()).await.unwrap_err();
        assert_eq!(err, PoolError::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrency_never_exceeds_size() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                pool.submit(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn three_jobs_run_side_by_side() {
        let pool = WorkerPool::new(3);
        let start = Instant::now();
        let jobs = (0..3).map(|i| {
            let pool = pool.clone();
            async move {
                pool.submit(move || {
                    std::thread::sleep(Duration::from_millis(200));
                    i
                })
                .await
            }
        });
        let results = futures_util::future::join_all(jobs).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(Result::is_ok));
        // Sequential execution would take at least 600ms.
        assert!(start.elapsed() < Duration::from_millis(550));
    }
}
