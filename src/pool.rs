//! Bounded-concurrency worker pool over an unbounded task stream.
//!
//! The pool admits deferred work one unit at a time, suspending submitters
//! until a permit frees up. Capacity bounds the in-flight task count, so
//! memory stays proportional to the permit count rather than to the total
//! amount of work queued behind it.
//!
//! Completion is tracked with a monotonic submitted/completed counter pair.
//! Work counts as submitted before its permit is acquired, and a
//! [`Reservation`] lets a parent task register its children synchronously
//! before it finishes, so the pool can never report itself drained while
//! recursively scheduled work is still pending.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tracing::trace;

/// Error type for pool construction and admission.
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    #[error("worker capacity must be at least 1")]
    InvalidCapacity,

    #[error("pool is closed")]
    Closed,
}

type DrainCallback = Box<dyn Fn() + Send + Sync>;

struct PoolInner {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    submitted: AtomicU64,
    completed: watch::Sender<u64>,
    drained: AtomicBool,
    on_drained: Option<DrainCallback>,
}

impl PoolInner {
    fn register(&self, count: u64) {
        self.submitted.fetch_add(count, Ordering::SeqCst);
    }

    /// Credit `count` finished (or abandoned) work units and fire the drain
    /// callback if everything ever submitted has now completed.
    fn mark_completed(&self, count: u64) {
        let mut done = 0;
        self.completed.send_modify(|c| {
            *c += count;
            done = *c;
        });
        // submitted only grows and every completion was registered first, so
        // equality here means the whole recursive submission tree is drained
        if done == self.submitted.load(Ordering::SeqCst)
            && done > 0
            && !self.drained.swap(true, Ordering::SeqCst)
        {
            trace!(completed = done, "pool drained");
            if let Some(callback) = &self.on_drained {
                callback();
            }
        }
    }
}

/// Pool of concurrent asynchronous workers.
///
/// Accepts individual futures and unbounded iterators of futures, including
/// submissions made from within running work items. Cloning the pool hands
/// out another submitter over the same permits and counters.
#[derive(Clone)]
pub struct WorkPool {
    inner: Arc<PoolInner>,
}

impl WorkPool {
    /// Create a pool with the given permit capacity.
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        Self::build(capacity, None)
    }

    /// Create a pool that invokes `on_drained` once all submitted work,
    /// including work submitted by other work, has completed.
    ///
    /// The callback fires at most once over the lifetime of the pool.
    pub fn with_drain_callback(
        capacity: usize,
        on_drained: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self, PoolError> {
        Self::build(capacity, Some(Box::new(on_drained)))
    }

    fn build(capacity: usize, on_drained: Option<DrainCallback>) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity);
        }
        let (completed, _) = watch::channel(0u64);
        Ok(Self {
            inner: Arc::new(PoolInner {
                capacity,
                semaphore: Arc::new(Semaphore::new(capacity)),
                submitted: AtomicU64::new(0),
                completed,
                drained: AtomicBool::new(false),
                on_drained,
            }),
        })
    }

    /// Permit capacity of the pool.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Total work units ever registered, including reserved-but-unadmitted.
    pub fn submitted(&self) -> u64 {
        self.inner.submitted.load(Ordering::SeqCst)
    }

    /// Total work units completed or abandoned.
    pub fn completed(&self) -> u64 {
        *self.inner.completed.borrow()
    }

    /// Number of admitted tasks currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.inner.capacity - self.inner.semaphore.available_permits()
    }

    /// Register `count` upcoming submissions without admitting them yet.
    ///
    /// The returned reservation must be used (or dropped) to balance the
    /// counters: slots submitted through it run as normal pool work, and any
    /// slots remaining when it is dropped are credited back as completed.
    /// Registering children through a reservation *before* the parent task
    /// returns is what keeps completion detection sound under recursive
    /// fire-and-forget scheduling.
    pub fn reserve(&self, count: usize) -> Reservation {
        self.inner.register(count as u64);
        Reservation {
            inner: Arc::clone(&self.inner),
            remaining: count,
        }
    }

    /// Submit one unit of work, suspending until a permit is available.
    ///
    /// The work is counted as submitted before the caller suspends, so a
    /// blocked submitter never lets the pool appear drained.
    pub async fn submit<F>(&self, work: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.reserve(1);
        slot.submit(work).await
    }

    /// Submit each item of an iterator in turn.
    ///
    /// Items are admitted lazily, one permit at a time; the iterator may be
    /// arbitrarily large without pre-materializing tasks.
    pub async fn submit_many<I, F>(&self, items: I) -> Result<(), PoolError>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = ()> + Send + 'static,
    {
        for work in items {
            self.submit(work).await?;
        }
        Ok(())
    }

    /// Wait until every work unit known at the time of the call has
    /// completed. Work submitted afterwards is not covered; callers that
    /// need full-drain semantics should use the drain callback.
    pub async fn join(&self) {
        let target = self.inner.submitted.load(Ordering::SeqCst);
        let mut rx = self.inner.completed.subscribe();
        // the sender lives inside our own Arc, so wait_for cannot fail
        let _ = rx.wait_for(|done| *done >= target).await;
    }

    /// Stop admitting work. Blocked and subsequent submissions return
    /// [`PoolError::Closed`] and their registered slots are credited as
    /// completed, letting the drain callback still fire.
    pub fn close(&self) {
        self.inner.semaphore.close();
    }
}

/// A batch of pre-registered submission slots, created by
/// [`WorkPool::reserve`].
pub struct Reservation {
    inner: Arc<PoolInner>,
    remaining: usize,
}

impl Reservation {
    /// Slots not yet submitted.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Admit one unit of work against a reserved slot, suspending until a
    /// permit is available.
    ///
    /// # Panics
    ///
    /// Panics if the reservation has no slots left.
    pub async fn submit<F>(&mut self, work: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        assert!(self.remaining > 0, "reservation has no slots left");

        let permit = match Arc::clone(&self.inner.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // pool closed while waiting; count the slot as finished
                self.remaining -= 1;
                self.inner.mark_completed(1);
                return Err(PoolError::Closed);
            }
        };

        self.remaining -= 1;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            work.await;
            drop(permit);
            inner.mark_completed(1);
        });
        Ok(())
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.remaining > 0 {
            self.inner.mark_completed(self.remaining as u64);
            self.remaining = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::sleep;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(WorkPool::new(0), Err(PoolError::InvalidCapacity)));
    }

    #[tokio::test]
    async fn test_capacity_is_never_exceeded() {
        let pool = WorkPool::new(3).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let current = Arc::clone(&current);
            let max_seen = Arc::clone(&max_seen);
            pool.submit(async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }

        pool.join().await;
        assert_eq!(pool.completed(), 20);
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_drain_callback_fires_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let pool = {
            let fired = Arc::clone(&fired);
            WorkPool::with_drain_callback(2, move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };

        for _ in 0..10 {
            pool.submit(async {
                sleep(Duration::from_millis(2)).await;
            })
            .await
            .unwrap();
        }

        pool.join().await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recursive_submission_completes_after_children() {
        let fired = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let pool = {
            let fired = Arc::clone(&fired);
            WorkPool::with_drain_callback(2, move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };

        // A pooled parent registers five children before it returns, then a
        // detached loop admits them, mirroring how network scans fan out.
        let child_pool = pool.clone();
        let child_counter = Arc::clone(&finished);
        pool.submit(async move {
            let mut batch = child_pool.reserve(5);
            tokio::spawn(async move {
                for _ in 0..5 {
                    let finished = Arc::clone(&child_counter);
                    let admitted = batch
                        .submit(async move {
                            sleep(Duration::from_millis(10)).await;
                            finished.fetch_add(1, Ordering::SeqCst);
                        })
                        .await;
                    if admitted.is_err() {
                        break;
                    }
                }
            });
        })
        .await
        .unwrap();

        // Wait for the drain signal, not join(): join only covers work known
        // at call time and the children are registered from inside the pool.
        for _ in 0..200 {
            if fired.load(Ordering::SeqCst) > 0 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(finished.load(Ordering::SeqCst), 5);
        assert_eq!(pool.completed(), 6);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_reservation_still_drains() {
        let fired = Arc::new(AtomicUsize::new(0));
        let pool = {
            let fired = Arc::clone(&fired);
            WorkPool::with_drain_callback(1, move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };

        let mut batch = pool.reserve(3);
        batch.submit(async {}).await.unwrap();
        drop(batch); // two unused slots credited back

        for _ in 0..200 {
            if fired.load(Ordering::SeqCst) > 0 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(pool.completed(), 3);
    }

    #[tokio::test]
    async fn test_submit_many_admits_lazily() {
        let pool = WorkPool::new(2).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let done = Arc::clone(&done);
                async move {
                    sleep(Duration::from_millis(2)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();
        pool.submit_many(tasks).await.unwrap();

        pool.join().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(pool.submitted(), 10);
    }

    #[tokio::test]
    async fn test_close_rejects_new_work() {
        let pool = WorkPool::new(1).unwrap();
        pool.close();
        let outcome = pool.submit(async {}).await;
        assert!(matches!(outcome, Err(PoolError::Closed)));
        // the rejected slot is still balanced
        assert_eq!(pool.submitted(), pool.completed());
    }

    #[tokio::test]
    async fn test_join_waits_for_known_work() {
        let pool = WorkPool::new(4).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let done = Arc::clone(&done);
            pool.submit(async move {
                sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }
        pool.join().await;
        assert_eq!(done.load(Ordering::SeqCst), 8);
    }
}
