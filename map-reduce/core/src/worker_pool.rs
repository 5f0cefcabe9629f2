use crate::remote_worker::{RemoteWorker, WorkerId};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("worker pool is closed")]
pub struct PoolClosed;

/// Idle workers waiting for an operation
///
/// Acquire blocks while the pool is empty, so the pool population is also
/// the bound on in-flight operations. One semaphore permit exists per idle
/// worker in the deque.
pub struct WorkerPool<W> {
    idle: Mutex<VecDeque<W>>,
    available: Semaphore,
}

impl<W> WorkerPool<W> {
    pub fn new(workers: impl IntoIterator<Item = W>) -> Self {
        let idle: VecDeque<W> = workers.into_iter().collect();
        let available = Semaphore::new(idle.len());
        Self {
            idle: Mutex::new(idle),
            available,
        }
    }

    /// Take an idle worker, waiting until one is released
    /// Fails only once the pool has been closed
    pub async fn acquire(&self) -> Result<W, PoolClosed> {
        let permit = self.available.acquire().await.map_err(|_| PoolClosed)?;
        permit.forget();
        self.lock_idle().pop_front().ok_or(PoolClosed)
    }

    /// Hand a worker back, waking one pending acquire
    pub fn release(&self, worker: W) {
        self.lock_idle().push_back(worker);
        self.available.add_permits(1);
    }

    /// Stop handing out workers; pending and future acquires fail
    /// Released workers are still kept so they can be inspected
    pub fn close(&self) {
        self.available.close();
    }

    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<W>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: RemoteWorker> WorkerPool<W> {
    pub fn idle_ids(&self) -> Vec<WorkerId> {
        self.lock_idle().iter().map(|w| w.id().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_returns_workers_in_release_order() {
        let pool = WorkerPool::new(vec![1, 2]);
        assert_eq!(pool.acquire().await, Ok(1));
        assert_eq!(pool.acquire().await, Ok(2));
        pool.release(7);
        assert_eq!(pool.acquire().await, Ok(7));
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let pool = Arc::new(WorkerPool::<u32>::new(Vec::new()));

        let waiter = tokio::spawn({
            let pool = pool.clone();
            async move { pool.acquire().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "acquire should block on an empty pool");

        pool.release(42);
        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("acquire did not wake up")
            .expect("task panicked");
        assert_eq!(got, Ok(42));
    }

    #[tokio::test]
    async fn test_close_fails_pending_acquire() {
        let pool = Arc::new(WorkerPool::<u32>::new(Vec::new()));

        let waiter = tokio::spawn({
            let pool = pool.clone();
            async move { pool.acquire().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.close();

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("close did not wake acquire")
            .expect("task panicked");
        assert_eq!(got, Err(PoolClosed));
        assert_eq!(pool.acquire().await, Err(PoolClosed));
    }

    #[tokio::test]
    async fn test_closed_pool_keeps_released_workers() {
        let pool = WorkerPool::new(vec![1]);
        pool.close();
        pool.release(2);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(pool.acquire().await, Err(PoolClosed));
    }
}
