use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;

/// Fixed-size pool of execution slots.
///
/// Every task may be submitted at once; `run` suspends until a slot frees. Clones share the
/// same slots.
#[derive(Clone)]
pub struct WorkerPool {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    slots: usize,
}

impl WorkerPool {
    pub fn new(name: &'static str, slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(slots)),
            slots,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `task` while holding one slot.
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("{} pool closed", self.name))?;
        Ok(task.await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::join_all;

    use super::*;

    #[tokio::test]
    async fn never_exceeds_slot_count() {
        let pool = WorkerPool::new("test", 3);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..30).map(|_| {
            let pool = pool.clone();
            let active = active.clone();
            let peak = peak.clone();
            async move {
                pool.run(async {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }
        });
        let results = join_all(tasks).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn zero_slots_rounds_up_to_one() {
        assert_eq!(WorkerPool::new("test", 0).slots(), 1);
    }
}
