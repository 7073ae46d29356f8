use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Counts outstanding tasks and wakes waiters when the count drops to zero.
#[derive(Debug, Default)]
pub(crate) struct WaitGroup {
    count: AtomicUsize,
    idle: Notify,
}
impl WaitGroup {
    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn add(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn done(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub(crate) async fn wait(&self) {
        loop {
            // Register interest before checking the count, otherwise a
            // `done()` landing between the two is missed.
            let mut notified = pin!(self.idle.notified());
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Holds one slot in the engine-wide and batch wait groups.
///
/// Taken before a task is spawned and released when the task's future is
/// dropped, whether it finished, failed, or panicked.
pub(crate) struct WorkerGuard {
    engine: Arc<WaitGroup>,
    batch: Arc<WaitGroup>,
}
impl WorkerGuard {
    pub(crate) fn new(engine: &Arc<WaitGroup>, batch: &Batch) -> Self {
        engine.add();
        batch.group.add();
        Self { engine: engine.clone(), batch: batch.group.clone() }
    }
}
impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.batch.done();
        self.engine.done();
    }
}

/// Join handle over every background task started by one engine call.
///
/// Batch operations spawn a coordinating task which in turn spawns one task
/// per file; the batch is done once all of them have finished. Dropping a
/// `Batch` does not cancel anything.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    group: Arc<WaitGroup>,
}
impl Batch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of this batch's tasks that are queued or running.
    pub fn pending(&self) -> usize {
        self.group.count()
    }

    /// `true` once every task in the batch has finished.
    pub fn is_done(&self) -> bool {
        self.pending() == 0
    }

    /// Wait until every task in the batch has finished.
    pub async fn wait(&self) {
        self.group.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_tracks_both_groups() {
        let engine = Arc::new(WaitGroup::default());
        let batch = Batch::new();
        let first = WorkerGuard::new(&engine, &batch);
        let second = WorkerGuard::new(&engine, &Batch::new());
        assert_eq!(engine.count(), 2);
        assert_eq!(batch.pending(), 1);
        drop(first);
        assert!(batch.is_done());
        assert_eq!(engine.count(), 1);
        drop(second);
        assert_eq!(engine.count(), 0);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_idle() {
        let batch = Batch::new();
        tokio::time::timeout(Duration::from_secs(1), batch.wait()).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wait_wakes_on_last_guard() {
        let engine = Arc::new(WaitGroup::default());
        let batch = Batch::new();
        let guards: Vec<_> = (0..3).map(|_| WorkerGuard::new(&engine, &batch)).collect();
        let handle = tokio::spawn(async move {
            for guard in guards {
                tokio::time::sleep(Duration::from_millis(5)).await;
                drop(guard);
            }
        });
        tokio::time::timeout(Duration::from_secs(5), batch.wait()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), engine.wait()).await.unwrap();
        assert_eq!(engine.count(), 0);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_guard_released_on_panic() {
        let engine = Arc::new(WaitGroup::default());
        let batch = Batch::new();
        let guard = WorkerGuard::new(&engine, &batch);
        let result = tokio::spawn(async move {
            let _guard = guard;
            panic!("task failed");
        })
        .await;
        assert!(result.is_err());
        assert_eq!(engine.count(), 0);
        assert!(batch.is_done());
    }
}
