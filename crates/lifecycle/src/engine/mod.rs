//! The background worker subsystem.
//!
//! [`LifecycleEngine`] compresses, decompresses, and deletes log files on a
//! Tokio runtime without blocking the caller. Every operation validates its
//! preconditions synchronously, then hands the actual I/O to a background
//! task. Callers poll two pieces of shared state:
//!
//! - [`is_working()`](LifecycleEngine::is_working): any background task is
//!   queued or running. Interactive callers use this to grey out actions.
//! - [`need_refresh()`](LifecycleEngine::need_refresh): at least one task has
//!   changed the directory since the last call. Reading clears it, so poll it
//!   once per tick and re-list the directory when it returns `true`.
//!
//! Work fans out to one task per file, bounded by a semaphore
//! ([`EngineBuilder::max_workers`]). There is no per-file locking between
//! tasks and no cancellation; a failure inside a task is logged and only
//! affects that one file.
//!
//! # Durability
//!
//! Compression rewrites the source file in place and then renames it. A crash
//! between the truncate and the rename loses the original contents.

mod batch;
mod group;
mod ops;
#[cfg(test)]
mod tests;

pub use self::group::Batch;
use self::group::{WaitGroup, WorkerGuard};
use crate::dispose::DisposalHandle;
use logkeeper_compress::{CodecHandle, Zstd};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

/// Default bound on concurrently processed files.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Shared handle to the worker subsystem; cheap to clone.
#[derive(Clone)]
pub struct LifecycleEngine {
    inner: Arc<Inner>,
}

struct Inner {
    runtime: Handle,
    codec: CodecHandle,
    disposal: DisposalHandle,
    permits: Option<Arc<Semaphore>>,
    active: Arc<WaitGroup>,
    refresh: AtomicBool,
}

/// Configures a [`LifecycleEngine`].
pub struct EngineBuilder {
    codec: CodecHandle,
    disposal: DisposalHandle,
    max_workers: Option<usize>,
}
impl EngineBuilder {
    /// Replace the default Zstandard codec.
    pub fn codec(mut self, codec: CodecHandle) -> Self {
        self.codec = codec;
        self
    }

    /// Bound how many files are processed at once. `None` (or `Some(0)`)
    /// lets every file start immediately.
    pub fn max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers.filter(|n| *n > 0);
        self
    }

    /// Build an engine whose background tasks run on `runtime`.
    pub fn build(self, runtime: Handle) -> LifecycleEngine {
        LifecycleEngine {
            inner: Arc::new(Inner {
                runtime,
                codec: self.codec,
                disposal: self.disposal,
                permits: self.max_workers.map(|n| Arc::new(Semaphore::new(n))),
                active: Arc::new(WaitGroup::default()),
                refresh: AtomicBool::new(false),
            }),
        }
    }
}

impl LifecycleEngine {
    pub fn builder(disposal: DisposalHandle) -> EngineBuilder {
        EngineBuilder {
            codec: Arc::new(Zstd::default()),
            disposal,
            max_workers: Some(DEFAULT_MAX_WORKERS),
        }
    }

    /// `true` while any background task is queued or running.
    pub fn is_working(&self) -> bool {
        self.active_workers() > 0
    }

    /// Number of background tasks queued or running, coordinators included.
    pub fn active_workers(&self) -> usize {
        self.inner.active.count()
    }

    /// Returns `true` if the directory changed since the last call, and
    /// clears the flag.
    pub fn need_refresh(&self) -> bool {
        self.inner.refresh.swap(false, Ordering::AcqRel)
    }

    /// Wait until no background task is queued or running.
    pub async fn wait_idle(&self) {
        self.inner.active.wait().await;
    }

    fn mark_changed(&self) {
        self.inner.refresh.store(true, Ordering::Release);
    }

    /// Spawn a task that does file I/O, holding a worker permit while it runs.
    fn spawn_worker<F>(&self, batch: &Batch, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = WorkerGuard::new(&self.inner.active, batch);
        let permits = self.inner.permits.clone();
        self.inner.runtime.spawn(async move {
            let _guard = guard;
            // The semaphore is never closed, so acquiring can't fail.
            let _permit = match permits {
                Some(permits) => permits.acquire_owned().await.ok(),
                None => None,
            };
            task.await;
        });
    }

    /// Spawn a coordinating task on the blocking pool. Coordinators run the
    /// synchronous precondition checks and lock probes, then spawn workers.
    fn spawn_coordinator<F>(&self, batch: &Batch, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = WorkerGuard::new(&self.inner.active, batch);
        self.inner.runtime.spawn_blocking(move || {
            let _guard = guard;
            task();
        });
    }
}
