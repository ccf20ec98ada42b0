//! Owner of the foreground and background pools.

use std::sync::Arc;

use tracing::info;

use super::{BatchHook, PoolConfig, PoolTask, WorkerCategory, WorkerPool};

/// Holds one pool per [`WorkerCategory`].
pub struct WorkerPoolManager<T: PoolTask> {
    foreground: Arc<WorkerPool<T>>,
    background: Arc<WorkerPool<T>>,
}

impl<T: PoolTask> WorkerPoolManager<T> {
    pub fn new(foreground: PoolConfig, background: PoolConfig) -> Self {
        Self {
            foreground: Arc::new(WorkerPool::new(foreground)),
            background: Arc::new(WorkerPool::new(background)),
        }
    }

    /// Pools that both report drained batches to `hook`.
    pub fn with_batch_hook(foreground: PoolConfig, background: PoolConfig, hook: BatchHook) -> Self {
        Self {
            foreground: Arc::new(WorkerPool::with_batch_hook(foreground, Arc::clone(&hook))),
            background: Arc::new(WorkerPool::with_batch_hook(background, hook)),
        }
    }

    pub fn pool(&self, category: WorkerCategory) -> &Arc<WorkerPool<T>> {
        match category {
            WorkerCategory::Foreground => &self.foreground,
            WorkerCategory::Background => &self.background,
        }
    }

    /// Total queued tasks across both pools.
    pub fn queued_len(&self) -> usize {
        self.foreground.queued_len() + self.background.queued_len()
    }

    pub fn is_idle(&self) -> bool {
        self.foreground.is_idle() && self.background.is_idle()
    }

    /// Stop both pools and join their threads.
    pub fn shutdown(&self) {
        self.foreground.shutdown();
        self.background.shutdown();
        info!("Worker pools stopped");
    }
}

impl<T: PoolTask> Default for WorkerPoolManager<T> {
    fn default() -> Self {
        Self::new(
            PoolConfig::for_category(WorkerCategory::Foreground),
            PoolConfig::for_category(WorkerCategory::Background),
        )
    }
}
