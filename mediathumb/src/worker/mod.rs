//! Bounded thread pools with strict three-level priority.
//!
//! Two pools exist per service: a foreground pool for user-visible work and
//! a background pool for backfill. Threads are spawned lazily on the first
//! task and exit again after an idle period.

mod manager;
mod pool;

pub use manager::WorkerPoolManager;
pub use pool::{BatchHook, PoolConfig, WorkerPool};

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::derivative::BatchId;

/// Default idle period after which pool threads exit.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(270);

/// Queue a task is placed in. Higher priorities always run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TaskPriority {
    High,
    #[default]
    Mid,
    Low,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [TaskPriority::High, TaskPriority::Mid, TaskPriority::Low];
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::High => f.write_str("high"),
            TaskPriority::Mid => f.write_str("mid"),
            TaskPriority::Low => f.write_str("low"),
        }
    }
}

/// Which pool a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerCategory {
    Foreground,
    Background,
}

impl WorkerCategory {
    pub fn default_threads(self) -> usize {
        match self {
            WorkerCategory::Foreground => 4,
            WorkerCategory::Background => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WorkerCategory::Foreground => "fg",
            WorkerCategory::Background => "bg",
        }
    }
}

/// A unit of work moved into a pool queue.
pub trait PoolTask: Send + 'static {
    /// Batch this task counts towards, if any.
    fn batch_id(&self) -> Option<BatchId> {
        None
    }

    fn run(self);
}

/// Errors from pool operations.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker pool has been shut down")]
    ShutDown,

    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(#[from] std::io::Error),
}
