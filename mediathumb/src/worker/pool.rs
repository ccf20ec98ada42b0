//! Priority worker pool.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace};

use crate::derivative::BatchId;

use super::{PoolTask, TaskPriority, WorkerCategory, WorkerError, DEFAULT_IDLE_TIMEOUT};

/// Called with a batch id once its last task has finished.
pub type BatchHook = Arc<dyn Fn(BatchId) + Send + Sync>;

/// Configuration for one pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Thread name prefix
    pub name: String,
    /// Maximum number of worker threads
    pub threads: usize,
    /// Idle period after which workers exit
    pub idle_timeout: Duration,
}

impl PoolConfig {
    pub fn for_category(category: WorkerCategory) -> Self {
        Self {
            name: format!("mediathumb-{}", category.name()),
            threads: category.default_threads(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

struct Queues<T> {
    high: VecDeque<T>,
    mid: VecDeque<T>,
    low: VecDeque<T>,
    /// Batches whose queued tasks are skipped
    ignored: HashSet<BatchId>,
    /// Queued + running tasks per batch
    batches: HashMap<BatchId, usize>,
    running: usize,
    workers: usize,
    shutdown: bool,
}

impl<T: PoolTask> Queues<T> {
    fn new() -> Self {
        Self {
            high: VecDeque::new(),
            mid: VecDeque::new(),
            low: VecDeque::new(),
            ignored: HashSet::new(),
            batches: HashMap::new(),
            running: 0,
            workers: 0,
            shutdown: false,
        }
    }

    fn queue_mut(&mut self, priority: TaskPriority) -> &mut VecDeque<T> {
        match priority {
            TaskPriority::High => &mut self.high,
            TaskPriority::Mid => &mut self.mid,
            TaskPriority::Low => &mut self.low,
        }
    }

    fn queued_len(&self) -> usize {
        self.high.len() + self.mid.len() + self.low.len()
    }

    fn pop_front(&mut self) -> Option<T> {
        self.high
            .pop_front()
            .or_else(|| self.mid.pop_front())
            .or_else(|| self.low.pop_front())
    }

    /// Next runnable task, dropping tasks of ignored batches.
    fn next_task(&mut self) -> Option<T> {
        while let Some(task) = self.pop_front() {
            match task.batch_id() {
                Some(batch) if self.ignored.contains(&batch) => {
                    trace!(batch, "Skipping task of ignored batch");
                    self.forget_one(batch);
                }
                _ => return Some(task),
            }
        }
        None
    }

    /// Decrement a batch counter without reporting completion.
    fn forget_one(&mut self, batch: BatchId) {
        if let Some(count) = self.batches.get_mut(&batch) {
            *count -= 1;
            if *count == 0 {
                self.batches.remove(&batch);
            }
        }
    }

    /// Decrement a batch counter; returns the batch if it just drained.
    fn finish_one(&mut self, batch: BatchId) -> Option<BatchId> {
        let count = self.batches.get_mut(&batch)?;
        *count -= 1;
        if *count == 0 {
            self.batches.remove(&batch);
            Some(batch)
        } else {
            None
        }
    }
}

struct Shared<T> {
    queues: Mutex<Queues<T>>,
    cond: Condvar,
    config: PoolConfig,
    on_batch_drained: Option<BatchHook>,
}

/// Bounded thread pool with High/Mid/Low FIFO queues.
///
/// Threads are spawned on demand up to `threads`. A worker that stays idle
/// for `idle_timeout` while every queue is empty and no task is running
/// exits; the next [`WorkerPool::add_task`] spawns workers again.
pub struct WorkerPool<T: PoolTask> {
    shared: Arc<Shared<T>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: PoolTask> WorkerPool<T> {
    pub fn new(config: PoolConfig) -> Self {
        Self::build(config, None)
    }

    /// Pool that reports drained batches to `hook`.
    pub fn with_batch_hook(config: PoolConfig, hook: BatchHook) -> Self {
        Self::build(config, Some(hook))
    }

    fn build(config: PoolConfig, on_batch_drained: Option<BatchHook>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queues: Mutex::new(Queues::new()),
                cond: Condvar::new(),
                config,
                on_batch_drained,
            }),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Spawn workers up to the configured count. Idempotent.
    pub fn init(&self) -> Result<(), WorkerError> {
        let mut handles = self.handles.lock();
        Self::reap(&mut handles);

        loop {
            let index = {
                let mut queues = self.shared.queues.lock();
                if queues.shutdown {
                    return Err(WorkerError::ShutDown);
                }
                if queues.workers >= self.shared.config.threads {
                    return Ok(());
                }
                queues.workers += 1;
                queues.workers
            };

            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", self.shared.config.name, index))
                .spawn(move || worker_loop(shared));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.shared.queues.lock().workers -= 1;
                    error!(pool = %self.shared.config.name, error = %e, "Failed to spawn worker");
                    return Err(WorkerError::SpawnFailed(e));
                }
            }
            debug!(pool = %self.shared.config.name, worker = index, "Spawned worker");
        }
    }

    fn reap(handles: &mut Vec<JoinHandle<()>>) {
        let (finished, alive): (Vec<_>, Vec<_>) =
            handles.drain(..).partition(|h| h.is_finished());
        *handles = alive;
        for handle in finished {
            let _ = handle.join();
        }
    }

    /// Queue a task and wake one worker.
    pub fn add_task(&self, task: T, priority: TaskPriority) -> Result<(), WorkerError> {
        {
            let mut queues = self.shared.queues.lock();
            if queues.shutdown {
                return Err(WorkerError::ShutDown);
            }
            if let Some(batch) = task.batch_id() {
                *queues.batches.entry(batch).or_insert(0) += 1;
            }
            queues.queue_mut(priority).push_back(task);
        }
        self.shared.cond.notify_one();
        self.init()
    }

    /// Queue several tasks under one lock, so a batch cannot drain before
    /// all of its tasks are queued. Returns how many were queued.
    pub fn add_tasks(
        &self,
        tasks: impl IntoIterator<Item = T>,
        priority: TaskPriority,
    ) -> Result<usize, WorkerError> {
        let count = {
            let mut queues = self.shared.queues.lock();
            if queues.shutdown {
                return Err(WorkerError::ShutDown);
            }
            let mut count = 0;
            for task in tasks {
                if let Some(batch) = task.batch_id() {
                    *queues.batches.entry(batch).or_insert(0) += 1;
                }
                queues.queue_mut(priority).push_back(task);
                count += 1;
            }
            count
        };
        self.shared.cond.notify_all();
        self.init()?;
        Ok(count)
    }

    /// Skip every queued task of `batch`. Running tasks finish normally and
    /// no drained notification is sent for the batch.
    pub fn ignore_tasks_for_batch(&self, batch: BatchId) {
        let mut queues = self.shared.queues.lock();
        queues.ignored.insert(batch);
        queues.batches.remove(&batch);
        debug!(pool = %self.shared.config.name, batch, "Ignoring batch");
    }

    /// Drop every queued task of one priority. Returns how many were removed.
    pub fn clear_queue(&self, priority: TaskPriority) -> usize {
        let mut queues = self.shared.queues.lock();
        let removed: Vec<T> = queues.queue_mut(priority).drain(..).collect();
        for task in &removed {
            if let Some(batch) = task.batch_id() {
                queues.forget_one(batch);
            }
        }
        removed.len()
    }

    pub fn queued_len(&self) -> usize {
        self.shared.queues.lock().queued_len()
    }

    /// Live worker threads.
    pub fn thread_count(&self) -> usize {
        self.shared.queues.lock().workers
    }

    pub fn running_count(&self) -> usize {
        self.shared.queues.lock().running
    }

    /// Nothing queued and nothing running.
    pub fn is_idle(&self) -> bool {
        let queues = self.shared.queues.lock();
        queues.queued_len() == 0 && queues.running == 0
    }

    /// Stop all workers. Queued tasks are dropped; running tasks finish.
    pub fn shutdown(&self) {
        let dropped = {
            let mut queues = self.shared.queues.lock();
            if queues.shutdown {
                0
            } else {
                queues.shutdown = true;
                let dropped = queues.queued_len();
                queues.high.clear();
                queues.mid.clear();
                queues.low.clear();
                queues.batches.clear();
                dropped
            }
        };
        self.shared.cond.notify_all();

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        let joined = handles.len();
        for handle in handles {
            let _ = handle.join();
        }
        if joined > 0 || dropped > 0 {
            info!(pool = %self.shared.config.name, joined, dropped, "Worker pool shut down");
        }
    }
}

impl<T: PoolTask> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<T: PoolTask>(shared: Arc<Shared<T>>) {
    let idle_timeout = shared.config.idle_timeout;
    loop {
        let task = {
            let mut queues = shared.queues.lock();
            loop {
                if queues.shutdown {
                    queues.workers -= 1;
                    return;
                }
                if let Some(task) = queues.next_task() {
                    queues.running += 1;
                    break task;
                }
                if queues.running == 0 {
                    queues.ignored.clear();
                }
                let timed_out = shared.cond.wait_for(&mut queues, idle_timeout).timed_out();
                if timed_out && queues.queued_len() == 0 && queues.running == 0 {
                    queues.workers -= 1;
                    debug!(pool = %shared.config.name, "Worker idle, exiting");
                    return;
                }
            }
        };

        let batch = task.batch_id();
        if panic::catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
            error!(pool = %shared.config.name, "Worker task panicked");
        }

        let drained = {
            let mut queues = shared.queues.lock();
            queues.running -= 1;
            batch.and_then(|b| queues.finish_one(b))
        };
        if let (Some(batch), Some(hook)) = (drained, shared.on_batch_drained.as_ref()) {
            debug!(pool = %shared.config.name, batch, "Batch drained");
            hook(batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    struct TestTask {
        batch: Option<BatchId>,
        work: Box<dyn FnOnce() + Send>,
    }

    impl TestTask {
        fn new(work: impl FnOnce() + Send + 'static) -> Self {
            Self {
                batch: None,
                work: Box::new(work),
            }
        }

        fn in_batch(mut self, batch: BatchId) -> Self {
            self.batch = Some(batch);
            self
        }
    }

    impl PoolTask for TestTask {
        fn batch_id(&self) -> Option<BatchId> {
            self.batch
        }

        fn run(self) {
            (self.work)()
        }
    }

    fn single_worker() -> PoolConfig {
        PoolConfig::for_category(WorkerCategory::Foreground).with_threads(1)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Occupy the single worker until the returned sender is used.
    fn block_worker(pool: &WorkerPool<TestTask>) -> mpsc::Sender<()> {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        pool.add_task(
            TestTask::new(move || {
                let _ = release_rx.recv();
            }),
            TaskPriority::High,
        )
        .unwrap();
        wait_until(|| pool.running_count() == 1);
        release_tx
    }

    #[test]
    fn test_strict_priority_on_single_worker() {
        let pool = WorkerPool::new(single_worker());
        let release = block_worker(&pool);

        let order = Arc::new(Mutex::new(Vec::new()));
        for round in 0..3 {
            for priority in [TaskPriority::Low, TaskPriority::Mid, TaskPriority::High] {
                let order = Arc::clone(&order);
                pool.add_task(
                    TestTask::new(move || order.lock().push((priority, round))),
                    priority,
                )
                .unwrap();
            }
        }
        release.send(()).unwrap();
        wait_until(|| order.lock().len() == 9);

        let priorities: Vec<TaskPriority> = order.lock().iter().map(|(p, _)| *p).collect();
        assert_eq!(
            priorities,
            vec![
                TaskPriority::High,
                TaskPriority::High,
                TaskPriority::High,
                TaskPriority::Mid,
                TaskPriority::Mid,
                TaskPriority::Mid,
                TaskPriority::Low,
                TaskPriority::Low,
                TaskPriority::Low,
            ]
        );
        // FIFO within one priority
        let high_rounds: Vec<i32> = order.lock()[..3].iter().map(|(_, r)| *r).collect();
        assert_eq!(high_rounds, vec![0, 1, 2]);
    }

    #[test]
    fn test_lazy_spawn_and_idempotent_init() {
        let pool: WorkerPool<TestTask> = WorkerPool::new(
            PoolConfig::for_category(WorkerCategory::Background).with_threads(2),
        );
        assert_eq!(pool.thread_count(), 0);
        pool.init().unwrap();
        pool.init().unwrap();
        assert_eq!(pool.thread_count(), 2);
    }

    #[test]
    fn test_idle_workers_exit_and_respawn() {
        let pool = WorkerPool::new(single_worker().with_idle_timeout(Duration::from_millis(50)));
        let (tx, rx) = mpsc::channel();
        let first = tx.clone();
        pool.add_task(TestTask::new(move || first.send(1).unwrap()), TaskPriority::Mid)
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);

        wait_until(|| pool.thread_count() == 0);

        pool.add_task(TestTask::new(move || tx.send(2).unwrap()), TaskPriority::Mid)
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
    }

    #[test]
    fn test_ignored_batch_is_skipped_without_drained_hook() {
        let drained = Arc::new(Mutex::new(Vec::new()));
        let hook: BatchHook = {
            let drained = Arc::clone(&drained);
            Arc::new(move |batch: BatchId| drained.lock().push(batch))
        };
        let pool = WorkerPool::with_batch_hook(single_worker(), hook);
        let release = block_worker(&pool);

        let ran = Arc::new(Mutex::new(Vec::new()));
        for (batch, value) in [(7, "a"), (8, "b"), (7, "c")] {
            let ran = Arc::clone(&ran);
            pool.add_task(
                TestTask::new(move || ran.lock().push(value)).in_batch(batch),
                TaskPriority::Mid,
            )
            .unwrap();
        }
        pool.ignore_tasks_for_batch(7);
        release.send(()).unwrap();

        wait_until(|| drained.lock().len() == 1 && pool.queued_len() == 0);
        assert_eq!(*ran.lock(), vec!["b"]);
        assert_eq!(*drained.lock(), vec![8]);
    }

    #[test]
    fn test_batch_hook_fires_once_after_last_task() {
        let drained = Arc::new(Mutex::new(Vec::new()));
        let hook: BatchHook = {
            let drained = Arc::clone(&drained);
            Arc::new(move |batch: BatchId| drained.lock().push(batch))
        };
        let pool = WorkerPool::with_batch_hook(
            PoolConfig::for_category(WorkerCategory::Foreground),
            hook,
        );
        let queued = pool
            .add_tasks((0..5).map(|_| TestTask::new(|| {}).in_batch(3)), TaskPriority::Low)
            .unwrap();
        assert_eq!(queued, 5);
        wait_until(|| !drained.lock().is_empty());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(*drained.lock(), vec![3]);
    }

    #[test]
    fn test_clear_queue() {
        let pool = WorkerPool::new(single_worker());
        let release = block_worker(&pool);
        for _ in 0..3 {
            pool.add_task(TestTask::new(|| {}), TaskPriority::Low).unwrap();
        }
        pool.add_task(TestTask::new(|| {}), TaskPriority::High).unwrap();

        assert_eq!(pool.clear_queue(TaskPriority::Low), 3);
        assert_eq!(pool.queued_len(), 1);
        release.send(()).unwrap();
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(single_worker());
        pool.add_task(TestTask::new(|| panic!("boom")), TaskPriority::High)
            .unwrap();
        let (tx, rx) = mpsc::channel();
        pool.add_task(TestTask::new(move || tx.send(()).unwrap()), TaskPriority::High)
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(pool.thread_count(), 1);
    }

    #[test]
    fn test_add_after_shutdown_fails() {
        let pool = WorkerPool::new(single_worker());
        pool.shutdown();
        assert!(matches!(
            pool.add_task(TestTask::new(|| {}), TaskPriority::Mid),
            Err(WorkerError::ShutDown)
        ));
    }
}
