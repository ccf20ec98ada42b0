//! Backfill jobs: find assets lacking a derivative and queue its generation.
//!
//! Each job runs one bounded metadata query and enqueues one task per row
//! on the background pool at low priority. Jobs are cheap to re-run; rows
//! that were generated in the meantime drop out of the next query.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::derivative::{AssetDerivativeRequest, BatchId, DerivativeKind};
use crate::metadata::{MetadataError, MetadataStore};
use crate::pipeline::{GenerateAction, GenerateTask, GenerationPipeline};
use crate::worker::{TaskPriority, WorkerCategory, WorkerError, WorkerPoolManager};

/// Default number of rows a single backfill query returns.
pub const DEFAULT_QUERY_LIMIT: usize = 500;

/// Errors from a backfill job.
#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("backfill query failed: {0}")]
    Metadata(#[from] MetadataError),

    #[error("failed to queue task: {0}")]
    Worker(#[from] WorkerError),
}

/// Which backfill to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillKind {
    /// Assets without a THUMB
    Thumb,
    /// Assets without an LCD, up to the generate threshold
    Lcd,
    /// Ready photos without the compressed and tiny kinds
    Compressed,
}

impl BackfillKind {
    fn action(self) -> GenerateAction {
        match self {
            BackfillKind::Thumb => GenerateAction::Thumb,
            BackfillKind::Lcd => GenerateAction::Lcd,
            BackfillKind::Compressed => GenerateAction::Compressed,
        }
    }

    fn lacking(self) -> DerivativeKind {
        match self {
            BackfillKind::Thumb => DerivativeKind::Thumb,
            BackfillKind::Lcd => DerivativeKind::Lcd,
            BackfillKind::Compressed => DerivativeKind::ThumbCompressed,
        }
    }
}

/// Enqueues pipeline work for assets that are missing derivatives.
pub struct BackgroundJobs {
    pipeline: Arc<GenerationPipeline>,
    pools: Arc<WorkerPoolManager<GenerateTask>>,
    query_limit: usize,
    lcd_generate_threshold: u64,
}

impl BackgroundJobs {
    pub fn new(
        pipeline: Arc<GenerationPipeline>,
        pools: Arc<WorkerPoolManager<GenerateTask>>,
        query_limit: usize,
        lcd_generate_threshold: u64,
    ) -> Self {
        Self {
            pipeline,
            pools,
            query_limit,
            lcd_generate_threshold,
        }
    }

    fn metadata(&self) -> &Arc<dyn MetadataStore> {
        self.pipeline.metadata()
    }

    /// Run one backfill pass. Returns the number of tasks queued.
    pub fn backfill(&self, kind: BackfillKind) -> Result<usize, BackgroundError> {
        self.backfill_limited(kind, self.query_limit)
    }

    /// Like [`backfill`](Self::backfill), with an explicit row limit. The LCD
    /// generate threshold still caps an LCD pass.
    pub fn backfill_limited(&self, kind: BackfillKind, limit: usize) -> Result<usize, BackgroundError> {
        let limit = match kind {
            BackfillKind::Lcd => limit.min(self.lcd_budget()?),
            BackfillKind::Compressed if !self.pipeline.supports_compressed() => 0,
            _ => limit,
        };
        if limit == 0 {
            debug!(kind = ?kind, "Backfill has no budget");
            return Ok(0);
        }
        let rows = self.metadata().lacking(kind.lacking(), limit)?;
        let mut queued = 0;
        for record in rows {
            let request = record.to_request().with_priority(TaskPriority::Low);
            self.submit(kind.action(), request, WorkerCategory::Background)?;
            queued += 1;
        }
        info!(kind = ?kind, queued, "Backfill queued");
        Ok(queued)
    }

    /// Number of LCDs background generation may still add.
    fn lcd_budget(&self) -> Result<usize, BackgroundError> {
        let count = self.metadata().lcd_count()?;
        Ok(self.lcd_generate_threshold.saturating_sub(count) as usize)
    }

    /// Queue compressed generation for a caller-supplied set of assets.
    ///
    /// Every task carries `batch_id` and runs on the foreground pool; the
    /// batch-drained hook fires once the last of them finishes.
    pub fn generate_batch(
        &self,
        requests: Vec<AssetDerivativeRequest>,
        batch_id: BatchId,
    ) -> Result<usize, BackgroundError> {
        let tasks = requests.into_iter().map(|request| {
            GenerateTask::new(
                Arc::clone(&self.pipeline),
                GenerateAction::Compressed,
                request.with_batch(batch_id),
            )
        });
        let count = self
            .pools
            .pool(WorkerCategory::Foreground)
            .add_tasks(tasks, TaskPriority::Mid)?;
        debug!(batch_id, count, "Batch queued");
        Ok(count)
    }

    /// Drop queued tasks of a batch from both pools.
    pub fn cancel_batch(&self, batch_id: BatchId) {
        for category in [WorkerCategory::Foreground, WorkerCategory::Background] {
            self.pools.pool(category).ignore_tasks_for_batch(batch_id);
        }
    }

    /// Queue one pipeline call.
    pub fn submit(
        &self,
        action: GenerateAction,
        request: AssetDerivativeRequest,
        category: WorkerCategory,
    ) -> Result<(), BackgroundError> {
        let priority = request.priority;
        let task = GenerateTask::new(Arc::clone(&self.pipeline), action, request);
        self.pools.pool(category).add_task(task, priority)?;
        Ok(())
    }
}
