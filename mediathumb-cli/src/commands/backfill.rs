//! Backfill command: queue generation for assets missing a derivative and
//! wait for the background pool to finish.

use std::time::{Duration, Instant};

use mediathumb::background::BackfillKind;
use tracing::info;

use super::common::{wait_for_idle, BackfillTarget};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Upper bound on how long one backfill invocation waits for its tasks.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Run one backfill pass of `target`.
pub fn run(runner: &CliRunner, target: BackfillTarget, limit: Option<usize>) -> Result<(), CliError> {
    runner.log_startup("backfill");
    let service = runner.create_service()?;
    let kind = BackfillKind::from(target);

    let queued = match limit {
        Some(limit) => service.background().backfill_limited(kind, limit)?,
        None => service.backfill(kind)?,
    };

    if queued == 0 {
        println!("Nothing to backfill for {:?}.", target);
        return Ok(());
    }

    println!("Queued {} {:?} tasks, waiting for workers...", queued, target);
    let started = Instant::now();
    let drained = wait_for_idle(&service, DRAIN_TIMEOUT);
    let stats = service.pipeline().stats();
    info!(
        queued,
        drained,
        succeeded = stats.runs_succeeded,
        failed = stats.runs_failed,
        "Backfill finished"
    );

    println!(
        "Done in {:.1}s: {} succeeded, {} failed",
        started.elapsed().as_secs_f64(),
        stats.runs_succeeded,
        stats.runs_failed
    );
    if !drained {
        println!("Timed out with work still queued; remaining tasks were dropped.");
    }

    service.shutdown();
    Ok(())
}
