use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AgingEvictionManager, AgingResult};

/// Run the aging job periodically until cancelled.
///
/// Runs once at startup, then every `interval`. Each pass runs on the
/// blocking pool since it touches the filesystem and the metadata store.
pub async fn run_aging_daemon(
    manager: Arc<AgingEvictionManager>,
    interval: Duration,
    cancellation: CancellationToken,
) {
    info!(
        interval_secs = interval.as_secs(),
        threshold = manager.policy().lcd_aging_threshold,
        "Starting aging daemon"
    );

    run_once(&manager).await;

    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                info!("Aging daemon shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                run_once(&manager).await;
            }
        }
    }
}

async fn run_once(manager: &Arc<AgingEvictionManager>) -> Option<AgingResult> {
    let manager = Arc::clone(manager);
    match tokio::task::spawn_blocking(move || manager.run()).await {
        Ok(Ok(result)) => {
            log_aging_result(&result);
            Some(result)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Aging run failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "Aging task panicked");
            None
        }
    }
}

fn log_aging_result(result: &AgingResult) {
    if result.is_noop() && result.lcd_failed == 0 {
        debug!(lcd_count = result.lcd_count_before, "Aging run found nothing to remove");
        return;
    }
    info!(
        lcd_count_before = result.lcd_count_before,
        lcd_removed = result.lcd_removed,
        lcd_failed = result.lcd_failed,
        skipped_in_flight = result.skipped_in_flight,
        scratch_dirs_removed = result.scratch_dirs_removed,
        duration_ms = result.duration_ms,
        "Aging run complete"
    );
}
