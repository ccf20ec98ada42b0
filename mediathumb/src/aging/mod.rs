//! LCD aging and scratch cleanup.
//!
//! LCDs are the largest derivatives and are regenerated cheaply from the
//! original, so the engine bounds how many it keeps. When the LCD count
//! exceeds [`AgingPolicy::lcd_aging_threshold`], the least recently visited
//! LCDs are deleted until the count is back at the threshold. THUMB and the
//! compressed kinds are never aged.
//!
//! The same pass removes stale scratch directories left behind by
//! interrupted generations.
//!
//! # Usage
//!
//! ```ignore
//! use mediathumb::aging::{run_aging_daemon, AgingEvictionManager};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancellation = CancellationToken::new();
//! tokio::spawn(run_aging_daemon(manager, interval, cancellation.clone()));
//! ```

mod daemon;
mod manager;

pub use daemon::run_aging_daemon;
pub use manager::AgingEvictionManager;

use std::time::Duration;

/// Default LCD count above which aging starts.
pub const DEFAULT_LCD_AGING_THRESHOLD: u64 = 10_000;
/// Default LCD count below which background LCD generation runs.
pub const DEFAULT_LCD_GENERATE_THRESHOLD: u64 = 5_000;
/// Default name prefix of temporary scratch directories.
pub const DEFAULT_SCRATCH_PREFIX: &str = "beginTimeStamp";
/// Default age after which an orphaned THM_EX directory is removed.
pub const DEFAULT_SCRATCH_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Bounds applied by the aging job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgingPolicy {
    /// LCD count the job trims down to
    pub lcd_aging_threshold: u64,
    /// Background LCD backfill stops at this count
    pub lcd_generate_threshold: u64,
    /// Directories starting with this prefix are temporary scratch
    pub scratch_prefix: String,
    /// THM_EX directories older than this are orphans
    pub scratch_max_age: Duration,
}

impl Default for AgingPolicy {
    fn default() -> Self {
        Self {
            lcd_aging_threshold: DEFAULT_LCD_AGING_THRESHOLD,
            lcd_generate_threshold: DEFAULT_LCD_GENERATE_THRESHOLD,
            scratch_prefix: DEFAULT_SCRATCH_PREFIX.to_string(),
            scratch_max_age: DEFAULT_SCRATCH_MAX_AGE,
        }
    }
}

/// Result of one aging run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgingResult {
    /// LCD count when the run started
    pub lcd_count_before: u64,
    /// LCDs deleted and reset in metadata
    pub lcd_removed: usize,
    /// LCDs whose deletion or reset failed
    pub lcd_failed: usize,
    /// Candidates skipped because a generation held them
    pub skipped_in_flight: usize,
    pub scratch_dirs_removed: usize,
    /// Duration of the run in milliseconds
    pub duration_ms: u64,
}

impl AgingResult {
    /// Nothing was removed.
    pub fn is_noop(&self) -> bool {
        self.lcd_removed == 0 && self.scratch_dirs_removed == 0
    }
}
