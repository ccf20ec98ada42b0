//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;
use std::time::Duration;

use crate::aging::AgingPolicy;
use crate::worker::{PoolConfig, WorkerCategory};

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub storage: StorageSettings,
    pub generation: GenerationSettings,
    pub workers: WorkerSettings,
    pub aging: AgingSettings,
    pub background: BackgroundSettings,
    pub logging: LoggingSettings,
}

/// Where media and databases live.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    /// Media root; derivatives go under `<root>/.thumbs`
    pub root: PathBuf,
    /// Asset metadata database
    pub database: PathBuf,
    /// Tiny-derivative database. `None` disables MONTH_TINY and YEAR_TINY.
    pub kv_database: Option<PathBuf>,
    /// SQLite page cache per database, in bytes
    pub sqlite_cache_size: usize,
}

/// Encoder and read-path settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// JPEG quality of LCD (1-100)
    pub lcd_quality: u8,
    /// JPEG quality of THUMB (1-100)
    pub thumb_quality: u8,
    /// Produce THUMB_COMPRESSED and the tiny kinds
    pub supports_compressed: bool,
    /// How long a read waits for an in-flight generation
    pub wait_timeout_ms: u64,
}

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub foreground_threads: usize,
    pub background_threads: usize,
    /// Idle workers exit after this many seconds
    pub idle_timeout_secs: u64,
}

/// LCD aging and scratch cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct AgingSettings {
    pub lcd_aging_threshold: u64,
    pub lcd_generate_threshold: u64,
    /// Seconds between aging runs of the daemon
    pub interval_secs: u64,
    pub scratch_prefix: String,
    /// Orphaned THM_EX directories older than this (seconds) are removed
    pub scratch_max_age_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundSettings {
    /// Rows fetched per backfill query
    pub query_limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Aging policy described by `[aging]`.
    pub fn aging_policy(&self) -> AgingPolicy {
        AgingPolicy {
            lcd_aging_threshold: self.aging.lcd_aging_threshold,
            lcd_generate_threshold: self.aging.lcd_generate_threshold,
            scratch_prefix: self.aging.scratch_prefix.clone(),
            scratch_max_age: Duration::from_secs(self.aging.scratch_max_age_secs),
        }
    }

    /// Pool configuration for `category` described by `[workers]`.
    pub fn pool_config(&self, category: WorkerCategory) -> PoolConfig {
        let threads = match category {
            WorkerCategory::Foreground => self.workers.foreground_threads,
            WorkerCategory::Background => self.workers.background_threads,
        };
        PoolConfig::for_category(category)
            .with_threads(threads)
            .with_idle_timeout(Duration::from_secs(self.workers.idle_timeout_secs))
    }

    pub fn aging_interval(&self) -> Duration {
        Duration::from_secs(self.aging.interval_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.generation.wait_timeout_ms)
    }
}
