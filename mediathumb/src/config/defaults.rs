//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::aging::{
    DEFAULT_LCD_AGING_THRESHOLD, DEFAULT_LCD_GENERATE_THRESHOLD, DEFAULT_SCRATCH_MAX_AGE,
    DEFAULT_SCRATCH_PREFIX,
};
use crate::background::DEFAULT_QUERY_LIMIT;
use crate::encoder::DEFAULT_JPEG_QUALITY;
use crate::pipeline::DEFAULT_WAIT_TIMEOUT;
use crate::worker::{WorkerCategory, DEFAULT_IDLE_TIMEOUT};

/// Default JPEG quality of LCD derivatives.
pub const DEFAULT_LCD_QUALITY: u8 = DEFAULT_JPEG_QUALITY;
/// Default JPEG quality of THUMB derivatives.
pub const DEFAULT_THUMB_QUALITY: u8 = DEFAULT_JPEG_QUALITY;
/// Default SQLite page cache per database (16 MB).
pub const DEFAULT_SQLITE_CACHE_SIZE: usize = 16 * 1024 * 1024;
/// Default seconds between aging runs (1 hour).
pub const DEFAULT_AGING_INTERVAL_SECS: u64 = 60 * 60;

/// Default metadata database file name under the config directory.
pub const DEFAULT_DATABASE_NAME: &str = "media.db";
/// Default tiny-derivative database file name under the config directory.
pub const DEFAULT_KV_DATABASE_NAME: &str = "tiny.db";
/// Default log file name under the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "mediathumb.log";

/// Default media root: `~/Pictures`.
pub fn default_media_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Pictures")
}

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = config_directory();
        Self {
            storage: StorageSettings {
                root: default_media_root(),
                database: config_dir.join(DEFAULT_DATABASE_NAME),
                kv_database: Some(config_dir.join(DEFAULT_KV_DATABASE_NAME)),
                sqlite_cache_size: DEFAULT_SQLITE_CACHE_SIZE,
            },
            generation: GenerationSettings {
                lcd_quality: DEFAULT_LCD_QUALITY,
                thumb_quality: DEFAULT_THUMB_QUALITY,
                supports_compressed: true,
                wait_timeout_ms: DEFAULT_WAIT_TIMEOUT.as_millis() as u64,
            },
            workers: WorkerSettings {
                foreground_threads: WorkerCategory::Foreground.default_threads(),
                background_threads: WorkerCategory::Background.default_threads(),
                idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            },
            aging: AgingSettings {
                lcd_aging_threshold: DEFAULT_LCD_AGING_THRESHOLD,
                lcd_generate_threshold: DEFAULT_LCD_GENERATE_THRESHOLD,
                interval_secs: DEFAULT_AGING_INTERVAL_SECS,
                scratch_prefix: DEFAULT_SCRATCH_PREFIX.to_string(),
                scratch_max_age_secs: DEFAULT_SCRATCH_MAX_AGE.as_secs(),
            },
            background: BackgroundSettings {
                query_limit: DEFAULT_QUERY_LIMIT,
            },
            logging: LoggingSettings {
                file: config_dir.join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}
