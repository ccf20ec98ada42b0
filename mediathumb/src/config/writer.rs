//! INI serialization: `ConfigFile` → commented `config.ini` text.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let kv_database = config
        .storage
        .kv_database
        .as_deref()
        .map(path_to_string)
        .unwrap_or_else(|| "none".to_string());

    format!(
        r#"[storage]
; Media root. Derivatives are written under <root>/.thumbs
root = {}
; Asset metadata database (SQLite)
database = {}
; Database holding MONTH_TINY and YEAR_TINY derivatives
; Set to 'none' to disable the tiny kinds
kv_database = {}
; SQLite page cache per database (default: 16MB)
; Supports: KB, MB, GB suffixes
sqlite_cache_size = {}

[generation]
; JPEG quality of LCD derivatives, 1-100 (default: 90)
lcd_quality = {}
; JPEG quality of THUMB derivatives, 1-100 (default: 90)
thumb_quality = {}
; Produce THUMB_COMPRESSED and the tiny kinds (default: true)
supports_compressed = {}
; Milliseconds a read waits for an in-flight generation (default: 1000)
wait_timeout_ms = {}

[workers]
; Threads serving user-visible requests (default: 4)
foreground_threads = {}
; Threads running backfill jobs (default: 2)
background_threads = {}
; Seconds an idle worker thread lingers before exiting (default: 270)
idle_timeout_secs = {}

[aging]
; LCD count above which the least recently viewed LCDs are removed (default: 10000)
lcd_aging_threshold = {}
; Background LCD generation stops at this count (default: 5000)
; Must not exceed lcd_aging_threshold
lcd_generate_threshold = {}
; Seconds between aging runs (default: 3600)
interval_secs = {}
; Scratch directories with this name prefix are removed on every run
scratch_prefix = {}
; Orphaned THM_EX directories older than this many seconds are removed (default: 86400)
scratch_max_age_secs = {}

[background]
; Assets fetched per backfill query (default: 500)
query_limit = {}

[logging]
; Log file path (default: ~/.mediathumb/mediathumb.log)
file = {}
"#,
        path_to_string(&config.storage.root),
        path_to_string(&config.storage.database),
        kv_database,
        format_size(config.storage.sqlite_cache_size),
        config.generation.lcd_quality,
        config.generation.thumb_quality,
        config.generation.supports_compressed,
        config.generation.wait_timeout_ms,
        config.workers.foreground_threads,
        config.workers.background_threads,
        config.workers.idle_timeout_secs,
        config.aging.lcd_aging_threshold,
        config.aging.lcd_generate_threshold,
        config.aging.interval_secs,
        config.aging.scratch_prefix,
        config.aging.scratch_max_age_secs,
        config.background.query_limit,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
pub(crate) fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
