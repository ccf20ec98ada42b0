//! INI parsing: `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names map to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = non_empty(section, "root") {
            config.storage.root = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "database") {
            config.storage.database = expand_tilde(v);
        }
        if let Some(v) = section.get("kv_database") {
            let v = v.trim();
            config.storage.kv_database = match v.to_lowercase().as_str() {
                "" | "none" | "off" => None,
                _ => Some(expand_tilde(v)),
            };
        }
        if let Some(v) = section.get("sqlite_cache_size") {
            config.storage.sqlite_cache_size = parse_size(v).map_err(|_| {
                invalid(
                    "storage",
                    "sqlite_cache_size",
                    v,
                    "expected a size like '16MB' or '512KB'",
                )
            })?;
        }
    }

    if let Some(section) = ini.section(Some("generation")) {
        if let Some(v) = section.get("lcd_quality") {
            config.generation.lcd_quality = parse_quality("lcd_quality", v)?;
        }
        if let Some(v) = section.get("thumb_quality") {
            config.generation.thumb_quality = parse_quality("thumb_quality", v)?;
        }
        if let Some(v) = section.get("supports_compressed") {
            config.generation.supports_compressed = parse_bool(v);
        }
        if let Some(v) = section.get("wait_timeout_ms") {
            config.generation.wait_timeout_ms =
                parse_number("generation", "wait_timeout_ms", v, "must be a non-negative integer (milliseconds)")?;
        }
    }

    if let Some(section) = ini.section(Some("workers")) {
        if let Some(v) = section.get("foreground_threads") {
            config.workers.foreground_threads = parse_threads("foreground_threads", v)?;
        }
        if let Some(v) = section.get("background_threads") {
            config.workers.background_threads = parse_threads("background_threads", v)?;
        }
        if let Some(v) = section.get("idle_timeout_secs") {
            let secs: u64 = parse_number("workers", "idle_timeout_secs", v, "must be a positive integer (seconds)")?;
            if secs == 0 {
                return Err(invalid("workers", "idle_timeout_secs", v, "must be a positive integer (seconds)"));
            }
            config.workers.idle_timeout_secs = secs;
        }
    }

    if let Some(section) = ini.section(Some("aging")) {
        if let Some(v) = section.get("lcd_aging_threshold") {
            config.aging.lcd_aging_threshold =
                parse_number("aging", "lcd_aging_threshold", v, "must be a non-negative integer")?;
        }
        if let Some(v) = section.get("lcd_generate_threshold") {
            config.aging.lcd_generate_threshold =
                parse_number("aging", "lcd_generate_threshold", v, "must be a non-negative integer")?;
        }
        if let Some(v) = section.get("interval_secs") {
            let secs: u64 = parse_number("aging", "interval_secs", v, "must be a positive integer (seconds)")?;
            if secs == 0 {
                return Err(invalid("aging", "interval_secs", v, "must be a positive integer (seconds)"));
            }
            config.aging.interval_secs = secs;
        }
        if let Some(v) = non_empty(section, "scratch_prefix") {
            config.aging.scratch_prefix = v.to_string();
        }
        if let Some(v) = section.get("scratch_max_age_secs") {
            config.aging.scratch_max_age_secs =
                parse_number("aging", "scratch_max_age_secs", v, "must be a non-negative integer (seconds)")?;
        }
    }

    if let Some(section) = ini.section(Some("background")) {
        if let Some(v) = section.get("query_limit") {
            config.background.query_limit =
                parse_number("background", "query_limit", v, "must be a non-negative integer")?;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = expand_tilde(v);
        }
    }

    // Background generation must stop below the point where aging starts
    if config.aging.lcd_generate_threshold > config.aging.lcd_aging_threshold {
        return Err(invalid(
            "aging",
            "lcd_generate_threshold",
            &config.aging.lcd_generate_threshold.to_string(),
            "must not exceed lcd_aging_threshold",
        ));
    }

    Ok(config)
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value.trim().parse().map_err(|_| invalid(section, key, value, reason))
}

fn parse_quality(key: &str, value: &str) -> Result<u8, ConfigFileError> {
    const REASON: &str = "must be an integer between 1 and 100";
    let quality: u8 = parse_number("generation", key, value, REASON)?;
    if !(1..=100).contains(&quality) {
        return Err(invalid("generation", key, value, REASON));
    }
    Ok(quality)
}

fn parse_threads(key: &str, value: &str) -> Result<usize, ConfigFileError> {
    const REASON: &str = "must be a positive integer";
    let threads: usize = parse_number("workers", key, value, REASON)?;
    if threads == 0 {
        return Err(invalid("workers", key, value, REASON));
    }
    Ok(threads)
}

/// Parse a boolean value from a config string.
///
/// Accepts "true", "1", "yes", "on" (case-insensitive) as true.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = load(
            r#"
[generation]
lcd_quality = 70

[workers]
background_threads = 1
"#,
        )
        .unwrap();

        assert_eq!(config.generation.lcd_quality, 70);
        assert_eq!(config.generation.thumb_quality, DEFAULT_THUMB_QUALITY);
        assert_eq!(config.workers.background_threads, 1);
        assert_eq!(config.workers.foreground_threads, 4);
        assert_eq!(config.aging.interval_secs, DEFAULT_AGING_INTERVAL_SECS);
    }

    #[test]
    fn test_storage_section() {
        let config = load(
            r#"
[storage]
root = /srv/photos
database = /var/lib/mediathumb/media.db
kv_database = none
sqlite_cache_size = 64MB
"#,
        )
        .unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/srv/photos"));
        assert_eq!(
            config.storage.database,
            PathBuf::from("/var/lib/mediathumb/media.db")
        );
        assert_eq!(config.storage.kv_database, None);
        assert_eq!(config.storage.sqlite_cache_size, 64 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_quality() {
        let err = load("[generation]\nthumb_quality = 0\n").unwrap_err();
        assert!(err.to_string().contains("thumb_quality"));
        assert!(err.to_string().contains("between 1 and 100"));

        assert!(load("[generation]\nlcd_quality = 101\n").is_err());
        assert!(load("[generation]\nlcd_quality = high\n").is_err());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = load("[workers]\nforeground_threads = 0\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { ref key, .. } if key == "foreground_threads"));
    }

    #[test]
    fn test_invalid_cache_size() {
        let err = load("[storage]\nsqlite_cache_size = lots\n").unwrap_err();
        assert!(err.to_string().contains("sqlite_cache_size"));
    }

    #[test]
    fn test_generate_threshold_above_aging_threshold() {
        let err = load(
            r#"
[aging]
lcd_aging_threshold = 100
lcd_generate_threshold = 200
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must not exceed lcd_aging_threshold"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(load("[aging]\ninterval_secs = 0\n").is_err());
        assert!(load("[workers]\nidle_timeout_secs = 0\n").is_err());
        let config = load("[workers]\nidle_timeout_secs = 5\n").unwrap();
        assert_eq!(config.workers.idle_timeout_secs, 5);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = load("[storage]\ncolour = blue\n[extra]\nkey = value\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/Pictures");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("Pictures"));

        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_parse_bool() {
        for v in ["true", "TRUE", "1", "yes", "On", " true "] {
            assert!(parse_bool(v), "{:?}", v);
        }
        for v in ["false", "0", "no", "off", "", "maybe"] {
            assert!(!parse_bool(v), "{:?}", v);
        }
    }
}
