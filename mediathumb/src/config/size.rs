//! Byte sizes written as "16MB", "512KB" or a bare byte count.

use thiserror::Error;

const UNITS: [(&str, usize); 3] = [("GB", 1 << 30), ("MB", 1 << 20), ("KB", 1 << 10)];

/// A size string that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{0}' - expected a byte count or a value like '16MB' or '512KB'")]
pub struct SizeParseError(String);

/// Parse a size into bytes.
///
/// Suffixes are case-insensitive and binary (`1KB` is 1024 bytes); the
/// trailing `B` may be dropped.
///
/// ```
/// use mediathumb::config::parse_size;
///
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert_eq!(parse_size("16mb").unwrap(), 16 * 1024 * 1024);
/// assert_eq!(parse_size("2 K").unwrap(), 2048);
/// ```
pub fn parse_size(input: &str) -> Result<usize, SizeParseError> {
    let err = || SizeParseError(input.to_string());
    let upper = input.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(err());
    }

    let (digits, multiplier) = UNITS
        .iter()
        .find_map(|&(unit, bytes)| {
            upper
                .strip_suffix(unit)
                .or_else(|| upper.strip_suffix(&unit[..1]))
                .map(|rest| (rest.trim_end(), bytes))
        })
        .unwrap_or((upper.as_str(), 1));

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    let value: usize = digits.parse().map_err(|_| err())?;
    value.checked_mul(multiplier).ok_or_else(err)
}

/// Format bytes using the largest unit that divides them exactly.
///
/// ```
/// use mediathumb::config::format_size;
///
/// assert_eq!(format_size(16 * 1024 * 1024), "16MB");
/// assert_eq!(format_size(1500), "1500");
/// ```
pub fn format_size(bytes: usize) -> String {
    UNITS
        .iter()
        .find(|&&(_, unit)| bytes >= unit && bytes % unit == 0)
        .map(|&(suffix, unit)| format!("{}{}", bytes / unit, suffix))
        .unwrap_or_else(|| bytes.to_string())
}
