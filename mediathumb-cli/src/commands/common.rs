//! Common types and utilities shared across CLI commands.

use std::thread;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use mediathumb::background::BackfillKind;
use mediathumb::service::ThumbnailService;

/// Derivative selection for `generate`.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum GenerateKind {
    /// Screen-sized LCD only
    Lcd,
    /// THUMB, plus the compressed and tiny kinds when enabled
    Thumb,
    /// Compressed kinds from an existing THUMB
    Astc,
    /// LCD and the full THUMB set from one decode
    All,
}

/// Derivative selection for `backfill`.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum BackfillTarget {
    /// Assets whose THUMB is pending or failed
    Thumb,
    /// Assets without an LCD, up to the generate threshold
    Lcd,
    /// Ready photos missing the compressed kinds
    Astc,
}

impl From<BackfillTarget> for BackfillKind {
    fn from(target: BackfillTarget) -> Self {
        match target {
            BackfillTarget::Thumb => BackfillKind::Thumb,
            BackfillTarget::Lcd => BackfillKind::Lcd,
            BackfillTarget::Astc => BackfillKind::Compressed,
        }
    }
}

/// Block until both worker pools are idle or `timeout` passes.
///
/// Returns whether the pools drained.
pub fn wait_for_idle(service: &ThumbnailService, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !service.pools().is_idle() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(100));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backfill_target_mapping() {
        assert_eq!(BackfillKind::from(BackfillTarget::Thumb), BackfillKind::Thumb);
        assert_eq!(BackfillKind::from(BackfillTarget::Lcd), BackfillKind::Lcd);
        assert_eq!(BackfillKind::from(BackfillTarget::Astc), BackfillKind::Compressed);
    }
}
