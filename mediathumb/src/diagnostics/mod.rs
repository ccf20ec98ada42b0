//! Failure diagnostics for generation runs.
//!
//! Every failed pipeline stage produces one [`DiagnosticRecord`] and posts it
//! to the configured [`DiagnosticsSink`]. The record carries the source
//! location of the failing stage so bug reports point at the code path, not
//! just the asset.
//!
//! # Example
//!
//! ```
//! use mediathumb::diagnostics::{CollectingDiagnostics, DiagnosticRecord, DiagnosticsSink, OperationKind};
//!
//! let sink = CollectingDiagnostics::new();
//! sink.report(DiagnosticRecord::new(OperationKind::CreateLcd, 1001, "/media/a.jpg", "missing"));
//! assert_eq!(sink.len(), 1);
//! ```

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::warn;

/// Pipeline operation a diagnostic was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateLcd,
    CreateThumb,
    CreateThumbFromSource,
    CreateLcdAndThumb,
    CreateCompressed,
    CreateCompressedEx,
    Read,
    TinyMaintenance,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::CreateLcd => "create_lcd",
            OperationKind::CreateThumb => "create_thumb",
            OperationKind::CreateThumbFromSource => "create_thumb_from_source",
            OperationKind::CreateLcdAndThumb => "create_lcd_and_thumb",
            OperationKind::CreateCompressed => "create_compressed",
            OperationKind::CreateCompressedEx => "create_compressed_ex",
            OperationKind::Read => "read",
            OperationKind::TinyMaintenance => "tiny_maintenance",
        };
        f.write_str(name)
    }
}

/// One failed stage.
#[derive(Debug, Clone)]
pub struct DiagnosticRecord {
    /// Where in the engine the failure was raised
    pub location: &'static Location<'static>,
    /// Numeric error code of the failure
    pub code: i32,
    /// Original path of the asset being processed
    pub asset_path: PathBuf,
    pub operation: OperationKind,
    /// Human-readable detail
    pub message: String,
}

impl DiagnosticRecord {
    /// Create a record tagged with the caller's source location.
    #[track_caller]
    pub fn new(
        operation: OperationKind,
        code: i32,
        asset_path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location: Location::caller(),
            code,
            asset_path: asset_path.into(),
            operation,
            message: message.into(),
        }
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} code={} path={} at {}:{}",
            self.operation,
            self.message,
            self.code,
            self.asset_path.display(),
            self.location.file(),
            self.location.line()
        )
    }
}

/// Receiver of diagnostic records.
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, record: DiagnosticRecord);
}

/// Sink that writes each record as a `warn!` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn report(&self, record: DiagnosticRecord) {
        warn!(
            operation = %record.operation,
            code = record.code,
            path = %record.asset_path.display(),
            file = record.location.file(),
            line = record.location.line(),
            "{}",
            record.message
        );
    }
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl DiagnosticsSink for CollectingDiagnostics {
    fn report(&self, record: DiagnosticRecord) {
        self.records.lock().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_captures_caller_location() {
        let record = DiagnosticRecord::new(OperationKind::CreateThumb, 7, "/a.jpg", "boom");
        assert_eq!(record.location.file(), file!());
        assert!(record.to_string().contains("create_thumb"));
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingDiagnostics::new();
        assert!(sink.is_empty());
        sink.report(DiagnosticRecord::new(OperationKind::Read, 1, "/a.jpg", "x"));
        sink.report(DiagnosticRecord::new(OperationKind::Read, 2, "/b.jpg", "y"));
        let codes: Vec<i32> = sink.records().iter().map(|r| r.code).collect();
        assert_eq!(codes, vec![1, 2]);
    }
}
