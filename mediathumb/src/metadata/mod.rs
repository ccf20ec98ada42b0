//! Asset metadata access.
//!
//! The engine reads asset rows (path, orientation, dimensions, location)
//! and writes back derivative bookkeeping: LCD size and visit time, THUMB
//! size, and the readiness state that tells callers a THUMB can be served.

mod query;
mod sqlite;

pub use query::{Cmp, Column, QueryBuilder};
pub(crate) use sqlite::cache_size_pragma;
pub use sqlite::SqliteMetadataStore;

use std::path::PathBuf;

use thiserror::Error;

use crate::derivative::{
    AssetDerivativeRequest, AssetId, AssetLocation, AssetTable, DerivativeKind, Dimensions,
    MediaType,
};

/// Errors from the metadata store.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to open metadata database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("asset {0} not found")]
    NotFound(AssetId),

    #[error("invalid value in column {column}: {value}")]
    InvalidColumn { column: &'static str, value: String },
}

/// Lowest `thumbnail_ready` value that is a ready timestamp.
pub const READY_TIMESTAMP_MIN: i64 = 1000;

/// THUMB readiness of an asset.
///
/// Stored as one integer column: small codes for the pending states,
/// a millisecond timestamp once derivatives are ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailReady {
    /// Generate during the next background pass
    Later,
    /// Generate as soon as possible
    Now,
    /// A generation is running
    Generating,
    /// The last generation failed
    Retry,
    /// Derivatives were completed at this time (ms)
    ReadyAt(i64),
}

impl ThumbnailReady {
    pub fn to_code(self) -> i64 {
        match self {
            ThumbnailReady::Later => 0,
            ThumbnailReady::Now => 1,
            ThumbnailReady::Generating => 2,
            ThumbnailReady::Retry => 3,
            ThumbnailReady::ReadyAt(ts) => ts.max(READY_TIMESTAMP_MIN),
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ThumbnailReady::Now,
            2 => ThumbnailReady::Generating,
            3 => ThumbnailReady::Retry,
            ts if ts >= READY_TIMESTAMP_MIN => ThumbnailReady::ReadyAt(ts),
            _ => ThumbnailReady::Later,
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, ThumbnailReady::ReadyAt(_))
    }
}

/// One asset row as the engine sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub asset_id: AssetId,
    pub source_path: PathBuf,
    pub media_type: MediaType,
    pub capture_time: i64,
    pub orientation: u32,
    pub location: AssetLocation,
    pub table: AssetTable,
    /// Original dimensions; `None` when unknown
    pub dimensions: Option<Dimensions>,
    pub lcd_size: Option<Dimensions>,
    pub thumb_size: Option<Dimensions>,
    /// Last LCD access (ms); 0 when the asset has no LCD
    pub lcd_visit_time: i64,
    pub thumbnail_ready: ThumbnailReady,
    /// All derivatives of a photo row are complete
    pub thumbnail_visible: bool,
}

impl AssetRecord {
    /// A fresh row with nothing generated yet.
    pub fn new(asset_id: AssetId, source_path: impl Into<PathBuf>) -> Self {
        Self {
            asset_id,
            source_path: source_path.into(),
            media_type: MediaType::Image,
            capture_time: 0,
            orientation: 0,
            location: AssetLocation::Local,
            table: AssetTable::Photos,
            dimensions: None,
            lcd_size: None,
            thumb_size: None,
            lcd_visit_time: 0,
            thumbnail_ready: ThumbnailReady::Later,
            thumbnail_visible: false,
        }
    }

    pub fn has_lcd(&self) -> bool {
        self.lcd_visit_time != 0
    }

    /// Per-call request for this asset.
    pub fn to_request(&self) -> AssetDerivativeRequest {
        let mut request = AssetDerivativeRequest::new(self.asset_id, self.source_path.clone())
            .with_media_type(self.media_type)
            .with_capture_time(self.capture_time)
            .with_orientation(self.orientation)
            .with_location(self.location)
            .with_table(self.table);
        request.dimensions = self.dimensions;
        request
    }
}

/// Readiness update written once per completed THUMB run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyUpdate {
    pub asset_id: AssetId,
    /// Completion timestamp (ms)
    pub ready_at: i64,
    pub thumb_size: Option<Dimensions>,
    /// Also flip the "derivatives complete" bit
    pub set_visible: bool,
}

/// An asset holding an LCD, as seen by the aging job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcdCandidate {
    pub asset_id: AssetId,
    pub source_path: PathBuf,
    pub lcd_visit_time: i64,
}

/// Access to asset rows.
pub trait MetadataStore: Send + Sync {
    fn record(&self, asset_id: AssetId) -> Result<Option<AssetRecord>, MetadataError>;

    /// Assets missing `kind`, newest capture first.
    fn lacking(&self, kind: DerivativeKind, limit: usize) -> Result<Vec<AssetRecord>, MetadataError>;

    /// Record a freshly written LCD.
    fn update_lcd(
        &self,
        asset_id: AssetId,
        size: Dimensions,
        visit_time: i64,
    ) -> Result<(), MetadataError>;

    /// Bump the LCD visit time of an asset that has one.
    fn touch_lcd(&self, asset_id: AssetId, now: i64) -> Result<(), MetadataError>;

    fn update_thumb_size(&self, asset_id: AssetId, size: Dimensions) -> Result<(), MetadataError>;

    /// Mark derivatives ready in one statement.
    fn mark_derivatives_ready(&self, update: &ReadyUpdate) -> Result<(), MetadataError>;

    fn set_ready_state(&self, asset_id: AssetId, state: ThumbnailReady) -> Result<(), MetadataError>;

    /// Forget an asset's LCD (size and visit time).
    fn reset_lcd(&self, asset_id: AssetId) -> Result<(), MetadataError>;

    fn lcd_count(&self) -> Result<u64, MetadataError>;

    /// Count LCD holders visited before (or at/after) `time`.
    fn count_lcd_by_visit_time(&self, time: i64, before: bool) -> Result<u64, MetadataError>;

    /// LCD holders ordered by visit time, oldest first, ties by id.
    fn aging_candidates(&self, limit: usize) -> Result<Vec<LcdCandidate>, MetadataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_codes() {
        assert_eq!(ThumbnailReady::from_code(0), ThumbnailReady::Later);
        assert_eq!(ThumbnailReady::from_code(3), ThumbnailReady::Retry);
        assert_eq!(
            ThumbnailReady::from_code(1_700_000_000_000),
            ThumbnailReady::ReadyAt(1_700_000_000_000)
        );
        // Unknown small codes fall back to "later"
        assert_eq!(ThumbnailReady::from_code(42), ThumbnailReady::Later);
        assert!(ThumbnailReady::ReadyAt(5000).is_ready());
        assert!(!ThumbnailReady::Generating.is_ready());
    }

    #[test]
    fn test_ready_timestamp_is_never_a_state_code() {
        assert_eq!(ThumbnailReady::ReadyAt(2).to_code(), READY_TIMESTAMP_MIN);
    }

    #[test]
    fn test_record_to_request() {
        let mut record = AssetRecord::new(11, "/m/a.jpg");
        record.orientation = 270;
        record.location = AssetLocation::LocalAndCloud;
        record.dimensions = Some(Dimensions::new(4000, 3000));

        let request = record.to_request();
        assert_eq!(request.asset_id, 11);
        assert_eq!(request.orientation, 270);
        assert_eq!(request.location, AssetLocation::LocalAndCloud);
        assert_eq!(request.dimensions, Some(Dimensions::new(4000, 3000)));
    }
}
