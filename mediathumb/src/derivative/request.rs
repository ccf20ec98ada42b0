//! Per-call request descriptors and outcomes.

use std::path::PathBuf;

use crate::diagnostics::DiagnosticRecord;
use crate::worker::TaskPriority;

use super::kind::DerivativeKind;
use super::resize::Dimensions;

/// Row identifier of an asset in the metadata store.
pub type AssetId = i64;

/// Identifier grouping tasks submitted together by one caller.
pub type BatchId = u32;

/// Uri prefix for per-asset change notifications.
pub const ASSET_URI_PREFIX: &str = "mediathumb://photo/";
/// Uri prefix for batch completion notifications.
pub const BATCH_URI_PREFIX: &str = "mediathumb://batch/";

/// Change-notification uri of an asset.
pub fn asset_uri(asset_id: AssetId) -> String {
    format!("{}{}", ASSET_URI_PREFIX, asset_id)
}

/// Change-notification uri of a batch.
pub fn batch_uri(batch_id: BatchId) -> String {
    format!("{}{}", BATCH_URI_PREFIX, batch_id)
}

/// Media type of the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaType {
    #[default]
    Image,
    Video,
    Audio,
}

impl MediaType {
    pub fn code(self) -> i32 {
        match self {
            MediaType::Image => 1,
            MediaType::Video => 2,
            MediaType::Audio => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(MediaType::Image),
            2 => Some(MediaType::Video),
            3 => Some(MediaType::Audio),
            _ => None,
        }
    }
}

/// Where the original bytes of an asset are held.
///
/// Stored as its numeric code. A pure-cloud asset (`Cloud`) has no local
/// original, so local generation is skipped and the cloud strategies are
/// used instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum AssetLocation {
    #[default]
    Local = 1,
    Cloud = 2,
    LocalAndCloud = 3,
}

impl AssetLocation {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(AssetLocation::Local),
            2 => Some(AssetLocation::Cloud),
            3 => Some(AssetLocation::LocalAndCloud),
            _ => None,
        }
    }

    pub fn is_pure_cloud(self) -> bool {
        self == AssetLocation::Cloud
    }

    pub fn has_local(self) -> bool {
        !self.is_pure_cloud()
    }

    pub fn has_cloud(self) -> bool {
        self != AssetLocation::Local
    }
}

/// Metadata table an asset belongs to.
///
/// Only `Photos` rows get tiny derivatives and the "derivatives complete" bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AssetTable {
    #[default]
    Photos,
    Audios,
    Highlight,
}

impl AssetTable {
    pub fn name(self) -> &'static str {
        match self {
            AssetTable::Photos => "photos",
            AssetTable::Audios => "audios",
            AssetTable::Highlight => "highlight",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "photos" => Some(AssetTable::Photos),
            "audios" => Some(AssetTable::Audios),
            "highlight" => Some(AssetTable::Highlight),
            _ => None,
        }
    }
}

/// Everything the pipeline needs to know about one asset for one call.
///
/// Built per call and moved by value into worker tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetDerivativeRequest {
    pub asset_id: AssetId,
    /// Absolute path of the original under the media root
    pub source_path: PathBuf,
    pub media_type: MediaType,
    /// Capture time in milliseconds since the epoch
    pub capture_time: i64,
    /// Clockwise rotation needed for display: 0, 90, 180 or 270
    pub orientation: u32,
    pub location: AssetLocation,
    pub table: AssetTable,
    /// Original dimensions, when the metadata store knows them
    pub dimensions: Option<Dimensions>,
    pub kinds: Vec<DerivativeKind>,
    pub priority: TaskPriority,
    pub batch_id: Option<BatchId>,
}

impl AssetDerivativeRequest {
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
            kinds: Vec::new(),
            priority: TaskPriority::Mid,
            batch_id: None,
        }
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn with_capture_time(mut self, capture_time: i64) -> Self {
        self.capture_time = capture_time;
        self
    }

    pub fn with_orientation(mut self, orientation: u32) -> Self {
        self.orientation = orientation % 360;
        self
    }

    pub fn with_location(mut self, location: AssetLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_table(mut self, table: AssetTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = DerivativeKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn uri(&self) -> String {
        asset_uri(self.asset_id)
    }

    /// Tiny derivatives and the completion bit only apply to photo rows
    /// that are not audio.
    pub fn wants_tiny(&self) -> bool {
        self.table == AssetTable::Photos && self.media_type != MediaType::Audio
    }

    /// Original dimensions as displayed, after orientation.
    pub fn display_dimensions(&self) -> Option<Dimensions> {
        self.dimensions.map(|d| d.rotated(self.orientation))
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    pub success: bool,
    pub bytes_written: u64,
    pub diagnostic: Option<DiagnosticRecord>,
}

impl GenerationOutcome {
    pub fn succeeded(bytes_written: u64) -> Self {
        Self {
            success: true,
            bytes_written,
            diagnostic: None,
        }
    }

    pub fn failed(diagnostic: DiagnosticRecord) -> Self {
        Self {
            success: false,
            bytes_written: 0,
            diagnostic: Some(diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_codes() {
        assert_eq!(AssetLocation::from_code(2), Some(AssetLocation::Cloud));
        assert!(AssetLocation::Cloud.is_pure_cloud());
        assert!(AssetLocation::LocalAndCloud.has_local());
        assert!(AssetLocation::LocalAndCloud.has_cloud());
        assert!(!AssetLocation::Local.has_cloud());
        assert_eq!(AssetLocation::from_code(9), None);
    }

    #[test]
    fn test_builder_normalizes_orientation() {
        let request = AssetDerivativeRequest::new(7, "/media/a.jpg").with_orientation(450);
        assert_eq!(request.orientation, 90);
    }

    #[test]
    fn test_display_dimensions_follow_orientation() {
        let request = AssetDerivativeRequest::new(7, "/media/a.jpg")
            .with_dimensions(Dimensions::new(4000, 3000))
            .with_orientation(90);
        assert_eq!(
            request.display_dimensions(),
            Some(Dimensions::new(3000, 4000))
        );
    }

    #[test]
    fn test_wants_tiny_only_for_photos() {
        let photo = AssetDerivativeRequest::new(1, "/m/a.jpg");
        assert!(photo.wants_tiny());
        assert!(!photo.clone().with_table(AssetTable::Highlight).wants_tiny());
        assert!(!photo.with_media_type(MediaType::Audio).wants_tiny());
    }

    #[test]
    fn test_uris() {
        assert_eq!(asset_uri(12), "mediathumb://photo/12");
        assert_eq!(batch_uri(3), "mediathumb://batch/3");
    }
}
