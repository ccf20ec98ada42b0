//! Derivative kinds, request descriptors and the resize laws that size them.
//!
//! A derivative is one rendition of an original asset. Every rendition has a
//! fixed suffix, extension, target size and storage medium; see
//! [`DerivativeKind`] for the table.

mod kind;
mod request;
mod resize;

pub use kind::{
    DerivativeClass, DerivativeKey, DerivativeKind, ParseKindError, StorageMedium,
    DEFAULT_LCD_SIZE, DEFAULT_MONTH_SIZE, DEFAULT_THUMB_SIZE, DEFAULT_YEAR_SIZE,
    MAX_DEFAULT_THUMB_SIZE,
};
pub use request::{
    asset_uri, batch_uri, AssetDerivativeRequest, AssetId, AssetLocation, AssetTable, BatchId,
    GenerationOutcome, MediaType, ASSET_URI_PREFIX, BATCH_URI_PREFIX,
};
pub use resize::{
    resize_lcd, resize_thumb, thumb_plan, Dimensions, ThumbPlan, ASPECT_RATIO_THRESHOLD,
    LCD_LONG_SIDE_THRESHOLD, LCD_SHORT_SIDE_THRESHOLD, MAXIMUM_LCD_LONG_SIDE,
    SHORT_SIDE_THRESHOLD,
};
