//! The closed set of derivative kinds.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::request::AssetId;

/// Edge length of the year-view tiny derivative.
pub const DEFAULT_YEAR_SIZE: u32 = 64;
/// Edge length of the month-view tiny derivative.
pub const DEFAULT_MONTH_SIZE: u32 = 128;
/// Requests at or under this short side are served from THUMB.
pub const DEFAULT_THUMB_SIZE: u32 = 256;
/// Requests at or under this long side (with a thumb-sized short side) are served from THUMB.
pub const MAX_DEFAULT_THUMB_SIZE: u32 = 768;
/// Nominal screen-fit size used when reporting LCD requests.
pub const DEFAULT_LCD_SIZE: u32 = 1080;

/// Where a derivative's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageMedium {
    /// A file under the derivative root
    File,
    /// An entry in the optional key-value capability
    KeyValue,
}

/// One rendition of an original asset.
///
/// | Kind | Suffix | Ext | Medium |
/// |---|---|---|---|
/// | `Lcd` | `LCD` | jpg | file |
/// | `Thumb` | `THM` | jpg | file |
/// | `ThumbCompressed` | `THM_ASTC` | astc | file |
/// | `MonthTiny` | `MTH` | astc | key-value |
/// | `YearTiny` | `YEAR` | astc | key-value |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivativeKind {
    /// Large, screen-fit rendition
    Lcd,
    /// Small JPEG rendition
    Thumb,
    /// ASTC-compressed counterpart of `Thumb`
    ThumbCompressed,
    /// 128x128 grid rendition for month views
    MonthTiny,
    /// 64x64 grid rendition for year views
    YearTiny,
}

impl DerivativeKind {
    /// Every kind, in generation order.
    pub const ALL: [DerivativeKind; 5] = [
        DerivativeKind::Lcd,
        DerivativeKind::Thumb,
        DerivativeKind::ThumbCompressed,
        DerivativeKind::MonthTiny,
        DerivativeKind::YearTiny,
    ];

    /// File stem / key-space suffix.
    pub fn suffix(self) -> &'static str {
        match self {
            DerivativeKind::Lcd => "LCD",
            DerivativeKind::Thumb => "THM",
            DerivativeKind::ThumbCompressed => "THM_ASTC",
            DerivativeKind::MonthTiny => "MTH",
            DerivativeKind::YearTiny => "YEAR",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            DerivativeKind::Lcd | DerivativeKind::Thumb => "jpg",
            _ => "astc",
        }
    }

    /// `<SUFFIX>.<ext>`
    pub fn file_name(self) -> String {
        format!("{}.{}", self.suffix(), self.extension())
    }

    pub fn storage(self) -> StorageMedium {
        match self {
            DerivativeKind::MonthTiny | DerivativeKind::YearTiny => StorageMedium::KeyValue,
            _ => StorageMedium::File,
        }
    }

    pub fn is_compressed(self) -> bool {
        self.extension() == "astc"
    }

    /// Edge length of the square tiny derivatives.
    pub fn tiny_side(self) -> Option<u32> {
        match self {
            DerivativeKind::MonthTiny => Some(DEFAULT_MONTH_SIZE),
            DerivativeKind::YearTiny => Some(DEFAULT_YEAR_SIZE),
            _ => None,
        }
    }

    /// The single-flight class a generation of this kind runs under.
    ///
    /// Everything except LCD is produced by one THUMB run, so those kinds
    /// share a class.
    pub fn class(self) -> DerivativeClass {
        match self {
            DerivativeKind::Lcd => DerivativeClass::Lcd,
            _ => DerivativeClass::Thumb,
        }
    }

    /// Map a requested display size to the derivative that serves it.
    ///
    /// `(-1, -1)` asks for the screen-fit rendition.
    pub fn for_request(width: i32, height: i32, compressed: bool) -> Self {
        if width == -1 && height == -1 {
            return DerivativeKind::Lcd;
        }
        let short = width.min(height);
        let long = width.max(height);
        if short <= DEFAULT_THUMB_SIZE as i32 && long <= MAX_DEFAULT_THUMB_SIZE as i32 {
            if compressed {
                DerivativeKind::ThumbCompressed
            } else {
                DerivativeKind::Thumb
            }
        } else {
            DerivativeKind::Lcd
        }
    }
}

impl fmt::Display for DerivativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DerivativeKind::Lcd => "LCD",
            DerivativeKind::Thumb => "THUMB",
            DerivativeKind::ThumbCompressed => "THUMB_COMPRESSED",
            DerivativeKind::MonthTiny => "MONTH_TINY",
            DerivativeKind::YearTiny => "YEAR_TINY",
        };
        f.write_str(name)
    }
}

/// Error parsing a derivative kind name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown derivative kind '{0}' - expected one of: lcd, thumb, astc, month, year")]
pub struct ParseKindError(String);

impl FromStr for DerivativeKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lcd" => Ok(DerivativeKind::Lcd),
            "thumb" | "thm" => Ok(DerivativeKind::Thumb),
            "astc" | "thm_astc" | "thumb_compressed" => Ok(DerivativeKind::ThumbCompressed),
            "month" | "mth" => Ok(DerivativeKind::MonthTiny),
            "year" => Ok(DerivativeKind::YearTiny),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

/// Single-flight class of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivativeClass {
    /// LCD generation
    Lcd,
    /// THUMB and everything produced alongside it
    Thumb,
    /// Regeneration from the unrotated THM_EX scratch
    CloudRead,
}

impl fmt::Display for DerivativeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivativeClass::Lcd => f.write_str("lcd"),
            DerivativeClass::Thumb => f.write_str("thumb"),
            DerivativeClass::CloudRead => f.write_str("cloud"),
        }
    }
}

/// Key used to coalesce concurrent generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivativeKey {
    pub asset_id: AssetId,
    pub class: DerivativeClass,
}

impl DerivativeKey {
    pub fn new(asset_id: AssetId, class: DerivativeClass) -> Self {
        Self { asset_id, class }
    }
}

impl fmt::Display for DerivativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.asset_id, self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert_eq!(DerivativeKind::Lcd.file_name(), "LCD.jpg");
        assert_eq!(DerivativeKind::Thumb.file_name(), "THM.jpg");
        assert_eq!(DerivativeKind::ThumbCompressed.file_name(), "THM_ASTC.astc");
    }

    #[test]
    fn test_storage_medium() {
        assert_eq!(DerivativeKind::Lcd.storage(), StorageMedium::File);
        assert_eq!(DerivativeKind::ThumbCompressed.storage(), StorageMedium::File);
        assert_eq!(DerivativeKind::MonthTiny.storage(), StorageMedium::KeyValue);
        assert_eq!(DerivativeKind::YearTiny.storage(), StorageMedium::KeyValue);
    }

    #[test]
    fn test_for_request_size_classification() {
        assert_eq!(DerivativeKind::for_request(-1, -1, false), DerivativeKind::Lcd);
        assert_eq!(DerivativeKind::for_request(256, 256, false), DerivativeKind::Thumb);
        assert_eq!(
            DerivativeKind::for_request(200, 768, true),
            DerivativeKind::ThumbCompressed
        );
        assert_eq!(DerivativeKind::for_request(257, 300, false), DerivativeKind::Lcd);
        assert_eq!(DerivativeKind::for_request(100, 769, false), DerivativeKind::Lcd);
    }

    #[test]
    fn test_class_groups_thumb_outputs() {
        assert_eq!(DerivativeKind::Lcd.class(), DerivativeClass::Lcd);
        for kind in &DerivativeKind::ALL[1..] {
            assert_eq!(kind.class(), DerivativeClass::Thumb);
        }
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("LCD".parse::<DerivativeKind>(), Ok(DerivativeKind::Lcd));
        assert_eq!(
            "astc".parse::<DerivativeKind>(),
            Ok(DerivativeKind::ThumbCompressed)
        );
        assert!("poster".parse::<DerivativeKind>().is_err());
    }

    #[test]
    fn test_key_display() {
        let key = DerivativeKey::new(42, DerivativeClass::Thumb);
        assert_eq!(key.to_string(), "42.thumb");
    }
}
