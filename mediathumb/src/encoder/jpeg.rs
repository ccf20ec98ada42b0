//! JPEG encoder for LCD and THUMB derivatives.

use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::{RgbImage, RgbaImage};

use super::{check_dimensions, DerivativeEncoder, EncodeError};

/// Quality used for LCD and THUMB output.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Baseline JPEG encoder backed by the `image` crate.
///
/// Alpha is discarded before encoding.
#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl DerivativeEncoder for JpegEncoder {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
        check_dimensions(image)?;
        let rgb: RgbImage = image.convert();
        let mut buf = Vec::new();
        ImageJpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(&rgb)
            .map_err(|e| EncodeError::Codec {
                codec: "jpeg",
                message: e.to_string(),
            })?;
        Ok(buf)
    }

    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn name(&self) -> &'static str {
        "jpeg"
    }
}
