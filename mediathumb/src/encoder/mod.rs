//! Derivative encoders.
//!
//! The pipeline only sees [`DerivativeEncoder`]; it picks a JPEG encoder for
//! LCD/THUMB and an ASTC encoder for the compressed and tiny kinds.

mod astc;
mod jpeg;

pub use astc::{AstcEncoder, AstcHeader, ASTC_BLOCK_BYTES, ASTC_HEADER_BYTES, ASTC_MAGIC};
pub use jpeg::{JpegEncoder, DEFAULT_JPEG_QUALITY};

use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;

/// Errors that can occur while encoding a derivative.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Image has a zero-length side
    #[error("invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    /// Underlying codec failure
    #[error("{codec} encoding failed: {message}")]
    Codec {
        codec: &'static str,
        message: String,
    },
}

/// Turns a pixel buffer into the bytes of one derivative.
pub trait DerivativeEncoder: Send + Sync {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, EncodeError>;

    /// File extension of the produced format, without the dot.
    fn extension(&self) -> &'static str;

    fn name(&self) -> &'static str;
}

impl<T: DerivativeEncoder + ?Sized> DerivativeEncoder for Arc<T> {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
        (**self).encode(image)
    }

    fn extension(&self) -> &'static str {
        (**self).extension()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

fn check_dimensions(image: &RgbaImage) -> Result<(), EncodeError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(EncodeError::InvalidDimensions(image.width(), image.height()));
    }
    Ok(())
}
