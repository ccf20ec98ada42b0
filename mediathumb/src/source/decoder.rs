//! Decoding originals and derivatives into pixels.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::{imageops, RgbaImage};
use thiserror::Error;

/// Errors that can occur while decoding a source.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("source not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt image: {0}")]
    Format(#[from] image::ImageError),
}

/// Turns encoded bytes into an RGBA pixel buffer.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<RgbaImage, DecodeError>;

    fn decode_bytes(&self, bytes: &[u8]) -> Result<RgbaImage, DecodeError>;
}

/// Decoder for every still format the `image` crate was built with.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> Result<RgbaImage, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                DecodeError::NotFound(path.to_path_buf())
            } else {
                DecodeError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        self.decode_bytes(&bytes)
    }

    fn decode_bytes(&self, bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
        Ok(image::load_from_memory(bytes)?.to_rgba8())
    }
}

/// Rotate pixels clockwise by `degrees` (0, 90, 180 or 270).
///
/// Other values are treated modulo 360 and rounded down to a quarter turn.
pub fn apply_orientation(image: RgbaImage, degrees: u32) -> RgbaImage {
    match (degrees % 360) / 90 {
        1 => imageops::rotate90(&image),
        2 => imageops::rotate180(&image),
        3 => imageops::rotate270(&image),
        _ => image,
    }
}
