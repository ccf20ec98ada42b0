//! Minimal ASTC 4x4 writer.
//!
//! Every 4x4 tile is written as an LDR void-extent block holding the
//! average color of the tile. The output is a valid `.astc` container that
//! any ASTC decoder accepts; it trades detail for a trivially fast encode,
//! which is what the tiny grid derivatives need.
//!
//! # File layout
//!
//! ```text
//! offset  size  field
//! 0       4     magic 0x5CA1AB13 (little endian)
//! 4       3     block dimensions x, y, z (4, 4, 1)
//! 7       3     image width  (24-bit little endian)
//! 10      3     image height (24-bit little endian)
//! 13      3     image depth  (24-bit little endian, always 1)
//! 16      16*n  blocks, row-major
//! ```

use image::RgbaImage;

use super::{check_dimensions, DerivativeEncoder, EncodeError};

/// `.astc` file magic, as stored on disk.
pub const ASTC_MAGIC: [u8; 4] = [0x13, 0xAB, 0xA1, 0x5C];
/// Size of the `.astc` header in bytes.
pub const ASTC_HEADER_BYTES: usize = 16;
/// Size of one compressed block in bytes.
pub const ASTC_BLOCK_BYTES: usize = 16;

const BLOCK_DIM: u32 = 4;

/// Void-extent marker, LDR, with all extent coordinates set to "unused".
const VOID_EXTENT_PREFIX: [u8; 8] = [0xFC, 0xFD, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Parsed `.astc` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstcHeader {
    pub block_x: u8,
    pub block_y: u8,
    pub block_z: u8,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl AstcHeader {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            block_x: BLOCK_DIM as u8,
            block_y: BLOCK_DIM as u8,
            block_z: 1,
            width,
            height,
            depth: 1,
        }
    }

    pub fn to_bytes(&self) -> [u8; ASTC_HEADER_BYTES] {
        let mut out = [0u8; ASTC_HEADER_BYTES];
        out[..4].copy_from_slice(&ASTC_MAGIC);
        out[4] = self.block_x;
        out[5] = self.block_y;
        out[6] = self.block_z;
        out[7..10].copy_from_slice(&self.width.to_le_bytes()[..3]);
        out[10..13].copy_from_slice(&self.height.to_le_bytes()[..3]);
        out[13..16].copy_from_slice(&self.depth.to_le_bytes()[..3]);
        out
    }

    /// Parse the header at the start of `bytes`.
    ///
    /// Returns `None` if the buffer is too short or the magic does not match.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ASTC_HEADER_BYTES || bytes[..4] != ASTC_MAGIC {
            return None;
        }
        let u24 = |b: &[u8]| u32::from_le_bytes([b[0], b[1], b[2], 0]);
        Some(Self {
            block_x: bytes[4],
            block_y: bytes[5],
            block_z: bytes[6],
            width: u24(&bytes[7..10]),
            height: u24(&bytes[10..13]),
            depth: u24(&bytes[13..16]),
        })
    }

    /// Number of blocks the payload must contain.
    pub fn block_count(&self) -> usize {
        let bx = self.width.div_ceil(self.block_x.max(1) as u32) as usize;
        let by = self.height.div_ceil(self.block_y.max(1) as u32) as usize;
        let bz = self.depth.div_ceil(self.block_z.max(1) as u32) as usize;
        bx * by * bz
    }
}

/// Constant-color ASTC 4x4 encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct AstcEncoder;

impl AstcEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Average RGBA over the tile whose top-left pixel is `(x0, y0)`.
    fn tile_average(image: &RgbaImage, x0: u32, y0: u32) -> [u8; 4] {
        let x1 = (x0 + BLOCK_DIM).min(image.width());
        let y1 = (y0 + BLOCK_DIM).min(image.height());
        let mut sums = [0u32; 4];
        let mut count = 0u32;
        for y in y0..y1 {
            for x in x0..x1 {
                let p = image.get_pixel(x, y);
                for (sum, channel) in sums.iter_mut().zip(p.0) {
                    *sum += channel as u32;
                }
                count += 1;
            }
        }
        let mut avg = [0u8; 4];
        for (out, sum) in avg.iter_mut().zip(sums) {
            *out = ((sum + count / 2) / count.max(1)) as u8;
        }
        avg
    }

    fn void_extent_block(color: [u8; 4]) -> [u8; ASTC_BLOCK_BYTES] {
        let mut block = [0u8; ASTC_BLOCK_BYTES];
        block[..8].copy_from_slice(&VOID_EXTENT_PREFIX);
        for (i, channel) in color.iter().enumerate() {
            let unorm16 = (*channel as u16) * 257;
            block[8 + i * 2..10 + i * 2].copy_from_slice(&unorm16.to_le_bytes());
        }
        block
    }
}

impl DerivativeEncoder for AstcEncoder {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
        check_dimensions(image)?;
        if image.width() > 0xFF_FFFF || image.height() > 0xFF_FFFF {
            return Err(EncodeError::InvalidDimensions(image.width(), image.height()));
        }

        let header = AstcHeader::new(image.width(), image.height());
        let mut out = Vec::with_capacity(ASTC_HEADER_BYTES + header.block_count() * ASTC_BLOCK_BYTES);
        out.extend_from_slice(&header.to_bytes());

        for y0 in (0..image.height()).step_by(BLOCK_DIM as usize) {
            for x0 in (0..image.width()).step_by(BLOCK_DIM as usize) {
                let color = Self::tile_average(image, x0, y0);
                out.extend_from_slice(&Self::void_extent_block(color));
            }
        }
        Ok(out)
    }

    fn extension(&self) -> &'static str {
        "astc"
    }

    fn name(&self) -> &'static str {
        "astc-4x4"
    }
}
