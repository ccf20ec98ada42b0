//! Resize laws for LCD and THUMB derivatives.
//!
//! Both laws are pure functions over dimensions so they can be checked
//! without touching pixels. Scaling rounds to nearest and never produces a
//! zero-length side.

use std::fmt;

/// LCD long side bound for ordinary aspect ratios.
pub const LCD_LONG_SIDE_THRESHOLD: u32 = 1920;
/// LCD short side bound for panoramas.
pub const LCD_SHORT_SIDE_THRESHOLD: u32 = 512;
/// Hard cap on the LCD long side for panoramas.
pub const MAXIMUM_LCD_LONG_SIDE: u32 = 4096;
/// THUMB short side bound.
pub const SHORT_SIDE_THRESHOLD: u32 = 350;
/// Long/short ratio above which an image is treated as a panorama.
pub const ASPECT_RATIO_THRESHOLD: u32 = 3;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn short_side(&self) -> u32 {
        self.width.min(self.height)
    }

    pub fn long_side(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }

    /// Swap width and height.
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Dimensions after rotating by `degrees` (multiples of 90).
    pub fn rotated(&self, degrees: u32) -> Self {
        if (degrees / 90) % 2 == 1 {
            self.transposed()
        } else {
            *self
        }
    }

    /// True when the long side exceeds `ASPECT_RATIO_THRESHOLD` times the short side.
    pub fn is_panorama(&self) -> bool {
        self.long_side() as u64 > self.short_side() as u64 * ASPECT_RATIO_THRESHOLD as u64
    }

    fn from_sides(short: u32, long: u32, portrait: bool) -> Self {
        if portrait {
            Self::new(short, long)
        } else {
            Self::new(long, short)
        }
    }

    /// Parse the `"<w>:<h>"` form stored in metadata columns.
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.split_once(':')?;
        Some(Self::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
    }

    /// Format in the `"<w>:<h>"` form stored in metadata columns.
    pub fn to_column(&self) -> String {
        format!("{}:{}", self.width, self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// `side * num / den`, rounded to nearest, at least 1.
fn scale_side(side: u32, num: u32, den: u32) -> u32 {
    if den == 0 {
        return side;
    }
    let scaled = (side as u64 * num as u64 + den as u64 / 2) / den as u64;
    scaled.max(1) as u32
}

/// Target dimensions for an LCD derivative.
///
/// Ordinary images keep their long side at or under 1920. Panoramas
/// (aspect ratio over 3) keep their short side at or under 512 and their
/// long side at or under 4096.
///
/// ```
/// use mediathumb::derivative::{resize_lcd, Dimensions};
///
/// assert_eq!(resize_lcd(Dimensions::new(3840, 5760)), Dimensions::new(1280, 1920));
/// assert_eq!(resize_lcd(Dimensions::new(3840, 57600)), Dimensions::new(273, 4096));
/// ```
pub fn resize_lcd(source: Dimensions) -> Dimensions {
    if source.is_empty() {
        return source;
    }
    let portrait = source.is_portrait();
    let mut short = source.short_side();
    let mut long = source.long_side();

    if !source.is_panorama() {
        if long > LCD_LONG_SIDE_THRESHOLD {
            short = scale_side(short, LCD_LONG_SIDE_THRESHOLD, long);
            long = LCD_LONG_SIDE_THRESHOLD;
        }
        return Dimensions::from_sides(short, long, portrait);
    }

    if short > LCD_SHORT_SIDE_THRESHOLD {
        long = scale_side(long, LCD_SHORT_SIDE_THRESHOLD, short);
        short = LCD_SHORT_SIDE_THRESHOLD;
    }
    if long > MAXIMUM_LCD_LONG_SIDE {
        short = scale_side(short, MAXIMUM_LCD_LONG_SIDE, long);
        long = MAXIMUM_LCD_LONG_SIDE;
    }
    Dimensions::from_sides(short, long, portrait)
}

/// Two-step THUMB plan: proportional scale, then center crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbPlan {
    /// Dimensions after the proportional scale
    pub scaled: Dimensions,
    /// Final dimensions after cropping the long side
    pub cropped: Dimensions,
}

/// Plan the THUMB resize for `source`.
pub fn thumb_plan(source: Dimensions) -> ThumbPlan {
    if source.is_empty() {
        return ThumbPlan {
            scaled: source,
            cropped: source,
        };
    }
    let portrait = source.is_portrait();
    let mut short = source.short_side();
    let mut long = source.long_side();

    if short > SHORT_SIDE_THRESHOLD {
        long = scale_side(long, SHORT_SIDE_THRESHOLD, short);
        short = SHORT_SIDE_THRESHOLD;
    }
    let scaled = Dimensions::from_sides(short, long, portrait);
    let max_long = short.saturating_mul(ASPECT_RATIO_THRESHOLD);
    let cropped = Dimensions::from_sides(short, long.min(max_long), portrait);
    ThumbPlan { scaled, cropped }
}

/// Final THUMB dimensions for `source`.
///
/// The short side is scaled down to 350 when larger; the long side is then
/// cropped to at most three times the short side.
///
/// ```
/// use mediathumb::derivative::{resize_thumb, Dimensions};
///
/// assert_eq!(resize_thumb(Dimensions::new(512, 2560)), Dimensions::new(350, 1050));
/// assert_eq!(resize_thumb(Dimensions::new(128, 1000)), Dimensions::new(128, 384));
/// ```
pub fn resize_thumb(source: Dimensions) -> Dimensions {
    thumb_plan(source).cropped
}
