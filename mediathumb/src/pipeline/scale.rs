//! Pixel-level application of the resize laws.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::derivative::{resize_lcd, thumb_plan, Dimensions};

pub(crate) fn dimensions_of(image: &RgbaImage) -> Dimensions {
    Dimensions::new(image.width(), image.height())
}

/// Resize to exactly `target`; returns a copy when already that size.
pub fn resize_to(image: &RgbaImage, target: Dimensions) -> RgbaImage {
    if dimensions_of(image) == target || target.is_empty() {
        return image.clone();
    }
    imageops::resize(image, target.width, target.height, FilterType::Triangle)
}

/// Crop the center `target` region. Sides larger than the image are clamped.
pub fn center_crop(image: &RgbaImage, target: Dimensions) -> RgbaImage {
    let width = target.width.min(image.width());
    let height = target.height.min(image.height());
    if width == image.width() && height == image.height() {
        return image.clone();
    }
    let x = (image.width() - width) / 2;
    let y = (image.height() - height) / 2;
    imageops::crop_imm(image, x, y, width, height).to_image()
}

/// Screen-fit LCD rendition.
pub fn scale_lcd(image: &RgbaImage) -> RgbaImage {
    resize_to(image, resize_lcd(dimensions_of(image)))
}

/// THUMB rendition: proportional scale, then center crop of the long side.
pub fn scale_thumb(image: &RgbaImage) -> RgbaImage {
    let plan = thumb_plan(dimensions_of(image));
    let scaled = resize_to(image, plan.scaled);
    center_crop(&scaled, plan.cropped)
}

/// Square tiny rendition of edge `side` from the center of `image`.
pub fn tiny_square(image: &RgbaImage, side: u32) -> RgbaImage {
    let edge = image.width().min(image.height());
    let square = center_crop(image, Dimensions::new(edge, edge));
    resize_to(&square, Dimensions::new(side, side))
}
