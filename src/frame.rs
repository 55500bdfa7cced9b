//! Frame buffers shared by the video, overlay and violation stages.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use ndarray::{Array3, s};

use crate::geometry::BBox;

/// An RGB8 image laid out as `(row, column, channel)`.
pub type Image = Array3<u8>;

/// Width and height of an image in pixels.
#[inline]
pub fn dimensions(image: &Image) -> (usize, usize) {
    let (rows, cols, _) = image.dim();
    (cols, rows)
}

/// Copy the region covered by `bbox` out of `image`.
///
/// The box is clamped to the image first; `None` is returned when nothing
/// of it remains.
pub fn crop(image: &Image, bbox: &BBox) -> Option<Image> {
    let (width, height) = dimensions(image);
    let clamped = bbox.clamp_to(width, height);
    if clamped.is_empty() {
        return None;
    }
    let view = image.slice(s![
        clamped.y1 as usize..clamped.y2 as usize,
        clamped.x1 as usize..clamped.x2 as usize,
        ..
    ]);
    Some(view.to_owned())
}

/// Convert to an `image` buffer for encoding.
pub fn to_rgb_image(image: &Image) -> Option<RgbImage> {
    let (width, height) = dimensions(image);
    let raw: Vec<u8> = image.iter().copied().collect();
    RgbImage::from_raw(width as u32, height as u32, raw)
}

/// Convert a decoded `image` buffer into an [`Image`].
pub fn from_rgb_image(rgb: RgbImage) -> Option<Image> {
    let (width, height) = rgb.dimensions();
    Array3::from_shape_vec((height as usize, width as usize, 3), rgb.into_raw()).ok()
}

/// Error for buffers whose shape is not `(rows, cols, 3)`.
pub fn dimension_mismatch() -> image::ImageError {
    image::ImageError::Parameter(image::error::ParameterError::from_kind(
        image::error::ParameterErrorKind::DimensionMismatch,
    ))
}

/// Single-channel luma copy, as fed to in-process OCR.
pub fn to_luma(image: &Image) -> Option<GrayImage> {
    to_rgb_image(image).map(|rgb| DynamicImage::ImageRgb8(rgb).to_luma8())
}

/// Encode as PNG, the format handed to external plate and OCR processes.
pub fn encode_png(image: &Image) -> Result<Vec<u8>, image::ImageError> {
    let rgb = to_rgb_image(image).ok_or_else(dimension_mismatch)?;
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
