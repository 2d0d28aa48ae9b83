use crate::common::{EncodedFrame, FrameOrigin};
use crate::error::ItemError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Target size keeping aspect ratio, longest edge no larger than `max_dimension`
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Downscale with Lanczos resampling if needed and encode as PNG
pub fn resize_and_encode(
    image: DynamicImage,
    max_dimension: u32,
    origin: FrameOrigin,
) -> Result<EncodedFrame, ItemError> {
    let (width, height) = fit_within(image.width(), image.height(), max_dimension);
    let image = if (width, height) != (image.width(), image.height()) {
        image.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        image
    };

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ItemError::FrameExtraction(format!("Failed to encode frame: {}", e)))?;

    Ok(EncodedFrame::new(
        buffer.into_inner(),
        image.width(),
        image.height(),
        origin,
    ))
}
