//! Disparity maps stored as 16-bit PNG in block-matching fixed point.
//!
//! Each pixel holds the signed 16.4 fixed-point disparity bit pattern
//! (`disparity * 16`), so the usual negative "no match" value reads back as
//! invalid.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, Luma};
use stereo_transfer_core::{DisparityMap, DisparityMapError, SGBM_DISPARITY_SCALE};

#[derive(thiserror::Error, Debug)]
pub enum DisparityIoError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Map(#[from] DisparityMapError),
    #[error("expected a 16-bit grayscale disparity image, got {0:?}")]
    UnsupportedFormat(image::ColorType),
}

/// Load a fixed-point disparity PNG.
pub fn load_sgbm_png(path: impl AsRef<Path>) -> Result<DisparityMap, DisparityIoError> {
    let img = image::open(path)?;
    let DynamicImage::ImageLuma16(buf) = img else {
        return Err(DisparityIoError::UnsupportedFormat(img.color()));
    };
    let (w, h) = buf.dimensions();
    let raw: Vec<i16> = buf.as_raw().iter().map(|&v| v as i16).collect();
    Ok(DisparityMap::from_fixed_point(w as usize, h as usize, &raw)?)
}

/// Write a disparity map as a fixed-point PNG; invalid entries become 0.
pub fn save_sgbm_png(map: &DisparityMap, path: impl AsRef<Path>) -> Result<(), DisparityIoError> {
    let (w, h) = (map.width() as u32, map.height() as u32);
    let buf = ImageBuffer::<Luma<u16>, Vec<u16>>::from_fn(w, h, |x, y| {
        let v = map
            .get(x as usize, y as usize)
            .map(|d| (d * SGBM_DISPARITY_SCALE).round().clamp(0.0, i16::MAX as f32) as u16)
            .unwrap_or(0);
        Luma([v])
    });
    buf.save(path)?;
    Ok(())
}
