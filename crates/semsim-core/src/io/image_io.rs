use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::{Result, SimError};

/// Decode a calibration image as 8-bit intensity scaled to [0.0, 1.0].
///
/// Colour images are reduced to luminance.
pub fn load_intensity(path: &Path) -> Result<Array2<f32>> {
    let img = image::open(path).map_err(|e| SimError::DecodeFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let gray = img.to_luma8();
    Ok(gray_to_array(&gray))
}

pub fn gray_to_array(gray: &GrayImage) -> Array2<f32> {
    let (w, h) = gray.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32).0[0] as f32 / 255.0
    })
}

pub fn array_to_gray(data: &Array2<f32>) -> GrayImage {
    let (h, w) = data.dim();
    let mut img = GrayImage::new(w as u32, h as u32);
    for ((row, col), &v) in data.indexed_iter() {
        let val = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        img.put_pixel(col as u32, row as u32, Luma([val]));
    }
    img
}

/// Save an intensity raster as 8-bit grayscale PNG.
pub fn save_png(data: &Array2<f32>, path: &Path) -> Result<()> {
    array_to_gray(data).save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Whether `path` has an extension the image decoder understands.
pub fn is_supported_image(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok()
}
