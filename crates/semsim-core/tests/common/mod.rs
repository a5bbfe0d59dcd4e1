#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::{GrayImage, Luma};
use ndarray::Array2;

use semsim_core::config::SimulatorConfig;
use semsim_core::library::{CalibrationLibrary, MemorySource};

pub const SRC_W: usize = 1024;
pub const SRC_H: usize = 768;

/// Deterministic texture with values on the 8-bit grid, so PNG storage is lossless.
pub fn pattern_image(width: usize, height: usize) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(row, col)| {
        ((col * 7 + row * 13 + (row / 16) * (col / 16)) % 256) as f32 / 255.0
    })
}

/// Smooth horizontal ramp from 0.0 at the left edge to 1.0 at the right.
pub fn ramp_image(width: usize, height: usize) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(_, col)| col as f32 / (width - 1) as f32)
}

/// Alternating 0/1 pixels.
pub fn checkerboard(width: usize, height: usize) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(row, col)| ((row + col) % 2) as f32)
}

pub fn variance(data: &Array2<f32>) -> f32 {
    let mean = data.mean().unwrap_or(0.0);
    data.mapv(|v| (v - mean) * (v - mean)).mean().unwrap_or(0.0)
}

pub fn write_gray_image(data: &Array2<f32>, path: &Path) {
    let (h, w) = data.dim();
    let mut img = GrayImage::new(w as u32, h as u32);
    for ((row, col), &v) in data.indexed_iter() {
        img.put_pixel(col as u32, row as u32, Luma([(v * 255.0).round() as u8]));
    }
    img.save(path).unwrap();
}

/// Write `Images/<sample>/<detector>/<mag>.png` files under `root`.
pub fn write_calibration_tree(root: &Path, sample: &str, detector: &str, mags: &[u32]) {
    write_calibration_tree_as(root, sample, detector, mags, "png");
}

/// Same as [`write_calibration_tree`] with any extension the `image` crate
/// can encode (`tif`, `bmp`, ...).
pub fn write_calibration_tree_as(
    root: &Path,
    sample: &str,
    detector: &str,
    mags: &[u32],
    extension: &str,
) {
    let dir = root.join("Images").join(sample).join(detector);
    fs::create_dir_all(&dir).unwrap();
    let data = pattern_image(SRC_W, SRC_H);
    for mag in mags {
        write_gray_image(&data, &dir.join(format!("{mag}.{extension}")));
    }
}

/// In-memory library with one pattern image per magnification.
pub fn memory_library(sample: &str, detector: &str, mags: &[f64]) -> CalibrationLibrary {
    let mut source = MemorySource::new();
    let data = pattern_image(SRC_W, SRC_H);
    for &mag in mags {
        source.insert(sample, detector, mag, data.clone());
    }
    CalibrationLibrary::from_source(Box::new(source)).unwrap()
}

/// Config for deterministic rendering: no noise, clean column.
pub fn quiet_config(images_path: &Path) -> SimulatorConfig {
    SimulatorConfig::new(images_path)
}
