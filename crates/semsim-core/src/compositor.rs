use ndarray::{s, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::debug;

use crate::beam::BeamKernel;
use crate::config::SimulatorConfig;
use crate::consts::{
    DEFAULT_KERNEL_TRUNCATION_SIGMAS, DEFAULT_MAX_KERNEL_RADIUS_PX, PARALLEL_PIXEL_THRESHOLD,
};
use crate::filters::elliptical_blur::{elliptical_blur_array, EllipticalKernel};
use crate::filters::levels::{brightness_contrast_inplace, Photometry};
use crate::filters::noise::DetectorNoise;
use crate::viewport::Viewport;

/// Turns a calibration image, a viewport and a beam spot into a frame.
#[derive(Clone, Debug)]
pub struct Compositor {
    truncation: f64,
    max_radius: usize,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            truncation: DEFAULT_KERNEL_TRUNCATION_SIGMAS,
            max_radius: DEFAULT_MAX_KERNEL_RADIUS_PX,
        }
    }
}

impl Compositor {
    pub fn new(truncation: f64, max_radius: usize) -> Self {
        Self {
            truncation,
            max_radius,
        }
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self::new(
            config.optics.kernel_truncation_sigmas,
            config.optics.max_kernel_radius_px,
        )
    }

    /// Render `viewport.height x viewport.width` output pixels.
    ///
    /// Only the part of the source under the viewport (plus the kernel
    /// margin) is blurred. Photometry is applied after noise so the final
    /// clamp keeps every value in [0.0, 1.0].
    pub fn render(
        &self,
        source: &Array2<f32>,
        viewport: &Viewport,
        kernel: &BeamKernel,
        photometry: &Photometry,
        noise: Option<&mut DetectorNoise>,
    ) -> Array2<f32> {
        let blur = EllipticalKernel::from_beam(kernel, self.truncation, self.max_radius);
        let margin = blur.as_ref().map_or(0, |k| k.radius()) + 1;

        let (row0, col0, region) = crop_region(source, viewport, margin);
        let blurred;
        let sampled_from = match &blur {
            Some(k) => {
                blurred = elliptical_blur_array(&region.to_owned(), k);
                debug!(
                    radius = k.radius(),
                    taps = k.tap_count(),
                    region_w = region.ncols(),
                    region_h = region.nrows(),
                    "Applied beam blur"
                );
                blurred.view()
            }
            None => region,
        };

        let mut frame = sample_viewport(&sampled_from, viewport, row0, col0);

        if let Some(noise) = noise {
            noise.apply(&mut frame);
        }
        if !photometry.is_neutral() {
            brightness_contrast_inplace(&mut frame, photometry);
        } else {
            frame.mapv_inplace(|v| v.clamp(0.0, 1.0));
        }
        frame
    }
}

/// Source window covering the viewport's bounding box grown by `margin`,
/// clamped to the raster. Returns the window's top-left `(row, col)`.
fn crop_region<'a>(
    source: &'a Array2<f32>,
    viewport: &Viewport,
    margin: usize,
) -> (usize, usize, ArrayView2<'a, f32>) {
    let (h, w) = source.dim();
    let b = viewport.bounds();
    let m = margin as f64;

    let clamp_to = |v: f64, max: usize| -> usize {
        if v.is_nan() || v <= 0.0 {
            0
        } else {
            (v as usize).min(max)
        }
    };
    let col0 = clamp_to((b.min_x - m).floor(), w - 1);
    let row0 = clamp_to((b.min_y - m).floor(), h - 1);
    let col1 = clamp_to((b.max_x + m).ceil(), w).max(col0 + 1);
    let row1 = clamp_to((b.max_y + m).ceil(), h).max(row0 + 1);

    (row0, col0, source.slice(s![row0..row1, col0..col1]))
}

fn sample_viewport(
    region: &ArrayView2<f32>,
    viewport: &Viewport,
    row0: usize,
    col0: usize,
) -> Array2<f32> {
    let mut frame = Array2::<f32>::zeros((viewport.height, viewport.width));
    let (oy, ox) = (row0 as f64, col0 as f64);

    let fill_row = |row: usize, out: &mut ndarray::ArrayViewMut1<f32>| {
        for (col, px) in out.iter_mut().enumerate() {
            let (y, x) = viewport.source_position(row, col);
            *px = bilinear_sample_clamped(region, y - oy, x - ox);
        }
    };

    if viewport.width * viewport.height >= PARALLEL_PIXEL_THRESHOLD {
        frame
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row, mut out)| fill_row(row, &mut out));
    } else {
        for (row, mut out) in frame.axis_iter_mut(Axis(0)).enumerate() {
            fill_row(row, &mut out);
        }
    }
    frame
}

/// Bilinear interpolation with edge replication. Exact at integer positions.
pub fn bilinear_sample_clamped(data: &ArrayView2<f32>, y: f64, x: f64) -> f32 {
    let (h, w) = data.dim();
    let y = y.clamp(0.0, (h - 1) as f64);
    let x = x.clamp(0.0, (w - 1) as f64);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    if fx == 0.0 && fy == 0.0 {
        return data[[y0, x0]];
    }

    let v00 = data[[y0, x0]];
    let v10 = data[[y0, x1]];
    let v01 = data[[y1, x0]];
    let v11 = data[[y1, x1]];

    v00 * (1.0 - fx) * (1.0 - fy) + v10 * fx * (1.0 - fy) + v01 * (1.0 - fx) * fy + v11 * fx * fy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_midpoint_averages() {
        let data = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 0.0, 1.0]).unwrap();
        let v = bilinear_sample_clamped(&data.view(), 0.5, 0.5);
        assert!((v - 0.5).abs() < 1e-6);
    }

    #[test]
    fn bilinear_replicates_edges() {
        let data = Array2::from_shape_vec((2, 2), vec![0.2, 0.4, 0.6, 0.8]).unwrap();
        assert_eq!(bilinear_sample_clamped(&data.view(), -3.0, -3.0), 0.2);
        assert_eq!(bilinear_sample_clamped(&data.view(), 9.0, 9.0), 0.8);
    }
}
