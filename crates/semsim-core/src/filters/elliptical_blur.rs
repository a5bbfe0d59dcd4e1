use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::beam::BeamKernel;
use crate::consts::{
    DIRECT_CONVOLUTION_MAX_RADIUS, KERNEL_TAP_CUTOFF, MIN_AXIS_SIGMA_PX, PARALLEL_PIXEL_THRESHOLD,
};
use crate::filters::fft::convolve_fft;

/// Discretized rotated Gaussian, normalized to sum 1.
#[derive(Clone, Debug)]
pub struct EllipticalKernel {
    radius: usize,
    weights: Array2<f32>,
    /// Non-negligible weights as (dy, dx, weight).
    taps: Vec<(isize, isize, f32)>,
}

impl EllipticalKernel {
    /// Build the kernel for a beam spot, or `None` when the spot is an identity.
    ///
    /// Support is an ellipse of `truncation` standard deviations, with the
    /// bounding radius capped at `max_radius`.
    pub fn from_beam(kernel: &BeamKernel, truncation: f64, max_radius: usize) -> Option<Self> {
        if kernel.is_identity() {
            return None;
        }
        Some(Self::new(
            kernel.sigma_x,
            kernel.sigma_y,
            kernel.orientation,
            truncation,
            max_radius,
        ))
    }

    pub fn new(
        sigma_major: f64,
        sigma_minor: f64,
        orientation: f64,
        truncation: f64,
        max_radius: usize,
    ) -> Self {
        let sa = sigma_major.max(MIN_AXIS_SIGMA_PX);
        let sb = sigma_minor.max(MIN_AXIS_SIGMA_PX);
        let radius = ((truncation * sa.max(sb)).ceil() as usize).clamp(1, max_radius.max(1));
        let size = 2 * radius + 1;
        let (sin, cos) = orientation.sin_cos();
        let limit = truncation * truncation;

        let mut weights = Array2::<f32>::zeros((size, size));
        let mut sum = 0.0f64;
        for ((row, col), w) in weights.indexed_iter_mut() {
            let dy = row as f64 - radius as f64;
            let dx = col as f64 - radius as f64;
            let along = dx * cos + dy * sin;
            let across = -dx * sin + dy * cos;
            let q = (along / sa).powi(2) + (across / sb).powi(2);
            if q <= limit {
                let v = (-0.5 * q).exp();
                *w = v as f32;
                sum += v;
            }
        }

        // The centre tap always lies inside the support, so sum > 0.
        let inv = (1.0 / sum) as f32;
        weights.mapv_inplace(|v| v * inv);

        let peak = weights.iter().cloned().fold(0.0f32, f32::max);
        let cutoff = peak * KERNEL_TAP_CUTOFF;
        weights.mapv_inplace(|v| if v < cutoff { 0.0 } else { v });
        let kept: f32 = weights.sum();
        weights.mapv_inplace(|v| v / kept);

        let taps = weights
            .indexed_iter()
            .filter(|&(_, &v)| v > 0.0)
            .map(|((row, col), &v)| {
                let r = radius as isize;
                (row as isize - r, col as isize - r, v)
            })
            .collect();

        Self {
            radius,
            weights,
            taps,
        }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }
}

/// Blur with an elliptical kernel, replicating edge pixels.
///
/// Narrow kernels are applied directly; wide ones go through the FFT path.
pub fn elliptical_blur_array(data: &Array2<f32>, kernel: &EllipticalKernel) -> Array2<f32> {
    if kernel.radius > DIRECT_CONVOLUTION_MAX_RADIUS {
        convolve_fft(data, &kernel.weights)
    } else {
        convolve_direct(data, &kernel.taps)
    }
}

fn convolve_direct(data: &Array2<f32>, taps: &[(isize, isize, f32)]) -> Array2<f32> {
    let (h, w) = data.dim();
    let mut result = Array2::<f32>::zeros((h, w));

    let convolve_row = |row: usize, out: &mut ndarray::ArrayViewMut1<f32>| {
        for col in 0..w {
            let mut sum = 0.0f32;
            for &(dy, dx, kv) in taps {
                let src_row = (row as isize + dy).clamp(0, h as isize - 1) as usize;
                let src_col = (col as isize + dx).clamp(0, w as isize - 1) as usize;
                sum += data[[src_row, src_col]] * kv;
            }
            out[col] = sum;
        }
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        result
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row, mut out)| convolve_row(row, &mut out));
    } else {
        for (row, mut out) in result.axis_iter_mut(Axis(0)).enumerate() {
            convolve_row(row, &mut out);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_sums_to_one() {
        let k = EllipticalKernel::new(3.0, 1.0, 0.4, 3.0, 64);
        let sum: f32 = k.weights().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn radius_is_capped() {
        let k = EllipticalKernel::new(100.0, 100.0, 0.0, 3.0, 16);
        assert_eq!(k.radius(), 16);
    }

    #[test]
    fn horizontal_kernel_spreads_along_x() {
        let k = EllipticalKernel::new(4.0, 0.5, 0.0, 3.0, 64);
        let r = k.radius();
        let w = k.weights();
        assert!(w[[r, r + 4]] > w[[r + 4, r]] * 10.0);
    }
}
