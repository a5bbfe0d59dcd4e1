use ndarray::Array2;

use crate::beam::{BeamKernel, BeamParameters};
use crate::state::MicroscopeState;
use crate::viewport::Viewport;

/// One rendered image and everything that produced it.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Intensities in [0.0, 1.0], `(height, width)`.
    pub data: Array2<f32>,
    pub state: MicroscopeState,
    pub beam: BeamParameters,
    pub kernel: BeamKernel,
    pub viewport: Viewport,
    /// Magnification of the calibration image the frame was cut from.
    pub effective_magnification: f64,
}

impl Frame {
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn mean(&self) -> f32 {
        self.data.mean().unwrap_or(0.0)
    }
}
