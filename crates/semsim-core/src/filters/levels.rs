use ndarray::Array2;

use crate::state::MicroscopeState;

/// Brightness and contrast as applied to the detector signal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Photometry {
    /// Offset added after contrast (range roughly -1.0..1.0).
    pub brightness: f32,
    /// Contrast setting, >= 0 (1.0 = no change).
    pub contrast: f32,
}

impl Default for Photometry {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
        }
    }
}

impl Photometry {
    pub fn from_state(state: &MicroscopeState) -> Self {
        Self {
            brightness: state.brightness,
            contrast: state.contrast,
        }
    }

    /// Gain around the 0.5 midpoint. Quadratic in the setting, like a
    /// detector amplifier knob, and monotonic for non-negative settings.
    pub fn contrast_factor(&self) -> f32 {
        self.contrast * self.contrast
    }

    pub fn brightness_offset(&self) -> f32 {
        self.brightness
    }

    /// Map one sample; the clamp is applied last.
    pub fn apply(&self, value: f32) -> f32 {
        let adjusted = (value - 0.5) * self.contrast_factor() + 0.5 + self.brightness_offset();
        adjusted.clamp(0.0, 1.0)
    }

    pub fn is_neutral(&self) -> bool {
        self.brightness == 0.0 && self.contrast == 1.0
    }
}

/// Adjust brightness and contrast in place.
pub fn brightness_contrast_inplace(data: &mut Array2<f32>, photometry: &Photometry) {
    data.mapv_inplace(|v| photometry.apply(v));
}
