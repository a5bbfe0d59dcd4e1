//! Beam spot model: turns focus, stigmation and aperture settings into an
//! elliptical Gaussian blur kernel.
//!
//! The defocus blur is a radius-of-confusion relation. A beam converging at
//! semi-angle `alpha = aperture_radius / working_distance` has a spot of
//! radius `|defocus| * alpha` at the sample, scaled by `sqrt(V_ref / V)` so
//! higher beam energy gives a tighter spot for the same defocus.
//!
//! Astigmatism is modelled with two line foci. The stigmation vector
//! `s = (stigmator_x, stigmator_y)` places them at `defocus ± |s|/2`, so the
//! spot extent along the astigmatic axis is `|defocus + |s|/2|` and across
//! it `|defocus - |s|/2|`. The axis angle is `atan2(sy, sx) / 2` (the two
//! stigmator quadrupoles sit 45 degrees apart); the major axis flips by 90
//! degrees as the focus passes through the astigmatic midpoint, which is
//! the behaviour an operator learns to recognise.

use std::f64::consts::{FRAC_PI_2, PI};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{ColumnConfig, SimulatorConfig};
use crate::consts::{APERTURE_BLUR_COUPLING, NM_PER_MM, VIEWPORT_WIDTH};
use crate::error::{Result, SimError};
use crate::state::MicroscopeState;

/// Physical inputs of the beam spot calculation.
///
/// These are exactly the attributes written to line 1 of a saved
/// parameter file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamParameters {
    /// Signed defocus in mm.
    pub focus: f64,
    /// Effective stigmation (operator setting plus column astigmatism), mm.
    pub stigmator_x: f64,
    pub stigmator_y: f64,
    /// kV.
    pub accelerating_voltage: f64,
    /// mm.
    pub working_distance: f64,
    /// mm.
    pub screen_halfwidth: f64,
    /// Magnification the source pixel grid is calibrated at.
    pub magnification: f64,
    /// Residual aperture offset (alignment setting minus misalignment), mm.
    pub aperture_offset_x: f64,
    pub aperture_offset_y: f64,
}

impl BeamParameters {
    /// Combine operator settings with the hidden column defects. `magnification`
    /// is the magnification of the calibration image being sampled.
    pub fn from_state(
        state: &MicroscopeState,
        aberrations: &ColumnAberrations,
        magnification: f64,
    ) -> Self {
        Self {
            focus: state.focus,
            stigmator_x: state.stigmator_x + aberrations.astigmatism_x,
            stigmator_y: state.stigmator_y + aberrations.astigmatism_y,
            accelerating_voltage: state.accelerating_voltage,
            working_distance: state.working_distance,
            screen_halfwidth: state.screen_halfwidth,
            magnification,
            aperture_offset_x: state.aperture_x - aberrations.misalignment_x,
            aperture_offset_y: state.aperture_y - aberrations.misalignment_y,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("magnification", self.magnification),
            ("accelerating_voltage", self.accelerating_voltage),
            ("working_distance", self.working_distance),
            ("screen_halfwidth", self.screen_halfwidth),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidParameter(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        let finite = [
            ("focus", self.focus),
            ("stigmator_x", self.stigmator_x),
            ("stigmator_y", self.stigmator_y),
            ("aperture_offset_x", self.aperture_offset_x),
            ("aperture_offset_y", self.aperture_offset_y),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(SimError::InvalidParameter(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Elliptical blur spot.
///
/// `orientation` is the angle of the major axis measured from +x towards +y
/// in image coordinates (y down). `sigma_x` is the standard deviation along
/// the major axis and `sigma_y` across it, both in source pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamKernel {
    pub halfwidth_major_nm: f64,
    pub halfwidth_minor_nm: f64,
    pub orientation: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    /// Image displacement from a misaligned aperture while defocused,
    /// in source pixels.
    pub shift_x: f64,
    pub shift_y: f64,
}

impl BeamKernel {
    pub fn identity() -> Self {
        Self {
            halfwidth_major_nm: 0.0,
            halfwidth_minor_nm: 0.0,
            orientation: 0.0,
            sigma_x: 0.0,
            sigma_y: 0.0,
            shift_x: 0.0,
            shift_y: 0.0,
        }
    }

    /// True when convolving with this kernel is a no-op.
    pub fn is_identity(&self) -> bool {
        self.sigma_x == 0.0 && self.sigma_y == 0.0
    }

    /// Ratio of major to minor halfwidth (1.0 for a round spot).
    pub fn ellipticity(&self) -> f64 {
        if self.halfwidth_minor_nm > 0.0 {
            self.halfwidth_major_nm / self.halfwidth_minor_nm
        } else if self.halfwidth_major_nm > 0.0 {
            f64::INFINITY
        } else {
            1.0
        }
    }
}

/// Sample-plane size of one source pixel in nm.
///
/// The screen half-width spans half the displayed pixel width at unit
/// magnification.
pub fn nm_per_pixel(screen_halfwidth_mm: f64, magnification: f64) -> f64 {
    screen_halfwidth_mm / (VIEWPORT_WIDTH as f64 / 2.0) / magnification * NM_PER_MM
}

/// Closed-form beam spot model.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamModel {
    aperture_radius_mm: f64,
    reference_voltage_kv: f64,
}

impl BeamModel {
    pub fn new(aperture_radius_mm: f64, reference_voltage_kv: f64) -> Result<Self> {
        if !(aperture_radius_mm.is_finite() && aperture_radius_mm > 0.0) {
            return Err(SimError::InvalidParameter(format!(
                "aperture radius must be positive, got {aperture_radius_mm}"
            )));
        }
        if !(reference_voltage_kv.is_finite() && reference_voltage_kv > 0.0) {
            return Err(SimError::InvalidParameter(format!(
                "reference voltage must be positive, got {reference_voltage_kv}"
            )));
        }
        Ok(Self {
            aperture_radius_mm,
            reference_voltage_kv,
        })
    }

    pub fn from_config(config: &SimulatorConfig) -> Result<Self> {
        Self::new(
            config.optics.aperture_radius_mm,
            config.target_accelerating_voltage,
        )
    }

    /// Beam convergence semi-angle in radians.
    pub fn convergence_angle(&self, working_distance_mm: f64) -> f64 {
        self.aperture_radius_mm / working_distance_mm
    }

    /// Compute the blur kernel for one set of beam parameters.
    pub fn compute_kernel(&self, params: &BeamParameters) -> Result<BeamKernel> {
        params.validate()?;

        let spread = self.convergence_angle(params.working_distance)
            * (self.reference_voltage_kv / params.accelerating_voltage).sqrt();

        let half_separation = params.stigmator_x.hypot(params.stigmator_y) / 2.0;
        let aperture_offset = params.aperture_offset_x.hypot(params.aperture_offset_y);
        // Off-axis rays only spread the spot away from focus.
        let aperture_blur = aperture_offset * APERTURE_BLUR_COUPLING * params.focus.abs()
            / params.working_distance;

        let along = (params.focus + half_separation).abs() + aperture_blur;
        let across = (params.focus - half_separation).abs() + aperture_blur;
        let axis = 0.5 * params.stigmator_y.atan2(params.stigmator_x);

        let (major_mm, minor_mm, orientation) = if along >= across {
            (along, across, axis)
        } else {
            (across, along, normalize_axis(axis + FRAC_PI_2))
        };

        let halfwidth_major_nm = major_mm * spread * NM_PER_MM;
        let halfwidth_minor_nm = minor_mm * spread * NM_PER_MM;

        let px = nm_per_pixel(params.screen_halfwidth, params.magnification);

        // Tilted beam through an off-axis aperture lands displaced by
        // offset * defocus / working distance.
        let shift_scale = params.focus / params.working_distance * NM_PER_MM / px;

        Ok(BeamKernel {
            halfwidth_major_nm,
            halfwidth_minor_nm,
            orientation,
            sigma_x: halfwidth_major_nm / px,
            sigma_y: halfwidth_minor_nm / px,
            shift_x: params.aperture_offset_x * shift_scale,
            shift_y: params.aperture_offset_y * shift_scale,
        })
    }
}

/// Fold an axis angle into (-pi/2, pi/2].
fn normalize_axis(angle: f64) -> f64 {
    if angle > FRAC_PI_2 {
        angle - PI
    } else if angle <= -FRAC_PI_2 {
        angle + PI
    } else {
        angle
    }
}

/// Intrinsic defects of the simulated column. The operator cannot see these
/// directly; they have to be cancelled with the stigmator and aperture
/// controls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnAberrations {
    pub astigmatism_x: f64,
    pub astigmatism_y: f64,
    pub misalignment_x: f64,
    pub misalignment_y: f64,
}

impl ColumnAberrations {
    /// Perfectly corrected column.
    pub fn none() -> Self {
        Self::default()
    }

    /// Uniform draw within the configured limits.
    pub fn random<R: Rng>(rng: &mut R, max_astigmatism_mm: f64, max_misalignment_mm: f64) -> Self {
        let mut draw = |limit: f64| {
            if limit.is_finite() && limit > 0.0 {
                limit * rng.gen_range(-1.0..1.0)
            } else {
                0.0
            }
        };
        Self {
            astigmatism_x: draw(max_astigmatism_mm),
            astigmatism_y: draw(max_astigmatism_mm),
            misalignment_x: draw(max_misalignment_mm),
            misalignment_y: draw(max_misalignment_mm),
        }
    }

    pub fn from_config(config: &ColumnConfig) -> Self {
        if !config.randomize {
            return Self::none();
        }
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::random(
            &mut rng,
            config.max_astigmatism_mm,
            config.max_misalignment_mm,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_axis_folds_into_half_open_range() {
        assert!((normalize_axis(PI) - 0.0).abs() < 1e-12);
        assert!((normalize_axis(-FRAC_PI_2) - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(normalize_axis(0.25), 0.25);
    }

    #[test]
    fn random_aberrations_stay_within_limits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let a = ColumnAberrations::random(&mut rng, 0.5, 0.2);
            assert!(a.astigmatism_x.abs() <= 0.5 && a.astigmatism_y.abs() <= 0.5);
            assert!(a.misalignment_x.abs() <= 0.2 && a.misalignment_y.abs() <= 0.2);
        }
    }

    #[test]
    fn extreme_limits_do_not_panic() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = ColumnAberrations::random(&mut rng, 1e308, f64::INFINITY);
        assert!(a.astigmatism_x.is_finite() && a.astigmatism_y.is_finite());
        assert_eq!((a.misalignment_x, a.misalignment_y), (0.0, 0.0));
    }

    #[test]
    fn zero_limits_give_a_clean_column() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(ColumnAberrations::random(&mut rng, 0.0, 0.0), ColumnAberrations::none());
    }
}
