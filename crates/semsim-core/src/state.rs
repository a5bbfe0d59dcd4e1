use serde::{Deserialize, Serialize};

use crate::config::SimulatorConfig;
use crate::error::{Result, SimError};

/// Instrument settings as set by the operator.
///
/// Lengths are in mm, voltage in kV, current in nA, angles in radians.
/// `pan_x`/`pan_y` are beam-shift offsets in source pixels of the current
/// calibration image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MicroscopeState {
    pub sample: String,
    pub detector: String,
    /// Signed defocus offset; 0.0 is perfect focus.
    pub focus: f64,
    pub stigmator_x: f64,
    pub stigmator_y: f64,
    /// Objective aperture alignment controls.
    pub aperture_x: f64,
    pub aperture_y: f64,
    pub accelerating_voltage: f64,
    pub working_distance: f64,
    pub screen_halfwidth: f64,
    pub magnification: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub scan_rotation: f64,
    /// Added after contrast, in normalized intensity units (0.0 = no change).
    pub brightness: f32,
    /// Contrast gain setting (1.0 = no change).
    pub contrast: f32,
    pub beam_current: f64,
    /// Dwell setting; larger is slower and less noisy.
    pub scan_speed: u32,
}

impl Default for MicroscopeState {
    fn default() -> Self {
        Self::from_config(&SimulatorConfig::default())
    }
}

impl MicroscopeState {
    /// Initial settings for a new session.
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self {
            sample: String::new(),
            detector: String::new(),
            focus: 0.0,
            stigmator_x: 0.0,
            stigmator_y: 0.0,
            aperture_x: 0.0,
            aperture_y: 0.0,
            accelerating_voltage: config.target_accelerating_voltage,
            working_distance: config.initial.working_distance,
            screen_halfwidth: config.screen_halfwidth,
            magnification: config.initial.magnification,
            pan_x: 0.0,
            pan_y: 0.0,
            scan_rotation: 0.0,
            brightness: 0.0,
            contrast: 1.0,
            beam_current: config.initial.beam_current,
            scan_speed: config.initial.scan_speed,
        }
    }

    /// Check every physical setting is inside its domain.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("focus", self.focus),
            ("stigmator_x", self.stigmator_x),
            ("stigmator_y", self.stigmator_y),
            ("aperture_x", self.aperture_x),
            ("aperture_y", self.aperture_y),
            ("pan_x", self.pan_x),
            ("pan_y", self.pan_y),
            ("scan_rotation", self.scan_rotation),
            ("brightness", self.brightness as f64),
            ("contrast", self.contrast as f64),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(SimError::InvalidParameter(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }

        let positive = [
            ("magnification", self.magnification),
            ("accelerating_voltage", self.accelerating_voltage),
            ("working_distance", self.working_distance),
            ("screen_halfwidth", self.screen_halfwidth),
            ("beam_current", self.beam_current),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::InvalidParameter(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        if self.contrast < 0.0 {
            return Err(SimError::InvalidParameter(format!(
                "contrast must be non-negative, got {}",
                self.contrast
            )));
        }
        if self.scan_speed == 0 {
            return Err(SimError::InvalidParameter(
                "scan_speed must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Return a copy with `update` applied, or an error leaving `self` untouched.
    pub fn apply(&self, update: &StateUpdate) -> Result<MicroscopeState> {
        let mut next = self.clone();
        update.write_into(&mut next);
        next.validate()?;
        Ok(next)
    }

    /// Focus modulated by `amplitude * sin(tick)`, used for aperture alignment.
    pub fn wobbled(&self, amplitude: f64, tick: u64) -> MicroscopeState {
        let mut next = self.clone();
        next.focus = self.focus + amplitude * (tick as f64).sin();
        next
    }

    /// Width of the displayed field in micrometres.
    pub fn field_of_view_um(&self) -> f64 {
        2.0 * self.screen_halfwidth * 1000.0 / self.magnification
    }

    pub fn data_zone(&self) -> DataZone {
        DataZone {
            accelerating_voltage: self.accelerating_voltage,
            working_distance: self.working_distance,
            magnification: self.magnification,
            beam_current: self.beam_current,
            field_of_view_um: self.field_of_view_um(),
        }
    }
}

/// Partial settings change sent by the control surface. `None` leaves the
/// current value in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateUpdate {
    pub sample: Option<String>,
    pub detector: Option<String>,
    pub focus: Option<f64>,
    pub stigmator_x: Option<f64>,
    pub stigmator_y: Option<f64>,
    pub aperture_x: Option<f64>,
    pub aperture_y: Option<f64>,
    pub accelerating_voltage: Option<f64>,
    pub working_distance: Option<f64>,
    pub screen_halfwidth: Option<f64>,
    pub magnification: Option<f64>,
    pub pan_x: Option<f64>,
    pub pan_y: Option<f64>,
    pub scan_rotation: Option<f64>,
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub beam_current: Option<f64>,
    pub scan_speed: Option<u32>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        *self == StateUpdate::default()
    }

    fn write_into(&self, state: &mut MicroscopeState) {
        if let Some(ref sample) = self.sample {
            state.sample = sample.clone();
        }
        if let Some(ref detector) = self.detector {
            state.detector = detector.clone();
        }
        set(&mut state.focus, self.focus);
        set(&mut state.stigmator_x, self.stigmator_x);
        set(&mut state.stigmator_y, self.stigmator_y);
        set(&mut state.aperture_x, self.aperture_x);
        set(&mut state.aperture_y, self.aperture_y);
        set(&mut state.accelerating_voltage, self.accelerating_voltage);
        set(&mut state.working_distance, self.working_distance);
        set(&mut state.screen_halfwidth, self.screen_halfwidth);
        set(&mut state.magnification, self.magnification);
        set(&mut state.pan_x, self.pan_x);
        set(&mut state.pan_y, self.pan_y);
        set(&mut state.scan_rotation, self.scan_rotation);
        set(&mut state.brightness, self.brightness);
        set(&mut state.contrast, self.contrast);
        set(&mut state.beam_current, self.beam_current);
        set(&mut state.scan_speed, self.scan_speed);
    }
}

fn set<T: Copy>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

/// Instrument status line shown under the live image.
#[derive(Clone, Debug, PartialEq)]
pub struct DataZone {
    pub accelerating_voltage: f64,
    pub working_distance: f64,
    pub magnification: f64,
    pub beam_current: f64,
    pub field_of_view_um: f64,
}

impl std::fmt::Display for DataZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HV = {:.3} kV   WD = {:.3} mm   Mag = {:.0}x   Ip = {} nA   FOV = {:.2} um",
            self.accelerating_voltage,
            self.working_distance,
            self.magnification,
            self.beam_current,
            self.field_of_view_um
        )
    }
}
