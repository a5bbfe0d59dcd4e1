use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_ACCELERATING_VOLTAGE_KV, DEFAULT_APERTURE_RADIUS_MM, DEFAULT_BEAM_CURRENT_NA,
    DEFAULT_KERNEL_TRUNCATION_SIGMAS, DEFAULT_MAX_ASTIGMATISM_MM, DEFAULT_MAX_KERNEL_RADIUS_PX,
    DEFAULT_MAX_MISALIGNMENT_MM, DEFAULT_NOISE_AMPLITUDE, DEFAULT_SCREEN_HALFWIDTH_MM,
    DEFAULT_WORKING_DISTANCE_MM, MAX_COLUMN_DEFECT_MM,
};
use crate::error::{Result, SimError};

/// Session configuration supplied once by the surrounding application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Directory holding `Images/<Sample>/<Detector>/<Magnification>.<ext>`,
    /// or the `Images` directory itself.
    pub images_path: PathBuf,
    /// Accelerating voltage (kV) the session starts at and the optics are
    /// referenced to.
    #[serde(default = "default_voltage")]
    pub target_accelerating_voltage: f64,
    /// Half-width of the imaging screen in mm.
    #[serde(default = "default_screen_halfwidth")]
    pub screen_halfwidth: f64,
    #[serde(default)]
    pub optics: OpticsConfig,
    #[serde(default)]
    pub noise: NoiseConfig,
    #[serde(default)]
    pub column: ColumnConfig,
    #[serde(default)]
    pub initial: InitialSettings,
}

fn default_voltage() -> f64 {
    DEFAULT_ACCELERATING_VOLTAGE_KV
}

fn default_screen_halfwidth() -> f64 {
    DEFAULT_SCREEN_HALFWIDTH_MM
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            images_path: PathBuf::from("."),
            target_accelerating_voltage: DEFAULT_ACCELERATING_VOLTAGE_KV,
            screen_halfwidth: DEFAULT_SCREEN_HALFWIDTH_MM,
            optics: OpticsConfig::default(),
            noise: NoiseConfig::default(),
            column: ColumnConfig::default(),
            initial: InitialSettings::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn new(images_path: impl Into<PathBuf>) -> Self {
        Self {
            images_path: images_path.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SimulatorConfig =
            toml::from_str(contents).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SimError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("target_accelerating_voltage", self.target_accelerating_voltage),
            ("screen_halfwidth", self.screen_halfwidth),
            ("optics.aperture_radius_mm", self.optics.aperture_radius_mm),
            ("optics.kernel_truncation_sigmas", self.optics.kernel_truncation_sigmas),
            ("initial.working_distance", self.initial.working_distance),
            ("initial.magnification", self.initial.magnification),
            ("initial.beam_current", self.initial.beam_current),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.optics.max_kernel_radius_px == 0 {
            return Err(SimError::Config(
                "optics.max_kernel_radius_px must be at least 1".into(),
            ));
        }
        if !(self.noise.amplitude.is_finite() && self.noise.amplitude >= 0.0) {
            return Err(SimError::Config(format!(
                "noise.amplitude must be non-negative, got {}",
                self.noise.amplitude
            )));
        }
        let column_limits = [
            ("column.max_astigmatism_mm", self.column.max_astigmatism_mm),
            ("column.max_misalignment_mm", self.column.max_misalignment_mm),
        ];
        for (name, value) in column_limits {
            if !(0.0..=MAX_COLUMN_DEFECT_MM).contains(&value) {
                return Err(SimError::Config(format!(
                    "{name} must be within 0..={MAX_COLUMN_DEFECT_MM}, got {value}"
                )));
            }
        }
        if self.initial.scan_speed == 0 {
            return Err(SimError::Config(
                "initial.scan_speed must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Optical constants of the simulated column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticsConfig {
    /// Objective aperture radius; with the working distance it sets the beam
    /// convergence semi-angle.
    pub aperture_radius_mm: f64,
    /// Blur kernels are cut off at this many standard deviations.
    pub kernel_truncation_sigmas: f64,
    /// Hard cap on blur kernel radius in source pixels.
    pub max_kernel_radius_px: usize,
}

impl Default for OpticsConfig {
    fn default() -> Self {
        Self {
            aperture_radius_mm: DEFAULT_APERTURE_RADIUS_MM,
            kernel_truncation_sigmas: DEFAULT_KERNEL_TRUNCATION_SIGMAS,
            max_kernel_radius_px: DEFAULT_MAX_KERNEL_RADIUS_PX,
        }
    }
}

/// How detector noise is generated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseMode {
    /// Deterministic rendering: no noise at all.
    #[default]
    Disabled,
    /// Reproducible noise from a fixed seed.
    Seeded(u64),
    /// Fresh noise every frame.
    Entropy,
}

impl std::fmt::Display for NoiseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoiseMode::Disabled => write!(f, "Disabled"),
            NoiseMode::Seeded(seed) => write!(f, "Seeded ({seed})"),
            NoiseMode::Entropy => write!(f, "Entropy"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub mode: NoiseMode,
    /// Relative noise level at full signal, unit current and scan speed 1.
    pub amplitude: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            mode: NoiseMode::default(),
            amplitude: DEFAULT_NOISE_AMPLITUDE,
        }
    }
}

/// Hidden column defects the operator has to find and correct.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Draw random intrinsic astigmatism and aperture misalignment.
    pub randomize: bool,
    /// Seed for the draw; `None` picks one from entropy.
    pub seed: Option<u64>,
    pub max_astigmatism_mm: f64,
    pub max_misalignment_mm: f64,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            randomize: false,
            seed: None,
            max_astigmatism_mm: DEFAULT_MAX_ASTIGMATISM_MM,
            max_misalignment_mm: DEFAULT_MAX_MISALIGNMENT_MM,
        }
    }
}

/// Instrument settings at session start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialSettings {
    pub working_distance: f64,
    /// Replaced by the lowest captured magnification once a sample is chosen.
    pub magnification: f64,
    pub beam_current: f64,
    pub scan_speed: u32,
}

impl Default for InitialSettings {
    fn default() -> Self {
        Self {
            working_distance: DEFAULT_WORKING_DISTANCE_MM,
            magnification: 100.0,
            beam_current: DEFAULT_BEAM_CURRENT_NA,
            scan_speed: 1,
        }
    }
}
