pub mod config;
pub mod library;
pub mod render;
pub mod replay;
pub mod wobble;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use semsim_core::config::{NoiseMode, SimulatorConfig};
use semsim_core::simulator::Simulator;
use semsim_core::state::StateUpdate;
use tracing::debug;

/// Options shared by every command that opens a session.
#[derive(Args)]
pub struct SessionArgs {
    /// Calibration image directory (containing `Images/`, or `Images/` itself)
    #[arg(long)]
    pub images: Option<PathBuf>,

    /// Session config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable detector noise with this seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Randomize column astigmatism and aperture misalignment with this seed
    #[arg(long)]
    pub challenge: Option<u64>,
}

impl SessionArgs {
    pub fn build_config(&self) -> Result<SimulatorConfig> {
        let mut config = match (&self.config, &self.images) {
            (Some(path), _) => SimulatorConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            (None, Some(images)) => SimulatorConfig::new(images),
            (None, None) => anyhow::bail!("Either --images or --config is required"),
        };
        if let Some(ref images) = self.images {
            config.images_path = images.clone();
        }
        if let Some(seed) = self.seed {
            config.noise.mode = NoiseMode::Seeded(seed);
        }
        if let Some(seed) = self.challenge {
            config.column.randomize = true;
            config.column.seed = Some(seed);
        }
        Ok(config)
    }

    pub fn open(&self) -> Result<Simulator> {
        let config = self.build_config()?;
        debug!(
            images = %config.images_path.display(),
            noise = %config.noise.mode,
            challenge = config.column.randomize,
            "Session config"
        );
        Simulator::new(config).context("Failed to start session")
    }
}

/// Instrument settings; anything left out keeps its session default.
#[derive(Args)]
pub struct SettingsArgs {
    /// Sample name (defaults to the first in the library)
    #[arg(long)]
    pub sample: Option<String>,

    /// Detector name (defaults to the first for the sample)
    #[arg(long)]
    pub detector: Option<String>,

    /// Magnification (snaps to the nearest captured image)
    #[arg(long)]
    pub mag: Option<f64>,

    /// Defocus in mm (0 = in focus)
    #[arg(long, allow_hyphen_values = true)]
    pub focus: Option<f64>,

    /// Stigmator X in mm
    #[arg(long, allow_hyphen_values = true)]
    pub stig_x: Option<f64>,

    /// Stigmator Y in mm
    #[arg(long, allow_hyphen_values = true)]
    pub stig_y: Option<f64>,

    /// Aperture alignment X in mm
    #[arg(long, allow_hyphen_values = true)]
    pub aperture_x: Option<f64>,

    /// Aperture alignment Y in mm
    #[arg(long, allow_hyphen_values = true)]
    pub aperture_y: Option<f64>,

    /// Accelerating voltage in kV
    #[arg(long)]
    pub kv: Option<f64>,

    /// Working distance in mm
    #[arg(long)]
    pub wd: Option<f64>,

    /// Beam shift X in source pixels
    #[arg(long, allow_hyphen_values = true)]
    pub pan_x: Option<f64>,

    /// Beam shift Y in source pixels
    #[arg(long, allow_hyphen_values = true)]
    pub pan_y: Option<f64>,

    /// Scan rotation in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub rotation: Option<f64>,

    /// Brightness offset (-1.0 to 1.0)
    #[arg(long, allow_hyphen_values = true)]
    pub brightness: Option<f32>,

    /// Contrast (1.0 = no change)
    #[arg(long)]
    pub contrast: Option<f32>,

    /// Beam current in nA
    #[arg(long)]
    pub current: Option<f64>,

    /// Scan speed (larger is slower and cleaner)
    #[arg(long)]
    pub speed: Option<u32>,
}

impl SettingsArgs {
    pub fn to_update(&self) -> StateUpdate {
        StateUpdate {
            sample: self.sample.clone(),
            detector: self.detector.clone(),
            focus: self.focus,
            stigmator_x: self.stig_x,
            stigmator_y: self.stig_y,
            aperture_x: self.aperture_x,
            aperture_y: self.aperture_y,
            accelerating_voltage: self.kv,
            working_distance: self.wd,
            screen_halfwidth: None,
            magnification: self.mag,
            pan_x: self.pan_x,
            pan_y: self.pan_y,
            scan_rotation: self.rotation.map(f64::to_radians),
            brightness: self.brightness,
            contrast: self.contrast,
            beam_current: self.current,
            scan_speed: self.speed,
        }
    }
}

/// Switch sample first so an omitted detector falls back to one the sample has.
pub fn apply_settings(sim: &mut Simulator, settings: &SettingsArgs) -> Result<()> {
    if let Some(ref sample) = settings.sample {
        sim.select_sample(sample)
            .with_context(|| format!("Failed to select sample '{sample}'"))?;
    }
    let update = settings.to_update();
    if !update.is_empty() {
        sim.set_state(&update)
            .context("Rejected instrument settings")?;
    }
    Ok(())
}
