use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::beam::{BeamModel, BeamParameters, ColumnAberrations};
use crate::compositor::Compositor;
use crate::config::{NoiseMode, SimulatorConfig};
use crate::error::{Result, SimError};
use crate::filters::levels::Photometry;
use crate::filters::noise::DetectorNoise;
use crate::frame::Frame;
use crate::io::params::{save_frame, ParamsRecord};
use crate::library::CalibrationLibrary;
use crate::state::{DataZone, MicroscopeState, StateUpdate};
use crate::viewport::ViewportResolver;

/// One training session: the calibration library, the operator's settings,
/// the hidden column defects and the last good frame.
///
/// Every settings change is validated and rendered before it is committed,
/// so a rejected change leaves both the state and the frame untouched.
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    library: CalibrationLibrary,
    beam_model: BeamModel,
    resolver: ViewportResolver,
    compositor: Compositor,
    aberrations: ColumnAberrations,
    state: MicroscopeState,
    frame: Option<Frame>,
    render_count: u64,
}

impl Simulator {
    /// Open the library at `config.images_path` and render the first frame.
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let library = CalibrationLibrary::open(&config.images_path)?;
        Self::with_library(config, library)
    }

    /// Start a session on an already opened library.
    ///
    /// The first sample and detector are selected at their lowest captured
    /// magnification. An empty library gives a session with no frame.
    pub fn with_library(config: SimulatorConfig, library: CalibrationLibrary) -> Result<Self> {
        config.validate()?;
        let beam_model = BeamModel::from_config(&config)?;
        let compositor = Compositor::from_config(&config);
        let aberrations = ColumnAberrations::from_config(&config.column);
        if config.column.randomize {
            debug!(?aberrations, "Column aberrations drawn");
        }

        let mut state = MicroscopeState::from_config(&config);
        if let Some(sample) = library.samples().into_iter().next() {
            if let Some(detector) = library.detectors(&sample).into_iter().next() {
                if let Some(&lowest) = library.magnifications(&sample, &detector).first() {
                    state.magnification = lowest;
                }
                state.detector = detector;
            }
            state.sample = sample;
        }

        let mut simulator = Self {
            config,
            library,
            beam_model,
            resolver: ViewportResolver::default(),
            compositor,
            aberrations,
            state,
            frame: None,
            render_count: 0,
        };

        if !simulator.state.sample.is_empty() {
            match simulator.render() {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "Initial render failed, starting without a frame");
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            sample = %simulator.state.sample,
            detector = %simulator.state.detector,
            magnification = simulator.state.magnification,
            noise = %simulator.config.noise.mode,
            "Session started"
        );
        Ok(simulator)
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn state(&self) -> &MicroscopeState {
        &self.state
    }

    pub fn aberrations(&self) -> &ColumnAberrations {
        &self.aberrations
    }

    pub fn library(&self) -> &CalibrationLibrary {
        &self.library
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn data_zone(&self) -> DataZone {
        self.state.data_zone()
    }

    /// Apply a partial settings change and render it.
    ///
    /// On error the previous state and frame are kept.
    pub fn set_state(&mut self, update: &StateUpdate) -> Result<&Frame> {
        let next = self.state.apply(update)?;
        let frame = self.render_state(&next)?;
        self.state = next;
        Ok(self.frame.insert(frame))
    }

    /// Switch sample, keeping the detector when the new sample has it.
    pub fn select_sample(&mut self, sample: &str) -> Result<&Frame> {
        let detectors = self.library.detectors(sample);
        let detector = if detectors.contains(&self.state.detector) {
            self.state.detector.clone()
        } else {
            detectors
                .into_iter()
                .next()
                .ok_or_else(|| SimError::NotFound {
                    sample: sample.to_string(),
                    detector: self.state.detector.clone(),
                    magnification: self.state.magnification,
                })?
        };
        self.set_state(&StateUpdate {
            sample: Some(sample.to_string()),
            detector: Some(detector),
            ..StateUpdate::default()
        })
    }

    /// Re-render the current state (fresh noise if noise is enabled).
    pub fn render(&mut self) -> Result<&Frame> {
        let state = self.state.clone();
        let frame = self.render_state(&state)?;
        Ok(self.frame.insert(frame))
    }

    /// Render arbitrary settings without committing them.
    pub fn render_preview(&mut self, state: &MicroscopeState) -> Result<Frame> {
        state.validate()?;
        self.render_state(state)
    }

    /// One step of a focus wobble around the current focus.
    pub fn render_wobble(&mut self, amplitude: f64, tick: u64) -> Result<Frame> {
        let wobbled = self.state.wobbled(amplitude, tick);
        self.render_preview(&wobbled)
    }

    /// Set the controls so the effective beam parameters match a saved
    /// sidecar, then render.
    ///
    /// The sidecar records the captured magnification, so the replayed frame
    /// shows the captured field of view rather than the one originally
    /// requested. The kernel is reproduced either way.
    pub fn apply_params(&mut self, record: &ParamsRecord) -> Result<&Frame> {
        record.beam.validate()?;
        let b = &record.beam;
        let a = self.aberrations;
        self.set_state(&StateUpdate {
            focus: Some(b.focus),
            stigmator_x: Some(b.stigmator_x - a.astigmatism_x),
            stigmator_y: Some(b.stigmator_y - a.astigmatism_y),
            aperture_x: Some(b.aperture_offset_x + a.misalignment_x),
            aperture_y: Some(b.aperture_offset_y + a.misalignment_y),
            accelerating_voltage: Some(b.accelerating_voltage),
            working_distance: Some(b.working_distance),
            screen_halfwidth: Some(b.screen_halfwidth),
            magnification: Some(b.magnification),
            ..StateUpdate::default()
        })
    }

    /// Save the current frame as PNG with its parameter sidecar. Returns the
    /// sidecar path.
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let frame = self.frame.as_ref().ok_or(SimError::NoFrame)?;
        let sidecar = save_frame(frame, path)?;
        info!(
            image = %path.display(),
            sidecar = %sidecar.display(),
            "Saved frame"
        );
        Ok(sidecar)
    }

    fn render_state(&mut self, state: &MicroscopeState) -> Result<Frame> {
        let start = Instant::now();
        let resolved = self
            .library
            .resolve(&state.sample, &state.detector, state.magnification)?;
        let image = resolved.image;
        let effective = resolved.effective_magnification;

        let beam = BeamParameters::from_state(state, &self.aberrations, effective);
        let kernel = self.beam_model.compute_kernel(&beam)?;
        let viewport = self.resolver.resolve(
            state,
            effective,
            image.size(),
            (kernel.shift_x, kernel.shift_y),
        )?;

        let mut noise = self.noise_for(state);
        let data = self.compositor.render(
            &image.data,
            &viewport,
            &kernel,
            &Photometry::from_state(state),
            noise.as_mut(),
        );
        self.render_count += 1;

        debug!(
            sample = %state.sample,
            detector = %state.detector,
            requested_mag = state.magnification,
            effective_mag = effective,
            halfwidth_major_nm = kernel.halfwidth_major_nm,
            halfwidth_minor_nm = kernel.halfwidth_minor_nm,
            orientation = kernel.orientation,
            scale = viewport.scale,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Rendered frame"
        );

        Ok(Frame {
            data,
            state: state.clone(),
            beam,
            kernel,
            viewport,
            effective_magnification: effective,
        })
    }

    fn noise_for(&self, state: &MicroscopeState) -> Option<DetectorNoise> {
        let amplitude = self.config.noise.amplitude;
        match self.config.noise.mode {
            NoiseMode::Disabled => None,
            NoiseMode::Seeded(seed) => Some(DetectorNoise::seeded(
                seed.wrapping_add(self.render_count),
                amplitude,
                state.beam_current,
                state.scan_speed,
            )),
            NoiseMode::Entropy => Some(DetectorNoise::from_entropy(
                amplitude,
                state.beam_current,
                state.scan_speed,
            )),
        }
    }
}
