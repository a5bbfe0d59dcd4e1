/// Width of the visible scan field in output pixels.
pub const VIEWPORT_WIDTH: usize = 512;

/// Height of the visible scan field in output pixels.
pub const VIEWPORT_HEIGHT: usize = 384;

/// Nominal calibration raster width; the viewport covers its central half.
pub const NOMINAL_SOURCE_WIDTH: usize = 1024;

/// Nominal calibration raster height.
pub const NOMINAL_SOURCE_HEIGHT: usize = 768;

/// Half-width of the projection screen the calibration images were taken
/// against: half of a 4.5 in wide screen, in mm.
pub const DEFAULT_SCREEN_HALFWIDTH_MM: f64 = 57.15;

/// Accelerating voltage the optics are referenced to when none is configured.
pub const DEFAULT_ACCELERATING_VOLTAGE_KV: f64 = 15.0;

/// Default sample-to-lens distance.
pub const DEFAULT_WORKING_DISTANCE_MM: f64 = 10.0;

/// Default objective aperture radius. Together with a 10 mm working distance
/// this gives a 10 mrad convergence semi-angle.
pub const DEFAULT_APERTURE_RADIUS_MM: f64 = 0.1;

/// Extra blur per unit of aperture tilt (offset over working distance), as a
/// fraction of the defocus.
pub const APERTURE_BLUR_COUPLING: f64 = 1e-2;

/// Nanometres per millimetre.
pub const NM_PER_MM: f64 = 1e6;

/// Gaussian kernels are truncated at this many standard deviations.
pub const DEFAULT_KERNEL_TRUNCATION_SIGMAS: f64 = 3.0;

/// Upper bound on the blur kernel radius in source pixels.
pub const DEFAULT_MAX_KERNEL_RADIUS_PX: usize = 64;

/// Kernels with a larger radius are convolved in the frequency domain.
pub const DIRECT_CONVOLUTION_MAX_RADIUS: usize = 10;

/// Sigma floor for the thin axis of a line-shaped (fully astigmatic) kernel.
pub const MIN_AXIS_SIGMA_PX: f64 = 0.3;

/// Kernel taps below this fraction of the peak weight are dropped.
pub const KERNEL_TAP_CUTOFF: f32 = 1e-4;

/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Relative standard deviation of detector noise at full signal, unit beam
/// current and the fastest scan speed.
pub const DEFAULT_NOISE_AMPLITUDE: f32 = 0.04;

/// Default beam current in nA.
pub const DEFAULT_BEAM_CURRENT_NA: f64 = 1.0;

/// Largest intrinsic column astigmatism drawn for a challenge session (mm).
pub const DEFAULT_MAX_ASTIGMATISM_MM: f64 = 0.5;

/// Largest aperture misalignment drawn for a challenge session (mm).
pub const DEFAULT_MAX_MISALIGNMENT_MM: f64 = 0.2;

/// Upper bound accepted for either challenge limit (mm).
pub const MAX_COLUMN_DEFECT_MM: f64 = 10.0;

/// Suffix appended to the image stem for the saved parameter sidecar.
pub const PARAMS_SIDECAR_SUFFIX: &str = "_params.txt";
