use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Shot-noise-like detector noise.
///
/// The standard deviation at signal `v` is
/// `amplitude * sqrt(v) / sqrt(beam_current * scan_speed)`: brighter pixels
/// are noisier in absolute terms, and more current or a slower scan cleans
/// the image up.
pub struct DetectorNoise {
    rng: StdRng,
    scale: f32,
}

impl DetectorNoise {
    pub fn seeded(seed: u64, amplitude: f32, beam_current: f64, scan_speed: u32) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), amplitude, beam_current, scan_speed)
    }

    pub fn from_entropy(amplitude: f32, beam_current: f64, scan_speed: u32) -> Self {
        Self::with_rng(StdRng::from_entropy(), amplitude, beam_current, scan_speed)
    }

    fn with_rng(rng: StdRng, amplitude: f32, beam_current: f64, scan_speed: u32) -> Self {
        let dose = (beam_current * scan_speed.max(1) as f64).max(f64::MIN_POSITIVE);
        Self {
            rng,
            scale: amplitude / dose.sqrt() as f32,
        }
    }

    /// Standard deviation applied at signal level `value`.
    pub fn sigma_at(&self, value: f32) -> f32 {
        self.scale * value.max(0.0).sqrt()
    }

    /// Perturb every sample in row-major order.
    pub fn apply(&mut self, data: &mut Array2<f32>) {
        if self.scale == 0.0 {
            return;
        }
        for v in data.iter_mut() {
            let z: f32 = self.rng.sample(StandardNormal);
            let signal = v.max(0.0);
            *v += self.scale * signal.sqrt() * z;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_noise() {
        let mut a = Array2::from_elem((8, 8), 0.5f32);
        let mut b = a.clone();
        DetectorNoise::seeded(11, 0.05, 1.0, 1).apply(&mut a);
        DetectorNoise::seeded(11, 0.05, 1.0, 1).apply(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn more_current_means_less_noise() {
        let low = DetectorNoise::seeded(0, 0.05, 1.0, 1);
        let high = DetectorNoise::seeded(0, 0.05, 4.0, 1);
        assert!(high.sigma_at(0.5) < low.sigma_at(0.5));
        assert!((low.sigma_at(0.5) / high.sigma_at(0.5) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn black_pixels_stay_black() {
        let mut data = Array2::<f32>::zeros((4, 4));
        DetectorNoise::seeded(3, 0.2, 1.0, 1).apply(&mut data);
        assert!(data.iter().all(|&v| v == 0.0));
    }
}
