pub mod elliptical_blur;
pub mod fft;
pub mod levels;
pub mod noise;
