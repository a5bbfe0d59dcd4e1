use ndarray::{s, Array2};
use num_complex::Complex;
use rustfft::FftPlanner;

/// Convolve `data` with a centred odd-sized `kernel` in the frequency domain.
///
/// The input is padded by the kernel radius with replicated edge pixels so
/// the circular wrap-around never reaches the returned region.
pub fn convolve_fft(data: &Array2<f32>, kernel: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let (kh, kw) = kernel.dim();
    let ry = kh / 2;
    let rx = kw / 2;

    let ph = h + 2 * ry;
    let pw = w + 2 * rx;

    let padded = Array2::from_shape_fn((ph, pw), |(row, col)| {
        let src_row = (row as isize - ry as isize).clamp(0, h as isize - 1) as usize;
        let src_col = (col as isize - rx as isize).clamp(0, w as isize - 1) as usize;
        data[[src_row, src_col]]
    });

    // Kernel centre moved to (0, 0) with wrap-around.
    let mut psf = Array2::<f32>::zeros((ph, pw));
    for ((ky, kx), &v) in kernel.indexed_iter() {
        let row = (ky as isize - ry as isize).rem_euclid(ph as isize) as usize;
        let col = (kx as isize - rx as isize).rem_euclid(pw as isize) as usize;
        psf[[row, col]] += v;
    }

    let mut spectrum = fft2d(&padded);
    let kernel_spectrum = fft2d(&psf);
    spectrum.zip_mut_with(&kernel_spectrum, |a, b| *a *= *b);
    let result = ifft2d(&spectrum);

    result
        .slice(s![ry..ry + h, rx..rx + w])
        .mapv(|v| v as f32)
}

pub fn fft2d(data: &Array2<f32>) -> Array2<Complex<f64>> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft_forward(w);
    let fft_col = planner.plan_fft_forward(h);

    let mut result = data.mapv(|v| Complex::new(v as f64, 0.0));

    for mut row in result.rows_mut() {
        let mut row_data: Vec<Complex<f64>> = row.to_vec();
        fft_row.process(&mut row_data);
        for (dst, src) in row.iter_mut().zip(row_data) {
            *dst = src;
        }
    }

    for mut col in result.columns_mut() {
        let mut col_data: Vec<Complex<f64>> = col.to_vec();
        fft_col.process(&mut col_data);
        for (dst, src) in col.iter_mut().zip(col_data) {
            *dst = src;
        }
    }

    result
}

pub fn ifft2d(data: &Array2<Complex<f64>>) -> Array2<f64> {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let ifft_row = planner.plan_fft_inverse(w);
    let ifft_col = planner.plan_fft_inverse(h);

    let mut work = data.clone();

    for mut col in work.columns_mut() {
        let mut col_data: Vec<Complex<f64>> = col.to_vec();
        ifft_col.process(&mut col_data);
        for (dst, src) in col.iter_mut().zip(col_data) {
            *dst = src;
        }
    }

    for mut row in work.rows_mut() {
        let mut row_data: Vec<Complex<f64>> = row.to_vec();
        ifft_row.process(&mut row_data);
        for (dst, src) in row.iter_mut().zip(row_data) {
            *dst = src;
        }
    }

    let scale = 1.0 / (h * w) as f64;
    work.mapv(|c| c.re * scale)
}
