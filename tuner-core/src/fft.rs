//! # Fast Fourier Transform (FFT) Module
//!
//! Frequency-domain helpers built on RustFFT:
//! - FFT-based linear convolution, an alternative to direct FIR convolution
//!   for stricter real-time budgets
//! - Hann windowing, used when designing FIR taps
//! - A spectrum peak-bin frequency estimate, shown by `reed-tuner analyze`
//!   as a cross-check against the autocorrelation pitch estimator

use rustfft::{num_complex::Complex, FftPlanner};

/// Applies a symmetric Hann window to the buffer in place.
///
/// The first and last coefficients are zero. A single-sample buffer is
/// left untouched.
///
/// # Arguments
/// * `buffer` - Samples or filter taps to window (modified in-place)
pub fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 { return; }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Convolves `signal` with `taps` through the frequency domain and keeps only
/// the first `signal.len()` output samples.
///
/// Matches [`crate::filter::convolve_truncated`] within floating-point
/// tolerance. Cost is O((L + M) log(L + M)) instead of O(L * M).
///
/// # Arguments
/// * `signal` - Input samples
/// * `taps` - FIR impulse response
///
/// # Returns
/// * `Vec<f32>` - Exactly `signal.len()` samples
pub fn convolve_truncated_fft(signal: &[f32], taps: &[f32]) -> Vec<f32> {
    if signal.is_empty() {
        return Vec::new();
    }
    if taps.is_empty() {
        return vec![0.0; signal.len()];
    }

    let full_len = signal.len() + taps.len() - 1;
    let fft_len = full_len.next_power_of_two();

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut signal_spectrum = to_complex_padded(signal, fft_len);
    let mut taps_spectrum = to_complex_padded(taps, fft_len);
    forward.process(&mut signal_spectrum);
    forward.process(&mut taps_spectrum);

    for (s, t) in signal_spectrum.iter_mut().zip(taps_spectrum.iter()) {
        *s *= *t;
    }
    inverse.process(&mut signal_spectrum);

    // RustFFT leaves the inverse transform unnormalised.
    let scale = 1.0 / fft_len as f32;
    signal_spectrum
        .iter()
        .take(signal.len())
        .map(|c| c.re * scale)
        .collect()
}

fn to_complex_padded(samples: &[f32], len: usize) -> Vec<Complex<f32>> {
    let mut buffer: Vec<Complex<f32>> = samples
        .iter()
        .map(|&sample| Complex { re: sample, im: 0.0 })
        .collect();
    buffer.resize(len, Complex { re: 0.0, im: 0.0 });
    buffer
}

/// Magnitudes of the bins below Nyquist for a mean-removed, Hann-windowed
/// copy of `signal`.
fn magnitude_spectrum(signal: &[f32]) -> Vec<f32> {
    let mean = signal.iter().sum::<f32>() / signal.len() as f32;
    let mut centred: Vec<f32> = signal.iter().map(|&s| s - mean).collect();
    apply_hann_window(&mut centred);

    let mut spectrum = to_complex_padded(&centred, centred.len());
    FftPlanner::<f32>::new()
        .plan_fft_forward(spectrum.len())
        .process(&mut spectrum);

    let bins = spectrum.len() / 2;
    spectrum.iter().take(bins).map(|c| c.norm()).collect()
}

/// Frequency of the strongest spectrum bin, `bin * nyquist / bin_count`.
///
/// Resolution is one bin (`sample_rate / signal.len()` Hz), far coarser than
/// the autocorrelation estimator at tuner frequencies. Returns `None` for a
/// buffer too short to transform or one with no energy.
pub fn dominant_frequency(signal: &[f32], sample_rate: u32) -> Option<f32> {
    if signal.len() < 2 {
        return None;
    }
    let magnitudes = magnitude_spectrum(signal);

    let (peak_bin, &peak) = magnitudes
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))?;
    if !peak.is_finite() || peak <= 0.0 {
        return None;
    }

    let nyquist = sample_rate as f32 / 2.0;
    Some(peak_bin as f32 * nyquist / magnitudes.len() as f32)
}
