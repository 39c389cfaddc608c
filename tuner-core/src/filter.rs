//! # Band-Pass Filter Module
//!
//! Optional band-limiting applied before pitch estimation. Three strategies
//! share the [`BandPass`] interface:
//! - [`NoneFilter`]: passthrough
//! - [`FirFilter`]: Hann-windowed sinc band-pass, direct or FFT convolution
//! - [`BiquadBandPassFilter`]: a high-pass biquad at the low cutoff cascaded
//!   with a low-pass biquad at the high cutoff
//!
//! Every strategy returns a buffer of exactly the input length and keeps no
//! state between calls. The biquad cascade therefore starts from zero
//! initial conditions on every buffer and shows a short startup transient
//! at the head of each output.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::config::TunerConfig;
use crate::error::ConfigError;
use crate::fft;

/// Quality factor of every biquad section (maximally flat response).
pub const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Which band-limiting strategy runs before pitch estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Analyse the raw buffer
    #[default]
    None,
    /// Windowed-sinc FIR band-pass
    Fir,
    /// Cascaded biquad band-pass
    BiquadBandPass,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::None => "none",
            FilterKind::Fir => "fir",
            FilterKind::BiquadBandPass => "biquad",
        };
        f.write_str(name)
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(FilterKind::None),
            "fir" => Ok(FilterKind::Fir),
            "biquad" | "biquad_band_pass" | "iir" => Ok(FilterKind::BiquadBandPass),
            other => Err(format!("unknown filter kind '{other}' (expected none, fir or biquad)")),
        }
    }
}

/// How the FIR filter evaluates its convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvolutionMode {
    /// Direct O(N * M) sum
    #[default]
    Direct,
    /// Frequency-domain product through RustFFT
    Fft,
}

/// Validated band-pass parameters: `0 < low < high < sample_rate / 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    low_cutoff_hz: f32,
    high_cutoff_hz: f32,
    sample_rate_hz: u32,
    order: usize,
}

impl FilterSpec {
    pub fn new(
        low_cutoff_hz: f32,
        high_cutoff_hz: f32,
        sample_rate_hz: u32,
        order: usize,
    ) -> Result<Self, ConfigError> {
        if sample_rate_hz == 0 {
            return Err(ConfigError::InvalidSampleRate(sample_rate_hz));
        }
        if order == 0 {
            return Err(ConfigError::InvalidOrder(order));
        }
        let nyquist = sample_rate_hz as f32 / 2.0;
        let valid = low_cutoff_hz.is_finite()
            && high_cutoff_hz.is_finite()
            && low_cutoff_hz > 0.0
            && low_cutoff_hz < high_cutoff_hz
            && high_cutoff_hz < nyquist;
        if !valid {
            return Err(ConfigError::InvalidCutoffs {
                low: low_cutoff_hz,
                high: high_cutoff_hz,
                nyquist,
            });
        }
        Ok(Self { low_cutoff_hz, high_cutoff_hz, sample_rate_hz, order })
    }

    pub fn low_cutoff_hz(&self) -> f32 {
        self.low_cutoff_hz
    }

    pub fn high_cutoff_hz(&self) -> f32 {
        self.high_cutoff_hz
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn nyquist_hz(&self) -> f32 {
        self.sample_rate_hz as f32 / 2.0
    }
}

/// Common interface of the band-limiting strategies.
pub trait BandPass: Send + Sync {
    /// Filters `buffer`, returning exactly `buffer.len()` samples.
    fn apply(&self, buffer: &[f32]) -> Vec<f32>;

    fn kind(&self) -> FilterKind;

    /// Parameters the filter was designed for; `None` for the passthrough.
    fn spec(&self) -> Option<&FilterSpec>;
}

/// Returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneFilter;

impl BandPass for NoneFilter {
    fn apply(&self, buffer: &[f32]) -> Vec<f32> {
        buffer.to_vec()
    }

    fn kind(&self) -> FilterKind {
        FilterKind::None
    }

    fn spec(&self) -> Option<&FilterSpec> {
        None
    }
}

/// Windowed-sinc FIR band-pass with `order + 1` taps.
#[derive(Debug, Clone)]
pub struct FirFilter {
    spec: FilterSpec,
    taps: Vec<f32>,
    mode: ConvolutionMode,
}

impl FirFilter {
    pub fn new(spec: FilterSpec) -> Self {
        Self::with_mode(spec, ConvolutionMode::Direct)
    }

    pub fn with_mode(spec: FilterSpec, mode: ConvolutionMode) -> Self {
        let taps = design_band_pass_taps(&spec);
        Self { spec, taps, mode }
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    pub fn mode(&self) -> ConvolutionMode {
        self.mode
    }
}

impl BandPass for FirFilter {
    fn apply(&self, buffer: &[f32]) -> Vec<f32> {
        match self.mode {
            ConvolutionMode::Direct => convolve_truncated(buffer, &self.taps),
            ConvolutionMode::Fft => fft::convolve_truncated_fft(buffer, &self.taps),
        }
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Fir
    }

    fn spec(&self) -> Option<&FilterSpec> {
        Some(&self.spec)
    }
}

/// Designs the band-pass impulse response as the difference of two ideal
/// low-pass responses, `Wh*sinc(Wh*n) - Wl*sinc(Wl*n)` with
/// `W = cutoff / nyquist`, tapered by a Hann window.
///
/// The center tap takes the limit value `Wh - Wl`. For odd orders the taps
/// straddle the center and no tap sits at `n = 0`.
pub fn design_band_pass_taps(spec: &FilterSpec) -> Vec<f32> {
    let nyquist = spec.sample_rate_hz as f64 / 2.0;
    let wl = spec.low_cutoff_hz as f64 / nyquist;
    let wh = spec.high_cutoff_hz as f64 / nyquist;
    let center = spec.order as f64 / 2.0;

    let mut taps: Vec<f32> = (0..=spec.order)
        .map(|k| {
            let n = k as f64 - center;
            if n == 0.0 {
                (wh - wl) as f32
            } else {
                (((PI * wh * n).sin() - (PI * wl * n).sin()) / (PI * n)) as f32
            }
        })
        .collect();

    fft::apply_hann_window(&mut taps);
    taps
}

/// Causal convolution `y[i] = sum_k taps[k] * signal[i - k]`, truncated to
/// the input length. The tail a full linear convolution would produce is
/// dropped, never padded.
pub fn convolve_truncated(signal: &[f32], taps: &[f32]) -> Vec<f32> {
    (0..signal.len())
        .map(|i| {
            taps.iter()
                .take(i + 1)
                .enumerate()
                .map(|(k, &h)| h * signal[i - k])
                .sum::<f32>()
        })
        .collect()
}

/// One second-order IIR section with unnormalised coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a0: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Biquad {
    fn compute(f: f32, sample_rate: f32, q: f32) -> (f32, f32) {
        let w0 = 2.0 * std::f32::consts::PI * f / sample_rate;
        let alpha = w0.sin() / (2.0 * q);

        (w0, alpha)
    }

    pub fn low_pass(f: f32, sample_rate: f32, q: f32) -> Self {
        let (w0, alpha) = Self::compute(f, sample_rate, q);
        let cos_w0 = w0.cos();
        Biquad {
            b0: (1.0 - cos_w0) / 2.0,
            b1: 1.0 - cos_w0,
            b2: (1.0 - cos_w0) / 2.0,
            a0: 1.0 + alpha,
            a1: -2.0 * cos_w0,
            a2: 1.0 - alpha,
        }
    }

    pub fn high_pass(f: f32, sample_rate: f32, q: f32) -> Self {
        let (w0, alpha) = Self::compute(f, sample_rate, q);
        let cos_w0 = w0.cos();
        Biquad {
            b0: (1.0 + cos_w0) / 2.0,
            b1: -(1.0 + cos_w0),
            b2: (1.0 + cos_w0) / 2.0,
            a0: 1.0 + alpha,
            a1: -2.0 * cos_w0,
            a2: 1.0 - alpha,
        }
    }

    /// Runs the section over `input` from zero initial conditions.
    ///
    /// The recurrence starts at index 2; `y[0]` and `y[1]` stay at zero.
    pub fn run(&self, input: &[f32]) -> Vec<f32> {
        let b0 = self.b0 / self.a0;
        let b1 = self.b1 / self.a0;
        let b2 = self.b2 / self.a0;
        let a1 = self.a1 / self.a0;
        let a2 = self.a2 / self.a0;

        let mut output = vec![0.0; input.len()];
        for i in 2..input.len() {
            output[i] = b0 * input[i] + b1 * input[i - 1] + b2 * input[i - 2]
                - a1 * output[i - 1]
                - a2 * output[i - 2];
        }
        output
    }
}

/// High-pass sections at the low cutoff followed by low-pass sections at
/// the high cutoff. Each cutoff gets `max(1, order / 2)` sections.
///
/// State is not carried between calls, so every buffer starts with the
/// sections' settling transient. For loud input (around 0.8 peak at the
/// default 115-250 Hz band) the transient pulls the head of the output well
/// off zero mean and the autocorrelation estimator reports no pitch, or an
/// octave below for low notes. Quieter input is tracked correctly.
#[derive(Debug, Clone)]
pub struct BiquadBandPassFilter {
    spec: FilterSpec,
    sections: Vec<Biquad>,
}

impl BiquadBandPassFilter {
    pub fn new(spec: FilterSpec) -> Self {
        let sample_rate = spec.sample_rate_hz as f32;
        let per_cutoff = (spec.order / 2).max(1);

        let high_passes = (0..per_cutoff)
            .map(|_| Biquad::high_pass(spec.low_cutoff_hz, sample_rate, BUTTERWORTH_Q));
        let low_passes = (0..per_cutoff)
            .map(|_| Biquad::low_pass(spec.high_cutoff_hz, sample_rate, BUTTERWORTH_Q));
        let sections = high_passes.chain(low_passes).collect();

        Self { spec, sections }
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }
}

impl BandPass for BiquadBandPassFilter {
    fn apply(&self, buffer: &[f32]) -> Vec<f32> {
        self.sections
            .iter()
            .fold(buffer.to_vec(), |signal, section| section.run(&signal))
    }

    fn kind(&self) -> FilterKind {
        FilterKind::BiquadBandPass
    }

    fn spec(&self) -> Option<&FilterSpec> {
        Some(&self.spec)
    }
}

/// Builds the filter selected by `config.filter_kind`.
///
/// Cutoffs and order are only validated when a real filter is requested.
pub fn build_filter(config: &TunerConfig) -> Result<Box<dyn BandPass>, ConfigError> {
    let spec = || {
        FilterSpec::new(
            config.low_cutoff_hz,
            config.high_cutoff_hz,
            config.sample_rate_hz,
            config.effective_filter_order(),
        )
    };

    let filter: Box<dyn BandPass> = match config.filter_kind {
        FilterKind::None => Box::new(NoneFilter),
        FilterKind::Fir => Box::new(FirFilter::with_mode(spec()?, config.convolution)),
        FilterKind::BiquadBandPass => Box::new(BiquadBandPassFilter::new(spec()?)),
    };

    log::debug!(
        "Built {} filter ({} - {} Hz, order {})",
        filter.kind(),
        config.low_cutoff_hz,
        config.high_cutoff_hz,
        config.effective_filter_order()
    );
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::compute_rms;

    fn generate_sine(freq: f32, sample_rate: u32, num_samples: usize) -> Vec<f32> {
        (0..num_samples)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn reed_spec(order: usize) -> FilterSpec {
        FilterSpec::new(115.0, 250.0, 44100, order).unwrap()
    }

    #[test]
    fn spec_rejects_inverted_cutoffs() {
        let err = FilterSpec::new(250.0, 115.0, 44100, 500).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCutoffs { .. }));
        assert!(FilterSpec::new(200.0, 200.0, 44100, 500).is_err());
    }

    #[test]
    fn spec_rejects_cutoff_at_or_above_nyquist() {
        assert!(FilterSpec::new(115.0, 22050.0, 44100, 500).is_err());
        assert!(FilterSpec::new(115.0, 30000.0, 44100, 500).is_err());
    }

    #[test]
    fn spec_rejects_non_positive_values() {
        assert!(FilterSpec::new(0.0, 250.0, 44100, 500).is_err());
        assert!(FilterSpec::new(-10.0, 250.0, 44100, 500).is_err());
        assert_eq!(
            FilterSpec::new(115.0, 250.0, 44100, 0).unwrap_err(),
            ConfigError::InvalidOrder(0)
        );
        assert_eq!(
            FilterSpec::new(115.0, 250.0, 0, 2).unwrap_err(),
            ConfigError::InvalidSampleRate(0)
        );
        assert!(FilterSpec::new(f32::NAN, 250.0, 44100, 2).is_err());
    }

    #[test]
    fn filter_kind_parses_and_displays() {
        assert_eq!("FIR".parse::<FilterKind>().unwrap(), FilterKind::Fir);
        assert_eq!("biquad".parse::<FilterKind>().unwrap(), FilterKind::BiquadBandPass);
        assert_eq!("none".parse::<FilterKind>().unwrap(), FilterKind::None);
        assert!("butterworth".parse::<FilterKind>().is_err());
        assert_eq!(FilterKind::BiquadBandPass.to_string(), "biquad");
    }

    #[test]
    fn none_filter_is_bit_identical() {
        let input = generate_sine(180.0, 44100, 2048);
        let output = NoneFilter.apply(&input);
        assert_eq!(input, output);
    }

    #[test]
    fn fir_has_order_plus_one_symmetric_taps() {
        let fir = FirFilter::new(reed_spec(500));
        let taps = fir.taps();
        assert_eq!(taps.len(), 501);
        for k in 0..taps.len() {
            assert!((taps[k] - taps[taps.len() - 1 - k]).abs() < 1e-6);
        }
        // Center tap is (Wh - Wl) and the Hann window is 1.0 there.
        let expected_center = (250.0 - 115.0) / 22050.0;
        assert!((taps[250] - expected_center).abs() < 1e-6);
        assert!(taps.iter().all(|t| t.is_finite()));
    }

    #[test]
    fn convolution_output_is_truncated_to_input_length() {
        let input = generate_sine(180.0, 44100, 300);
        for order in [1, 2, 64, 299, 500, 1000] {
            let fir = FirFilter::new(reed_spec(order));
            assert_eq!(fir.apply(&input).len(), input.len(), "order {order}");
        }
        assert!(FirFilter::new(reed_spec(500)).apply(&[]).is_empty());
    }

    #[test]
    fn convolve_truncated_is_causal() {
        let out = convolve_truncated(&[1.0, 0.0, 0.0, 0.0], &[0.5, 0.25]);
        assert_eq!(out, vec![0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn fir_attenuates_out_of_band_tone() {
        let fir = FirFilter::new(reed_spec(500));
        let in_band = fir.apply(&generate_sine(180.0, 44100, 2048));
        let out_of_band = fir.apply(&generate_sine(5000.0, 44100, 2048));

        // Skip the startup region where the taps are only partly filled.
        let in_rms = compute_rms(&in_band[600..]);
        let out_rms = compute_rms(&out_of_band[600..]);
        assert!(in_rms > 10.0 * out_rms, "in-band {in_rms}, out-of-band {out_rms}");
    }

    #[test]
    fn fir_fft_mode_matches_direct_mode() {
        let input = generate_sine(200.0, 44100, 2048);
        let direct = FirFilter::with_mode(reed_spec(500), ConvolutionMode::Direct).apply(&input);
        let via_fft = FirFilter::with_mode(reed_spec(500), ConvolutionMode::Fft).apply(&input);
        assert_eq!(direct.len(), via_fft.len());
        for (a, b) in direct.iter().zip(via_fft.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn biquad_leaves_first_two_samples_at_zero() {
        let filter = BiquadBandPassFilter::new(reed_spec(2));
        let mut impulse = [0.0; 16];
        impulse[0] = 1.0;
        let output = filter.apply(&impulse);
        assert_eq!(output.len(), 16);
        assert_eq!(output[0], 0.0);
        assert_eq!(output[1], 0.0);
        assert!(output[2] != 0.0);
    }

    #[test]
    fn biquad_handles_tiny_buffers() {
        let filter = BiquadBandPassFilter::new(reed_spec(2));
        assert_eq!(filter.apply(&[]), Vec::<f32>::new());
        assert_eq!(filter.apply(&[0.7]), vec![0.0]);
        assert_eq!(filter.apply(&[0.7, -0.2]), vec![0.0, 0.0]);
    }

    #[test]
    fn biquad_section_count_follows_order() {
        assert_eq!(BiquadBandPassFilter::new(reed_spec(1)).sections().len(), 2);
        assert_eq!(BiquadBandPassFilter::new(reed_spec(2)).sections().len(), 2);
        assert_eq!(BiquadBandPassFilter::new(reed_spec(4)).sections().len(), 4);
    }

    #[test]
    fn biquad_attenuates_out_of_band_tone() {
        let filter = BiquadBandPassFilter::new(reed_spec(2));
        let in_band = filter.apply(&generate_sine(180.0, 44100, 4096));
        let out_of_band = filter.apply(&generate_sine(5000.0, 44100, 4096));

        let in_rms = compute_rms(&in_band[1024..]);
        let out_rms = compute_rms(&out_of_band[1024..]);
        assert!(in_rms > 10.0 * out_rms, "in-band {in_rms}, out-of-band {out_rms}");
    }

    #[test]
    fn biquad_keeps_no_state_between_calls() {
        let filter = BiquadBandPassFilter::new(reed_spec(2));
        let input = generate_sine(180.0, 44100, 1024);
        assert_eq!(filter.apply(&input), filter.apply(&input));
    }

    #[test]
    fn build_filter_skips_validation_for_passthrough() {
        let config = TunerConfig {
            filter_kind: FilterKind::None,
            low_cutoff_hz: 300.0,
            high_cutoff_hz: 100.0,
            ..TunerConfig::default()
        };
        assert_eq!(build_filter(&config).unwrap().kind(), FilterKind::None);

        let config = TunerConfig { filter_kind: FilterKind::Fir, ..config };
        assert!(matches!(
            build_filter(&config),
            Err(ConfigError::InvalidCutoffs { .. })
        ));
    }
}
