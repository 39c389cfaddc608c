//! # Pitch Detection Module
//!
//! Monophonic pitch estimation by normalized-difference autocorrelation.
//!
//! For each lag `offset` in `[0, N/2)` the buffer is compared with a shifted
//! copy of itself:
//!
//! ```text
//! correlation(offset) = 1 - (1 / W) * sum_{i < W} |x[i] - x[i + offset]|,  W = N / 2
//! ```
//!
//! The scan stops at the first local maximum once the correlation has risen
//! above the "good" threshold, so the first strong period wins rather than
//! the global best. That early exit is what keeps the estimator on the
//! fundamental instead of a multiple of the period.

use serde::{Deserialize, Serialize};

use crate::stats::compute_rms;

pub const DEFAULT_SILENCE_RMS_THRESHOLD: f32 = 0.01;
pub const DEFAULT_MIN_GOOD_CORRELATION: f32 = 0.9;
pub const DEFAULT_MIN_ACCEPT_CORRELATION: f32 = 0.01;

/// Outcome of one estimation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchEstimate {
    /// A periodic signal was found.
    Detected {
        frequency_hz: f32,
        /// Best normalized correlation score in `[0, 1]`.
        confidence: f32,
    },
    /// Silence, noise, or no sufficiently strong period.
    NoPitch,
}

impl PitchEstimate {
    pub fn frequency(&self) -> Option<f32> {
        match *self {
            PitchEstimate::Detected { frequency_hz, .. } => Some(frequency_hz),
            PitchEstimate::NoPitch => None,
        }
    }

    pub fn confidence(&self) -> Option<f32> {
        match *self {
            PitchEstimate::Detected { confidence, .. } => Some(confidence),
            PitchEstimate::NoPitch => None,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, PitchEstimate::Detected { .. })
    }
}

/// Autocorrelation pitch estimator with independently tunable thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchEstimator {
    /// RMS below which the buffer is treated as silence.
    pub silence_rms_threshold: f32,
    /// Correlation a lag must exceed to enter a peak region.
    pub min_good_correlation: f32,
    /// Floor the best correlation must exceed to report a pitch.
    pub min_accept_correlation: f32,
}

impl Default for PitchEstimator {
    fn default() -> Self {
        Self {
            silence_rms_threshold: DEFAULT_SILENCE_RMS_THRESHOLD,
            min_good_correlation: DEFAULT_MIN_GOOD_CORRELATION,
            min_accept_correlation: DEFAULT_MIN_ACCEPT_CORRELATION,
        }
    }
}

impl PitchEstimator {
    pub fn new(
        silence_rms_threshold: f32,
        min_good_correlation: f32,
        min_accept_correlation: f32,
    ) -> Self {
        Self { silence_rms_threshold, min_good_correlation, min_accept_correlation }
    }

    /// Estimates the dominant frequency of `signal`.
    ///
    /// # Arguments
    /// * `signal` - Time-domain samples, roughly in `[-1, 1]`
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `Detected` - `sample_rate / best_offset` and its correlation score
    /// * `NoPitch` - Silence, or no lag cleared the thresholds
    pub fn estimate(&self, signal: &[f32], sample_rate: u32) -> PitchEstimate {
        self.scan(signal, sample_rate, None)
    }

    /// Like [`estimate`](Self::estimate), also returning the correlation of
    /// every lag visited before the scan stopped. The curve is empty when the
    /// silence gate rejects the buffer.
    pub fn estimate_with_curve(&self, signal: &[f32], sample_rate: u32) -> (PitchEstimate, Vec<f32>) {
        let mut curve = Vec::with_capacity(signal.len() / 2);
        let estimate = self.scan(signal, sample_rate, Some(&mut curve));
        (estimate, curve)
    }

    fn scan(&self, signal: &[f32], sample_rate: u32, mut curve: Option<&mut Vec<f32>>) -> PitchEstimate {
        // --- Noise Gate: Calculate RMS to filter out silence/noise ---
        if compute_rms(signal) < self.silence_rms_threshold {
            return PitchEstimate::NoPitch;
        }

        let max_lag = signal.len() / 2;
        let mut best_offset = 0usize;
        let mut best_correlation = 0.0_f32;
        let mut found_good_correlation = false;
        let mut last_correlation = 1.0_f32;

        for offset in 0..max_lag {
            let diff: f32 = signal[..max_lag]
                .iter()
                .zip(&signal[offset..offset + max_lag])
                .map(|(a, b)| (a - b).abs())
                .sum();
            let correlation = 1.0 - diff / max_lag as f32;

            if let Some(curve) = curve.as_deref_mut() {
                curve.push(correlation);
            }

            if correlation > self.min_good_correlation && correlation > last_correlation {
                found_good_correlation = true;
                if correlation > best_correlation {
                    best_correlation = correlation;
                    best_offset = offset;
                }
            } else if found_good_correlation {
                // Past the first peak after the threshold.
                break;
            }
            last_correlation = correlation;
        }

        if best_correlation > self.min_accept_correlation && best_offset > 0 {
            PitchEstimate::Detected {
                frequency_hz: sample_rate as f32 / best_offset as f32,
                confidence: best_correlation,
            }
        } else {
            PitchEstimate::NoPitch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine(freq: f32, sample_rate: u32, num_samples: usize) -> Vec<f32> {
        (0..num_samples)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    /// Deterministic white noise in `[-amplitude, amplitude]`.
    fn generate_noise(amplitude: f32, num_samples: usize) -> Vec<f32> {
        let mut state: u32 = 0x2545_F491;
        (0..num_samples)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let unit = (state >> 8) as f32 / (1u32 << 24) as f32;
                (unit * 2.0 - 1.0) * amplitude
            })
            .collect()
    }

    #[test]
    fn silence_yields_no_pitch() {
        let estimator = PitchEstimator::default();
        assert_eq!(estimator.estimate(&[0.0; 2048], 44100), PitchEstimate::NoPitch);
    }

    #[test]
    fn quiet_signal_is_gated() {
        let estimator = PitchEstimator::default();
        let quiet: Vec<f32> = generate_sine(200.0, 44100, 2048).iter().map(|s| s * 0.005).collect();
        assert_eq!(estimator.estimate(&quiet, 44100), PitchEstimate::NoPitch);
    }

    #[test]
    fn recovers_200hz_sine() {
        let estimator = PitchEstimator::default();
        let signal = generate_sine(200.0, 44100, 2048);
        match estimator.estimate(&signal, 44100) {
            PitchEstimate::Detected { frequency_hz, confidence } => {
                assert!((frequency_hz - 200.0).abs() < 3.0, "Expected ~200 Hz, got {frequency_hz}");
                assert!(confidence > 0.9 && confidence <= 1.0, "confidence {confidence}");
            }
            PitchEstimate::NoPitch => panic!("200 Hz sine should be detected"),
        }
    }

    #[test]
    fn recovers_reed_range_tones() {
        let estimator = PitchEstimator::default();
        for freq in [120.0, 146.83, 174.61, 233.08] {
            let signal = generate_sine(freq, 44100, 2048);
            let detected = estimator.estimate(&signal, 44100).frequency().unwrap();
            assert!((detected - freq).abs() < 3.0, "Expected ~{freq} Hz, got {detected}");
        }
    }

    #[test]
    fn constant_signal_has_no_period() {
        let estimator = PitchEstimator::default();
        assert_eq!(estimator.estimate(&[0.5; 2048], 44100), PitchEstimate::NoPitch);
    }

    #[test]
    fn white_noise_yields_no_pitch() {
        let estimator = PitchEstimator::default();
        let noise = generate_noise(0.5, 2048);
        assert_eq!(estimator.estimate(&noise, 44100), PitchEstimate::NoPitch);
    }

    #[test]
    fn tiny_buffers_yield_no_pitch() {
        let estimator = PitchEstimator::default();
        assert_eq!(estimator.estimate(&[], 44100), PitchEstimate::NoPitch);
        assert_eq!(estimator.estimate(&[0.8], 44100), PitchEstimate::NoPitch);
        assert_eq!(estimator.estimate(&[0.8, -0.8], 44100), PitchEstimate::NoPitch);
    }

    #[test]
    fn curve_starts_at_unity_and_stops_after_first_peak() {
        let estimator = PitchEstimator::default();
        let signal = generate_sine(200.0, 44100, 2048);
        let (estimate, curve) = estimator.estimate_with_curve(&signal, 44100);

        assert!(estimate.is_detected());
        assert_eq!(curve[0], 1.0);
        // One period is ~220.5 samples; the scan ends just past it.
        assert!(curve.len() > 220 && curve.len() < 230, "scanned {} lags", curve.len());
        assert!(curve.len() < signal.len() / 2);
    }

    #[test]
    fn curve_is_empty_for_gated_buffer() {
        let (estimate, curve) = PitchEstimator::default().estimate_with_curve(&[0.0; 512], 44100);
        assert_eq!(estimate, PitchEstimate::NoPitch);
        assert!(curve.is_empty());
    }

    #[test]
    fn thresholds_are_independent() {
        let signal = generate_sine(200.0, 44100, 2048);

        let strict = PitchEstimator::new(0.01, 0.9, 0.9999);
        assert_eq!(strict.estimate(&signal, 44100), PitchEstimate::NoPitch);

        let deaf = PitchEstimator::new(1.0, 0.9, 0.01);
        assert_eq!(deaf.estimate(&signal, 44100), PitchEstimate::NoPitch);
    }

    #[test]
    fn estimate_accessors() {
        let detected = PitchEstimate::Detected { frequency_hz: 233.0, confidence: 0.97 };
        assert_eq!(detected.frequency(), Some(233.0));
        assert_eq!(detected.confidence(), Some(0.97));
        assert!(detected.is_detected());
        assert_eq!(PitchEstimate::NoPitch.frequency(), None);
        assert!(!PitchEstimate::NoPitch.is_detected());
    }
}
