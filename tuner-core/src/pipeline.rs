//! # Tuner Pipeline
//!
//! One analysis cycle per buffer:
//!
//! ```text
//! buffer -> band-pass (optional) -> amplitude -> pitch estimate -> note
//! ```
//!
//! The pipeline is built once from a [`TunerConfig`] and holds only that
//! configuration and the filter it designed. `process` keeps no history, so
//! independent streams can share one pipeline from several threads.

use serde::{Deserialize, Serialize};

use crate::config::TunerConfig;
use crate::error::{InputError, Result};
use crate::filter::{build_filter, BandPass, FilterKind};
use crate::pitch::{PitchEstimate, PitchEstimator};
use crate::stats::amplitude_percent;
use crate::tuning::{NoteClassification, NoteClassifier};

/// A borrowed view of one analysis buffer and its sample rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleBuffer<'a> {
    samples: &'a [f32],
    sample_rate_hz: u32,
}

impl<'a> SampleBuffer<'a> {
    pub fn new(samples: &'a [f32], sample_rate_hz: u32) -> Self {
        Self { samples, sample_rate_hz }
    }

    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Slices a long recording into full `frame_len` buffers, starting a new
    /// frame every `hop` samples. A trailing partial frame is dropped.
    pub fn frames(
        samples: &'a [f32],
        sample_rate_hz: u32,
        frame_len: usize,
        hop: usize,
    ) -> impl Iterator<Item = SampleBuffer<'a>> + 'a {
        let frame_len = frame_len.max(1);
        let hop = hop.max(1);
        let count = if samples.len() < frame_len {
            0
        } else {
            (samples.len() - frame_len) / hop + 1
        };
        (0..count).map(move |i| {
            let start = i * hop;
            SampleBuffer::new(&samples[start..start + frame_len], sample_rate_hz)
        })
    }
}

/// Everything a display needs from one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub frequency: PitchEstimate,
    /// Peak amplitude of the (filtered) buffer, `[0, 100]`.
    pub amplitude_percent: f32,
    pub classification: NoteClassification,
}

pub struct TunerPipeline {
    config: TunerConfig,
    filter: Box<dyn BandPass>,
    estimator: PitchEstimator,
    classifier: NoteClassifier,
}

impl std::fmt::Debug for TunerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunerPipeline")
            .field("filter", &self.filter.kind())
            .field("estimator", &self.estimator)
            .field("classifier", &self.classifier)
            .finish()
    }
}

impl TunerPipeline {
    /// Validates `config` and designs the filter.
    ///
    /// # Errors
    /// * `TunerError::Configuration` - Any invalid setting
    pub fn new(config: TunerConfig) -> Result<Self> {
        config.validate()?;
        let filter = build_filter(&config)?;
        let classifier = NoteClassifier::new(
            config.note_table.clone(),
            config.range_low_hz,
            config.range_high_hz,
            config.tuning_tolerance_hz,
        )?;
        let estimator = PitchEstimator::new(
            config.silence_rms_threshold,
            config.min_good_correlation,
            config.min_accept_correlation,
        );

        log::debug!(
            "Tuner pipeline ready: {} filter, {} samples @ {} Hz, range {} - {} Hz",
            filter.kind(),
            config.buffer_len,
            config.sample_rate_hz,
            config.range_low_hz,
            config.range_high_hz
        );

        Ok(Self { config, filter, estimator, classifier })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn filter_kind(&self) -> FilterKind {
        self.filter.kind()
    }

    pub fn estimator(&self) -> &PitchEstimator {
        &self.estimator
    }

    pub fn classifier(&self) -> &NoteClassifier {
        &self.classifier
    }

    /// Switches to another filter strategy. On error the current filter is
    /// kept.
    pub fn set_filter_kind(&mut self, kind: FilterKind) -> Result<()> {
        let config = TunerConfig { filter_kind: kind, ..self.config.clone() };
        self.filter = build_filter(&config)?;
        self.config = config;
        Ok(())
    }

    /// Runs one analysis cycle.
    ///
    /// # Errors
    /// * `TunerError::InvalidInput` - Empty buffer, wrong length, wrong
    ///   sample rate, or a NaN/infinite sample
    pub fn process(&self, buffer: &SampleBuffer<'_>) -> Result<AnalysisResult> {
        self.check_input(buffer)?;

        let filtered = self.filter.apply(buffer.samples());
        let amplitude = amplitude_percent(&filtered);
        let frequency = self.estimator.estimate(&filtered, buffer.sample_rate_hz());

        let classification = if amplitude < self.config.display_amplitude_gate_percent {
            NoteClassification::NoSignal
        } else {
            self.classifier.classify(&frequency)
        };

        log::trace!("cycle: {:?}, amplitude {:.1}%", frequency, amplitude);

        Ok(AnalysisResult { frequency, amplitude_percent: amplitude, classification })
    }

    /// Convenience wrapper over [`process`](Self::process) for a raw slice.
    pub fn process_samples(&self, samples: &[f32], sample_rate_hz: u32) -> Result<AnalysisResult> {
        self.process(&SampleBuffer::new(samples, sample_rate_hz))
    }

    fn check_input(&self, buffer: &SampleBuffer<'_>) -> std::result::Result<(), InputError> {
        if buffer.is_empty() {
            return Err(InputError::EmptyBuffer);
        }
        if buffer.len() != self.config.buffer_len {
            return Err(InputError::LengthMismatch {
                expected: self.config.buffer_len,
                actual: buffer.len(),
            });
        }
        if buffer.sample_rate_hz() != self.config.sample_rate_hz {
            return Err(InputError::SampleRateMismatch {
                expected: self.config.sample_rate_hz,
                actual: buffer.sample_rate_hz(),
            });
        }
        if let Some(index) = buffer.samples().iter().position(|s| !s.is_finite()) {
            return Err(InputError::NonFiniteSample(index));
        }
        Ok(())
    }
}
