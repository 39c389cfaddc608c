//! # Tuner Configuration
//!
//! Every tunable of the analysis pipeline in one serde-friendly struct.
//! Missing JSON fields fall back to the defaults, so a config file only has
//! to list what it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::filter::{ConvolutionMode, FilterKind};
use crate::pitch::{
    DEFAULT_MIN_ACCEPT_CORRELATION, DEFAULT_MIN_GOOD_CORRELATION, DEFAULT_SILENCE_RMS_THRESHOLD,
};
use crate::tuning::{
    default_note_table, NoteEntry, DEFAULT_RANGE_HIGH_HZ, DEFAULT_RANGE_LOW_HZ,
    DEFAULT_TUNING_TOLERANCE_HZ,
};

/// Samples per analysis buffer.
pub const DEFAULT_BUFFER_LEN: usize = 2048;
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// FIR order used when none is configured (`order + 1` taps).
pub const DEFAULT_FIR_ORDER: usize = 500;
/// Biquad order used when none is configured (one section per cutoff).
pub const DEFAULT_BIQUAD_ORDER: usize = 2;

/// Smallest buffer the pitch estimator can scan at least one lag in.
pub const MIN_BUFFER_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub filter_kind: FilterKind,
    pub low_cutoff_hz: f32,
    pub high_cutoff_hz: f32,
    /// `None` picks the default order of the selected filter kind.
    pub filter_order: Option<usize>,
    pub convolution: ConvolutionMode,
    pub note_table: Vec<NoteEntry>,
    pub range_low_hz: f32,
    pub range_high_hz: f32,
    pub tuning_tolerance_hz: f32,
    pub silence_rms_threshold: f32,
    pub min_good_correlation: f32,
    pub min_accept_correlation: f32,
    /// Amplitude (percent) a buffer must reach before a note is shown.
    pub display_amplitude_gate_percent: f32,
    pub buffer_len: usize,
    pub sample_rate_hz: u32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            filter_kind: FilterKind::None,
            low_cutoff_hz: DEFAULT_RANGE_LOW_HZ,
            high_cutoff_hz: DEFAULT_RANGE_HIGH_HZ,
            filter_order: None,
            convolution: ConvolutionMode::Direct,
            note_table: default_note_table().to_vec(),
            range_low_hz: DEFAULT_RANGE_LOW_HZ,
            range_high_hz: DEFAULT_RANGE_HIGH_HZ,
            tuning_tolerance_hz: DEFAULT_TUNING_TOLERANCE_HZ,
            silence_rms_threshold: DEFAULT_SILENCE_RMS_THRESHOLD,
            min_good_correlation: DEFAULT_MIN_GOOD_CORRELATION,
            min_accept_correlation: DEFAULT_MIN_ACCEPT_CORRELATION,
            display_amplitude_gate_percent: 0.0,
            buffer_len: DEFAULT_BUFFER_LEN,
            sample_rate_hz: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl TunerConfig {
    pub fn with_filter(mut self, kind: FilterKind) -> Self {
        self.filter_kind = kind;
        self
    }

    pub fn with_cutoffs(mut self, low_hz: f32, high_hz: f32) -> Self {
        self.low_cutoff_hz = low_hz;
        self.high_cutoff_hz = high_hz;
        self
    }

    pub fn with_filter_order(mut self, order: usize) -> Self {
        self.filter_order = Some(order);
        self
    }

    pub fn with_convolution(mut self, mode: ConvolutionMode) -> Self {
        self.convolution = mode;
        self
    }

    pub fn with_note_table(mut self, note_table: Vec<NoteEntry>) -> Self {
        self.note_table = note_table;
        self
    }

    pub fn with_range(mut self, low_hz: f32, high_hz: f32) -> Self {
        self.range_low_hz = low_hz;
        self.range_high_hz = high_hz;
        self
    }

    pub fn with_display_gate(mut self, percent: f32) -> Self {
        self.display_amplitude_gate_percent = percent;
        self
    }

    pub fn with_buffer_len(mut self, buffer_len: usize) -> Self {
        self.buffer_len = buffer_len;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate_hz: u32) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self
    }

    /// Filter order actually used for the selected filter kind.
    pub fn effective_filter_order(&self) -> usize {
        self.filter_order.unwrap_or(match self.filter_kind {
            FilterKind::BiquadBandPass => DEFAULT_BIQUAD_ORDER,
            FilterKind::None | FilterKind::Fir => DEFAULT_FIR_ORDER,
        })
    }

    /// Checks the scalar settings. Filter cutoffs and the note table are
    /// checked when the pipeline builds its components.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate_hz));
        }
        if self.buffer_len < MIN_BUFFER_LEN {
            return Err(ConfigError::InvalidBufferLength {
                actual: self.buffer_len,
                min: MIN_BUFFER_LEN,
            });
        }
        check_threshold("silence RMS threshold", self.silence_rms_threshold, 0.0, f32::MAX)?;
        check_threshold("minimum good correlation", self.min_good_correlation, f32::MIN, 1.0)?;
        check_threshold("minimum accept correlation", self.min_accept_correlation, f32::MIN, 1.0)?;
        check_threshold("display amplitude gate", self.display_amplitude_gate_percent, 0.0, 100.0)?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Writes the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

fn check_threshold(
    name: &'static str,
    value: f32,
    min: f32,
    max: f32,
) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}
