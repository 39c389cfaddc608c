//! # Error Types
//!
//! Two families of failure exist in the tuner core:
//! - [`ConfigError`]: rejected while building a filter or pipeline. Fatal to
//!   that configuration attempt; the caller must fix it and reconstruct.
//! - [`InputError`]: a malformed buffer handed to `process`.
//!
//! "No pitch" and "no signal" are ordinary results, not errors.

use thiserror::Error;

/// Invalid tuner or filter configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Cutoffs must satisfy `0 < low < high < nyquist`.
    #[error("invalid cutoffs: low {low} Hz, high {high} Hz (nyquist {nyquist} Hz)")]
    InvalidCutoffs { low: f32, high: f32, nyquist: f32 },

    #[error("filter order must be positive, got {0}")]
    InvalidOrder(usize),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("buffer length must be at least {min} samples, got {actual}")]
    InvalidBufferLength { actual: usize, min: usize },

    #[error("note table is empty")]
    EmptyNoteTable,

    #[error("invalid note entry {index}: reference frequency {frequency} Hz")]
    InvalidNoteEntry { index: usize, frequency: f32 },

    #[error("invalid instrument range: {low} - {high} Hz")]
    InvalidRange { low: f32, high: f32 },

    /// A threshold or tolerance outside its permitted interval.
    #[error("invalid {name}: {value}")]
    InvalidThreshold { name: &'static str, value: f32 },
}

/// A buffer that cannot be analysed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("sample buffer is empty")]
    EmptyBuffer,

    #[error("buffer length mismatch: expected {expected} samples, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("sample rate mismatch: pipeline configured for {expected} Hz, buffer is {actual} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    #[error("non-finite sample at index {0}")]
    NonFiniteSample(usize),
}

/// Umbrella error for the tuner core.
#[derive(Debug, Error)]
pub enum TunerError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

impl TunerError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, TunerError::Configuration(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, TunerError::InvalidInput(_))
    }
}

/// Result type for tuner operations
pub type Result<T> = std::result::Result<T, TunerError>;
