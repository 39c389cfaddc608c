// tuner-core/src/lib.rs

//! The core logic for the reed instrument tuner.
//! This crate turns fixed-size buffers of audio samples into a detected
//! pitch, an amplitude reading and the nearest note of the instrument.
//! It is completely headless and contains no GUI code.
//!
//! Per buffer the data flows one way:
//! raw samples -> optional band-pass [`filter`] -> [`stats`] ->
//! [`pitch`] estimate -> [`tuning`] classification -> [`AnalysisResult`].
//!
//! ```no_run
//! use tuner_core::{FilterKind, TunerConfig, TunerPipeline};
//!
//! let config = TunerConfig::default().with_filter(FilterKind::BiquadBandPass);
//! let pipeline = TunerPipeline::new(config)?;
//! let samples = vec![0.0_f32; 2048];
//! let result = pipeline.process_samples(&samples, 44100)?;
//! println!("{:?}", result.classification);
//! # Ok::<(), tuner_core::TunerError>(())
//! ```

#[cfg(feature = "capture")]
pub mod audio;
pub mod config;
pub mod driver;
pub mod error;
pub mod fft;
pub mod filter;
pub mod pipeline;
pub mod pitch;
pub mod stats;
pub mod tuning;

pub use config::TunerConfig;
pub use error::{ConfigError, InputError, Result, TunerError};
pub use filter::{BandPass, ConvolutionMode, FilterKind, FilterSpec};
pub use pipeline::{AnalysisResult, SampleBuffer, TunerPipeline};
pub use pitch::{PitchEstimate, PitchEstimator};
pub use tuning::{NoteClassification, NoteClassifier, NoteEntry};
