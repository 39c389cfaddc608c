//! WAV file input for offline analysis.

use anyhow::{bail, Context, Result};
use std::path::Path;

/// A mono recording ready to be sliced into analysis buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Recording {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Reads a WAV file as mono f32 samples in `[-1, 1]`.
///
/// Integer PCM is scaled by its bit depth; multi-channel audio is averaged
/// down to one channel.
pub fn read_wav(path: impl AsRef<Path>) -> Result<Recording> {
    let path = path.as_ref();
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Failed to decode float samples")?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                bail!("Unsupported bit depth: {}", spec.bits_per_sample);
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Failed to decode integer samples")?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    log::debug!(
        "Read {}: {} Hz, {} channel(s), {} samples",
        path.display(),
        spec.sample_rate,
        channels,
        samples.len()
    );

    Ok(Recording { samples, sample_rate: spec.sample_rate })
}
