//! # Audio Capture Module
//!
//! Live microphone input through CPAL (Cross-Platform Audio Library). The
//! callback stream is cut into exact analysis-sized frames and pushed onto a
//! channel for [`crate::driver`] to consume.
//!
//! Only the default input device is used; device enumeration is left to
//! the host application.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::Sender;

/// Starts audio capture from the default input device.
///
/// Multi-channel input is averaged down to mono. Frames that find the
/// channel full are dropped rather than blocking the audio callback.
///
/// # Arguments
/// * `sender` - Channel sender for streaming frames to the analysis thread
/// * `buffer_len` - Samples per frame sent
/// * `target_rate` - Preferred sample rate in Hz
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and the actual rate
/// * `Err(e)` - No usable input device or format
pub fn start_audio_capture(
    sender: Sender<Vec<f32>>,
    buffer_len: usize,
    target_rate: u32,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host.default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()
        .context("Failed to query input configurations")?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate_val = config.sample_rate().0;
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    log::info!("Selected sample rate: {} Hz, {} channel(s)", sample_rate_val, channels);

    let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

    // Accumulates mono samples until a full frame is available.
    let mut audio_buffer: Vec<f32> = Vec::with_capacity(buffer_len * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if channels == 1 {
                audio_buffer.extend_from_slice(data);
            } else {
                audio_buffer.extend(
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                );
            }

            while audio_buffer.len() >= buffer_len {
                let frame_to_send = audio_buffer[..buffer_len].to_vec();
                if sender.try_send(frame_to_send).is_err() {
                    log::trace!("Analysis channel full, dropping frame");
                }
                audio_buffer.drain(..buffer_len);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Picks the f32 input configuration closest to `target_rate`, preferring
/// mono when several are equally close.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let rate_diff = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (rate_diff, c.channels() != 1)
        })
}
