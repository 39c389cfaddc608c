//! # reed-tuner
//!
//! Command-line front end for the tuner core. It plays the part of the
//! audio collaborator: it cuts a WAV recording (or, with the `capture`
//! feature, the default microphone) into analysis buffers, runs them
//! through a [`TunerPipeline`] on a worker thread, and prints each result.

mod report;
mod wav;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::thread;

use tuner_core::driver::{spawn_analysis_worker, AnalysedFrame, FrequencyHold};
use tuner_core::fft::dominant_frequency;
use tuner_core::tuning::default_note_table;
use tuner_core::{FilterKind, SampleBuffer, TunerConfig, TunerPipeline};

#[derive(Debug, Parser)]
#[command(name = "reed-tuner", version, about = "Pitch detection for a reed instrument tuner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyse a WAV recording buffer by buffer
    Analyze {
        /// WAV file to analyse
        input: PathBuf,
        #[command(flatten)]
        settings: Settings,
        /// Samples between buffer starts (defaults to the buffer length)
        #[arg(long)]
        hop: Option<usize>,
        /// Print one JSON object per buffer instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Tune live from the default microphone (needs the `capture` feature)
    Live {
        #[command(flatten)]
        settings: Settings,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// Print the built-in note table
    Notes,
    /// Print the default configuration as JSON
    DumpConfig,
}

#[derive(Debug, clap::Args)]
struct Settings {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Band-pass strategy: none, fir or biquad
    #[arg(long)]
    filter: Option<FilterKind>,
    /// Samples per analysis buffer
    #[arg(long)]
    buffer_len: Option<usize>,
    /// Amplitude percentage required before a note is shown
    #[arg(long)]
    display_gate: Option<f32>,
}

impl Settings {
    /// Loads the config file (if any) and applies command-line overrides.
    fn resolve(&self) -> Result<TunerConfig> {
        let mut config = match &self.config {
            Some(path) => TunerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TunerConfig::default(),
        };
        if let Some(kind) = self.filter {
            config = config.with_filter(kind);
        }
        if let Some(len) = self.buffer_len {
            config = config.with_buffer_len(len);
        }
        if let Some(gate) = self.display_gate {
            config = config.with_display_gate(gate);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze { input, settings, hop, json } => analyze(&input, &settings, hop, json),
        Command::Live { settings, seconds } => live(&settings, seconds),
        Command::Notes => {
            print!("{}", report::note_table(default_note_table()));
            Ok(())
        }
        Command::DumpConfig => {
            println!("{}", TunerConfig::default().to_json_string()?);
            Ok(())
        }
    }
}

fn analyze(input: &Path, settings: &Settings, hop: Option<usize>, json: bool) -> Result<()> {
    let recording = wav::read_wav(input)?;
    let sample_rate = recording.sample_rate;
    let config = settings.resolve()?.with_sample_rate(sample_rate);
    let buffer_len = config.buffer_len;
    let hop = hop.unwrap_or(buffer_len).max(1);
    let pipeline = TunerPipeline::new(config).context("Invalid tuner configuration")?;

    log::info!(
        "Analysing {:.2}s of audio with the {} filter",
        recording.duration_secs(),
        pipeline.filter_kind()
    );

    let (frames_tx, frames_rx) = crossbeam_channel::bounded::<Vec<f32>>(8);
    let (results_tx, results_rx) = crossbeam_channel::unbounded();
    let worker = spawn_analysis_worker(pipeline, frames_rx, sample_rate, results_tx);
    let samples = recording.samples.as_slice();

    thread::scope(|scope| -> Result<()> {
        let producer = scope.spawn(move || {
            for frame in SampleBuffer::frames(samples, sample_rate, buffer_len, hop) {
                if frames_tx.send(frame.samples().to_vec()).is_err() {
                    break;
                }
            }
        });

        if !json {
            println!("{}", report::table_header());
        }
        let mut hold = FrequencyHold::default();
        for AnalysedFrame { index, result } in results_rx.iter() {
            let start = index * hop;
            let time = start as f32 / sample_rate as f32;
            let spectrum_peak = samples
                .get(start..start + buffer_len)
                .and_then(|frame| dominant_frequency(frame, sample_rate));

            if json {
                let row = serde_json::json!({
                    "time_secs": time,
                    "spectrum_peak_hz": spectrum_peak,
                    "result": result,
                });
                println!("{}", row);
            } else {
                let held = hold.update(&result);
                println!("{}", report::table_row(time, spectrum_peak, &result, held));
            }
        }

        producer.join().map_err(|_| anyhow::anyhow!("Frame producer panicked"))
    })?;

    if let Some(summary) = worker.join() {
        log::info!("{} buffers analysed, {} rejected", summary.processed, summary.rejected);
    }
    Ok(())
}

#[cfg(feature = "capture")]
fn live(settings: &Settings, seconds: u64) -> Result<()> {
    use std::time::{Duration, Instant};

    let config = settings.resolve()?;
    let (frames_tx, frames_rx) = crossbeam_channel::bounded::<Vec<f32>>(4);
    let (stream, sample_rate) =
        tuner_core::audio::start_audio_capture(frames_tx, config.buffer_len, config.sample_rate_hz)?;

    let pipeline = TunerPipeline::new(config.with_sample_rate(sample_rate))
        .context("Invalid tuner configuration")?;
    let (results_tx, results_rx) = crossbeam_channel::unbounded();
    let worker = spawn_analysis_worker(pipeline, frames_rx, sample_rate, results_tx);

    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut hold = FrequencyHold::default();
    println!("{}", report::live_header());
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match results_rx.recv_timeout(remaining) {
            Ok(AnalysedFrame { result, .. }) => {
                let held = hold.update(&result);
                println!("{}", report::live_line(&result, held));
            }
            Err(_) => break,
        }
    }

    drop(stream);
    if let Some(summary) = worker.shutdown() {
        log::info!("{} buffers analysed, {} rejected", summary.processed, summary.rejected);
    }
    Ok(())
}

#[cfg(not(feature = "capture"))]
fn live(_settings: &Settings, _seconds: u64) -> Result<()> {
    anyhow::bail!("reed-tuner was built without live capture; rebuild with --features capture")
}
