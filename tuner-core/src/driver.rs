//! # Analysis Driver
//!
//! The caller-owned loop that feeds buffers into a [`TunerPipeline`].
//! Buffers arrive over a crossbeam channel from whatever produces them
//! (microphone capture, a file reader, a test). One `process` call runs per
//! buffer, and the loop ends on a shutdown signal, when the producer hangs
//! up, or when the result consumer goes away.

use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::pipeline::{AnalysisResult, SampleBuffer, TunerPipeline};

/// Why the analysis loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    ProducerDisconnected,
    SinkClosed,
}

/// Counters for one run of the analysis loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub exit: LoopExit,
    pub processed: usize,
    /// Buffers the pipeline refused as malformed.
    pub rejected: usize,
}

/// One pipeline result and the position of its buffer in the input stream.
///
/// `index` counts every received buffer, rejected ones included, so a
/// caller can map results back to stream time.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysedFrame {
    pub index: usize,
    pub result: AnalysisResult,
}

/// Runs the pipeline on every buffer from `frames` until shutdown.
///
/// `sink` receives each result and returns `false` to stop the loop.
/// Malformed buffers are logged and skipped; they never end the loop.
pub fn run_analysis_loop<F>(
    pipeline: &TunerPipeline,
    frames: &Receiver<Vec<f32>>,
    shutdown: &Receiver<()>,
    sample_rate_hz: u32,
    mut sink: F,
) -> LoopSummary
where
    F: FnMut(AnalysedFrame) -> bool,
{
    let mut processed = 0;
    let mut rejected = 0;
    let mut index = 0;

    let exit = loop {
        let event = crossbeam_channel::select! {
            recv(frames) -> msg => msg.map_err(|_| LoopExit::ProducerDisconnected),
            recv(shutdown) -> _ => Err(LoopExit::Shutdown),
        };
        let frame = match event {
            Ok(frame) => frame,
            Err(exit) => break exit,
        };

        let frame_index = index;
        index += 1;

        match pipeline.process(&SampleBuffer::new(&frame, sample_rate_hz)) {
            Ok(result) => {
                processed += 1;
                if !sink(AnalysedFrame { index: frame_index, result }) {
                    break LoopExit::SinkClosed;
                }
            }
            Err(e) => {
                rejected += 1;
                log::warn!("Skipping buffer {}: {}", frame_index, e);
            }
        }
    };

    log::debug!("Analysis loop stopped ({:?}): {} processed, {} rejected", exit, processed, rejected);
    LoopSummary { exit, processed, rejected }
}

/// A dedicated analysis thread and the means to stop it.
#[derive(Debug)]
pub struct AnalysisWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<LoopSummary>>,
}

impl AnalysisWorker {
    /// Signals the loop to stop and waits for the thread.
    ///
    /// Returns `None` if the thread panicked.
    pub fn shutdown(mut self) -> Option<LoopSummary> {
        // The loop may already have exited on its own.
        let _ = self.shutdown_tx.try_send(());
        self.thread_handle.take().and_then(|handle| handle.join().ok())
    }

    /// Waits for the loop to end by itself (producer or consumer gone).
    pub fn join(mut self) -> Option<LoopSummary> {
        self.thread_handle.take().and_then(|handle| handle.join().ok())
    }
}

/// Moves `pipeline` onto its own thread and streams results to `results`.
///
/// The thread stops when [`AnalysisWorker::shutdown`] is called, when every
/// sender of `frames` is dropped, or when `results` is disconnected.
pub fn spawn_analysis_worker(
    pipeline: TunerPipeline,
    frames: Receiver<Vec<f32>>,
    sample_rate_hz: u32,
    results: Sender<AnalysedFrame>,
) -> AnalysisWorker {
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let thread_handle = thread::spawn(move || {
        log::debug!("Analysis thread started");
        run_analysis_loop(&pipeline, &frames, &shutdown_rx, sample_rate_hz, |frame| {
            results.send(frame).is_ok()
        })
    });

    AnalysisWorker { shutdown_tx, thread_handle: Some(thread_handle) }
}

/// Holds the last detected frequency across cycles without a pitch, the
/// way a tuner display keeps showing the last reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrequencyHold {
    last: Option<f32>,
}

impl FrequencyHold {
    /// Takes in a new result and returns the frequency to display.
    pub fn update(&mut self, result: &AnalysisResult) -> Option<f32> {
        if let Some(freq) = result.frequency.frequency() {
            self.last = Some(freq);
        }
        self.last
    }

    pub fn last(&self) -> Option<f32> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
