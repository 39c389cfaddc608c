//! Plain-text rendering of analysis results.

use std::fmt::Write;

use tuner_core::{AnalysisResult, NoteClassification, NoteEntry};

/// Placeholder shown when there is no note to display.
const NO_SIGNAL: &str = "--";

pub fn live_header() -> String {
    format!(
        "{:>9}  {:>6}  {:>5}  {:>8}  {:>6}  {}",
        "freq(Hz)", "note", "conc.", "dev(Hz)", "amp%", "state"
    )
}

pub fn table_header() -> String {
    format!("{:>8}  {:>9}  {}", "time(s)", "fft(Hz)", live_header())
}

/// A live line prefixed with the buffer start time and the spectrum peak.
pub fn table_row(
    time_secs: f32,
    spectrum_peak: Option<f32>,
    result: &AnalysisResult,
    held_frequency: Option<f32>,
) -> String {
    let peak = spectrum_peak
        .map(|f| format!("{:.1}", f))
        .unwrap_or_else(|| NO_SIGNAL.to_string());
    format!("{:>8.3}  {:>9}  {}", time_secs, peak, live_line(result, held_frequency))
}

/// One status line: held frequency, matched note, deviation and state.
pub fn live_line(result: &AnalysisResult, held_frequency: Option<f32>) -> String {
    let freq = held_frequency
        .map(|f| format!("{:.2}", f))
        .unwrap_or_else(|| NO_SIGNAL.to_string());

    let (note, concert, deviation, state) = match &result.classification {
        NoteClassification::Matched { note, deviation_hz, in_tune, .. } => (
            note.display_note.as_str(),
            note.concert_note.as_str(),
            format!("{:+.2}", deviation_hz),
            if *in_tune { "in tune" } else if *deviation_hz > 0.0 { "sharp" } else { "flat" },
        ),
        NoteClassification::NoSignal => (NO_SIGNAL, NO_SIGNAL, NO_SIGNAL.to_string(), "no signal"),
    };

    format!(
        "{:>9}  {:>6}  {:>5}  {:>8}  {:>6.1}  {}",
        freq, note, concert, deviation, result.amplitude_percent, state
    )
}

pub fn note_table(notes: &[NoteEntry]) -> String {
    let mut out = format!("{:>6}  {:>7}  {:>10}\n", "note", "concert", "freq(Hz)");
    for entry in notes {
        let _ = writeln!(
            out,
            "{:>6}  {:>7}  {:>10.2}",
            entry.display_note, entry.concert_note, entry.reference_frequency_hz
        );
    }
    out
}
