//! # Musical Tuning Module
//!
//! Maps a detected frequency onto the instrument's note table and reports
//! how far it is from the nearest reference pitch.
//!
//! The default table covers the 14 semitones from A#2 to B3 (about
//! 116-247 Hz) in equal temperament with A4 = 440 Hz. It is written for a
//! B-flat tenor saxophone: each entry shows the written note the player
//! reads next to the sounding concert note, a major ninth lower.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pitch::PitchEstimate;

/// Default tolerance for `in_tune`, in Hz.
pub const DEFAULT_TUNING_TOLERANCE_HZ: f32 = 1.0;

/// Default instrument range, in Hz.
pub const DEFAULT_RANGE_LOW_HZ: f32 = 115.0;
pub const DEFAULT_RANGE_HIGH_HZ: f32 = 250.0;

/// Semitones between the written and the sounding note (major ninth).
const TRANSPOSITION_SEMITONES: usize = 14;

/// A0-based key indices of the lowest and highest concert notes (A#2, B3).
const LOWEST_KEY: usize = 25;
const HIGHEST_KEY: usize = 38;

/// One row of the note table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEntry {
    /// Note shown to the player (written pitch)
    pub display_note: String,
    /// Sounding frequency in Hz
    pub reference_frequency_hz: f32,
    /// Sounding note name
    pub concert_note: String,
}

impl NoteEntry {
    pub fn new(display_note: &str, reference_frequency_hz: f32, concert_note: &str) -> Self {
        Self {
            display_note: display_note.to_string(),
            reference_frequency_hz,
            concert_note: concert_note.to_string(),
        }
    }
}

/// Name of a key on an A0-based 88-key layout, e.g. 48 -> "A4".
fn key_name(key_index: usize) -> String {
    const NOTE_NAMES: [&str; 12] = [
        "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
    ];
    // The octave changes at C.
    let octave = (key_index + 9) / 12;
    format!("{}{}", NOTE_NAMES[key_index % 12], octave)
}

/// Equal-tempered frequency of an A0-based key index, A4 (index 48) = 440 Hz.
fn key_frequency(key_index: usize) -> f32 {
    440.0 * 2.0_f32.powf((key_index as f32 - 48.0) / 12.0)
}

/// The default 14-entry table, computed once on first use.
static DEFAULT_NOTE_TABLE: Lazy<Vec<NoteEntry>> = Lazy::new(|| {
    (LOWEST_KEY..=HIGHEST_KEY)
        .map(|key| NoteEntry {
            display_note: key_name(key + TRANSPOSITION_SEMITONES),
            reference_frequency_hz: key_frequency(key),
            concert_note: key_name(key),
        })
        .collect()
});

/// The built-in note table, ordered from lowest to highest.
pub fn default_note_table() -> &'static [NoteEntry] {
    &DEFAULT_NOTE_TABLE
}

/// Deviation from a target frequency in cents (positive = sharp).
///
/// # Arguments
/// * `freq` - Measured frequency in Hz
/// * `target_freq` - Target frequency in Hz
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Result of matching a pitch against the note table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteClassification {
    Matched {
        note: NoteEntry,
        /// `frequency - reference`, in Hz (positive = sharp)
        deviation_hz: f32,
        /// Same deviation in cents, for display
        deviation_cents: f32,
        in_tune: bool,
    },
    /// Nothing to show: no pitch, out of range, or below the display gate.
    NoSignal,
}

impl NoteClassification {
    pub fn matched_note(&self) -> Option<&NoteEntry> {
        match self {
            NoteClassification::Matched { note, .. } => Some(note),
            NoteClassification::NoSignal => None,
        }
    }

    pub fn deviation_hz(&self) -> Option<f32> {
        match self {
            NoteClassification::Matched { deviation_hz, .. } => Some(*deviation_hz),
            NoteClassification::NoSignal => None,
        }
    }

    pub fn is_in_tune(&self) -> bool {
        matches!(self, NoteClassification::Matched { in_tune: true, .. })
    }

    pub fn is_no_signal(&self) -> bool {
        matches!(self, NoteClassification::NoSignal)
    }
}

/// Nearest-note classifier over a fixed, ordered note table.
#[derive(Debug, Clone)]
pub struct NoteClassifier {
    note_table: Vec<NoteEntry>,
    range_low_hz: f32,
    range_high_hz: f32,
    tolerance_hz: f32,
}

impl Default for NoteClassifier {
    fn default() -> Self {
        Self {
            note_table: default_note_table().to_vec(),
            range_low_hz: DEFAULT_RANGE_LOW_HZ,
            range_high_hz: DEFAULT_RANGE_HIGH_HZ,
            tolerance_hz: DEFAULT_TUNING_TOLERANCE_HZ,
        }
    }
}

impl NoteClassifier {
    pub fn new(
        note_table: Vec<NoteEntry>,
        range_low_hz: f32,
        range_high_hz: f32,
        tolerance_hz: f32,
    ) -> Result<Self, ConfigError> {
        if note_table.is_empty() {
            return Err(ConfigError::EmptyNoteTable);
        }
        if let Some((index, entry)) = note_table
            .iter()
            .enumerate()
            .find(|(_, e)| !(e.reference_frequency_hz.is_finite() && e.reference_frequency_hz > 0.0))
        {
            return Err(ConfigError::InvalidNoteEntry { index, frequency: entry.reference_frequency_hz });
        }
        if !(range_low_hz.is_finite() && range_high_hz.is_finite() && range_low_hz <= range_high_hz) {
            return Err(ConfigError::InvalidRange { low: range_low_hz, high: range_high_hz });
        }
        if !(tolerance_hz.is_finite() && tolerance_hz >= 0.0) {
            return Err(ConfigError::InvalidThreshold { name: "tuning tolerance", value: tolerance_hz });
        }
        Ok(Self { note_table, range_low_hz, range_high_hz, tolerance_hz })
    }

    pub fn note_table(&self) -> &[NoteEntry] {
        &self.note_table
    }

    /// Classifies against the configured instrument range.
    pub fn classify(&self, pitch: &PitchEstimate) -> NoteClassification {
        self.classify_in_range(pitch, self.range_low_hz, self.range_high_hz)
    }

    /// Classifies against an explicit `[range_low_hz, range_high_hz]` range.
    pub fn classify_in_range(
        &self,
        pitch: &PitchEstimate,
        range_low_hz: f32,
        range_high_hz: f32,
    ) -> NoteClassification {
        let Some(frequency) = pitch.frequency() else {
            return NoteClassification::NoSignal;
        };
        if !(range_low_hz..=range_high_hz).contains(&frequency) {
            return NoteClassification::NoSignal;
        }

        let Some(note) = self.find_nearest_note(frequency) else {
            return NoteClassification::NoSignal;
        };
        let deviation_hz = frequency - note.reference_frequency_hz;

        NoteClassification::Matched {
            note: note.clone(),
            deviation_hz,
            deviation_cents: calculate_cents_deviation(frequency, note.reference_frequency_hz),
            in_tune: deviation_hz.abs() <= self.tolerance_hz,
        }
    }

    /// Entry closest to `freq`. On a tie the earlier entry wins.
    pub fn find_nearest_note(&self, freq: f32) -> Option<&NoteEntry> {
        self.note_table
            .iter()
            .fold(None, |best: Option<(&NoteEntry, f32)>, entry| {
                let distance = (entry.reference_frequency_hz - freq).abs();
                match best {
                    Some((_, best_distance)) if best_distance <= distance => best,
                    _ => Some((entry, distance)),
                }
            })
            .map(|(entry, _)| entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detected(frequency_hz: f32) -> PitchEstimate {
        PitchEstimate::Detected { frequency_hz, confidence: 0.95 }
    }

    fn two_note_table() -> Vec<NoteEntry> {
        vec![
            NoteEntry::new("Low", 100.0, "L"),
            NoteEntry::new("High", 110.0, "H"),
        ]
    }

    #[test]
    fn default_table_spans_the_reed_range() {
        let table = default_note_table();
        assert_eq!(table.len(), 14);
        assert_eq!(table[0].concert_note, "A#2");
        assert_eq!(table[0].display_note, "C4");
        assert_eq!(table[13].concert_note, "B3");
        assert_eq!(table[13].display_note, "C#5");
        assert!((table[0].reference_frequency_hz - 116.54).abs() < 0.01);
        assert!((table[13].reference_frequency_hz - 246.94).abs() < 0.01);
        assert!(table.windows(2).all(|w| w[0].reference_frequency_hz < w[1].reference_frequency_hz));
    }

    #[test]
    fn default_table_is_equal_tempered() {
        let semitone = 2.0_f32.powf(1.0 / 12.0);
        for pair in default_note_table().windows(2) {
            let ratio = pair[1].reference_frequency_hz / pair[0].reference_frequency_hz;
            assert!((ratio - semitone).abs() < 1e-4, "{} -> {}", pair[0].concert_note, pair[1].concert_note);
        }
        let a3 = default_note_table().iter().find(|n| n.concert_note == "A3").unwrap();
        assert!((a3.reference_frequency_hz - 220.0).abs() < 1e-3);
    }

    #[test]
    fn key_names_follow_piano_layout() {
        assert_eq!(key_name(0), "A0");
        assert_eq!(key_name(3), "C1");
        assert_eq!(key_name(48), "A4");
        assert_eq!(key_name(51), "C5");
    }

    #[test]
    fn no_pitch_is_no_signal() {
        let classifier = NoteClassifier::default();
        assert_eq!(classifier.classify(&PitchEstimate::NoPitch), NoteClassification::NoSignal);
    }

    #[test]
    fn out_of_range_is_no_signal() {
        let classifier = NoteClassifier::default();
        assert!(classifier.classify(&detected(300.0)).is_no_signal());
        assert!(classifier.classify(&detected(100.0)).is_no_signal());
        assert!(classifier.classify_in_range(&detected(300.0), 100.0, 400.0).matched_note().is_some());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let classifier = NoteClassifier::default();
        assert!(classifier.classify(&detected(115.0)).matched_note().is_some());
        assert!(classifier.classify(&detected(250.0)).matched_note().is_some());
    }

    #[test]
    fn matches_nearest_default_note() {
        let classifier = NoteClassifier::default();
        let result = classifier.classify(&detected(194.5));
        let note = result.matched_note().unwrap();
        assert_eq!(note.concert_note, "G3");
        assert_eq!(note.display_note, "A4");
        assert!(result.deviation_hz().unwrap() < 0.0);
        assert!(!result.is_in_tune());
    }

    #[test]
    fn equidistant_frequency_picks_first_entry() {
        let classifier = NoteClassifier::new(two_note_table(), 0.0, 1000.0, 1.0).unwrap();
        for _ in 0..10 {
            let result = classifier.classify(&detected(105.0));
            assert_eq!(result.matched_note().unwrap().display_note, "Low");
        }
    }

    #[test]
    fn duplicate_references_pick_first_entry() {
        let table = vec![
            NoteEntry::new("First", 150.0, "X"),
            NoteEntry::new("Second", 150.0, "Y"),
        ];
        let classifier = NoteClassifier::new(table, 0.0, 1000.0, 1.0).unwrap();
        assert_eq!(classifier.find_nearest_note(150.0).unwrap().display_note, "First");
    }

    #[test]
    fn in_tune_boundary_is_inclusive() {
        let table = vec![NoteEntry::new("Ref", 200.0, "R")];
        let classifier = NoteClassifier::new(table, 0.0, 1000.0, 1.0).unwrap();

        let exact = classifier.classify(&detected(201.0));
        assert_eq!(exact.deviation_hz(), Some(1.0));
        assert!(exact.is_in_tune());
        assert!(classifier.classify(&detected(199.0)).is_in_tune());

        assert!(!classifier.classify(&detected(201.0001)).is_in_tune());
        assert!(!classifier.classify(&detected(198.9999)).is_in_tune());
    }

    #[test]
    fn cents_deviation() {
        assert!((calculate_cents_deviation(440.0, 440.0)).abs() < 1e-4);
        assert!((calculate_cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!(calculate_cents_deviation(438.0, 440.0) < 0.0);
    }

    #[test]
    fn classifier_rejects_bad_configuration() {
        assert_eq!(
            NoteClassifier::new(Vec::new(), 115.0, 250.0, 1.0).unwrap_err(),
            ConfigError::EmptyNoteTable
        );
        assert!(matches!(
            NoteClassifier::new(two_note_table(), 250.0, 115.0, 1.0),
            Err(ConfigError::InvalidRange { .. })
        ));
        assert!(matches!(
            NoteClassifier::new(two_note_table(), 115.0, 250.0, -1.0),
            Err(ConfigError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            NoteClassifier::new(vec![NoteEntry::new("Bad", 0.0, "B")], 115.0, 250.0, 1.0),
            Err(ConfigError::InvalidNoteEntry { index: 0, .. })
        ));
    }
}
