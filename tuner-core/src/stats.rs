//! # Signal Statistics
//!
//! Pure energy measurements over a sample buffer. RMS gates silence before
//! pitch estimation; the peak amplitude only feeds the display meter.

/// Root-mean-square energy of the buffer. Returns 0.0 for an empty buffer.
pub fn compute_rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Largest absolute sample value. Returns 0.0 for an empty buffer.
pub fn compute_peak_abs(signal: &[f32]) -> f32 {
    signal.iter().fold(0.0_f32, |peak, &s| peak.max(s.abs()))
}

/// Maps the peak amplitude to a display percentage, `min(100, peak * 100)`.
pub fn amplitude_percent(signal: &[f32]) -> f32 {
    (compute_peak_abs(signal) * 100.0).min(100.0)
}
