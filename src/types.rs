//! Shared data model for the audio → ASR → command pipeline.
//!
//! These types cross thread boundaries (capture thread → worker thread) and
//! component boundaries (ASR → confidence filter → coordinator), so they are
//! kept small, `Clone`, and free of any backend-specific state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-wide counter of frames rejected by [`AudioFrame::is_valid`]. The
/// only piece of global mutable state in the pipeline; everything else is
/// owned by the runtime coordinator or passed explicitly.
static INVALID_FRAME_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn record_invalid_frame() {
    INVALID_FRAME_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn invalid_frame_count() -> u64 {
    INVALID_FRAME_COUNT.load(Ordering::Relaxed)
}

/// Wall-clock seconds since an arbitrary epoch, used wherever a component
/// expects a monotonic-ish `now: f64` it didn't get from an audio frame's own
/// timestamp.
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// An ordered sequence of modifier + key tokens pressed together, e.g.
/// `["ctrl", "c"]`. Lowercase, unvalidated until a keyboard backend parses it.
pub type KeyCombo = Vec<String>;

/// Canonical sample rate the ASR engines expect; capture frames at other
/// supported rates are resampled to this before inference.
pub const CANONICAL_SAMPLE_RATE_HZ: u32 = 16_000;

/// Capture sample rates accepted by the audio pipeline.
pub const SUPPORTED_SAMPLE_RATES_HZ: [u32; 6] = [8_000, 16_000, 22_050, 32_000, 44_100, 48_000];

/// A chunk of mono PCM audio captured at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
    /// Monotonic capture timestamp, seconds since an arbitrary epoch.
    pub timestamp: f64,
    /// Set once the VAD has classified this frame; `None` before classification.
    pub is_speech: Option<bool>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32, timestamp: f64) -> Self {
        Self {
            samples,
            sample_rate_hz,
            timestamp,
            is_speech: None,
        }
    }

    /// A frame is invalid if it carries any non-finite sample or an
    /// unsupported sample rate; invalid frames are rejected with a counter
    /// increment rather than propagated as an error.
    pub fn is_valid(&self) -> bool {
        SUPPORTED_SAMPLE_RATES_HZ.contains(&self.sample_rate_hz)
            && self.samples.iter().all(|s| s.is_finite())
    }

    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum_sq / self.samples.len() as f32).sqrt()
    }
}

/// A piece of transcript text emitted by an ASR backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    pub language: Option<String>,
    pub start_seconds: Option<f64>,
    pub end_seconds: Option<f64>,
}

impl TranscriptEvent {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            confidence: 1.0,
            language: None,
            start_seconds: None,
            end_seconds: None,
        }
    }

    pub fn final_event(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            confidence,
            language: None,
            start_seconds: None,
            end_seconds: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nan_and_inf_frames() {
        let f = AudioFrame::new(vec![0.1, f32::NAN], CANONICAL_SAMPLE_RATE_HZ, 0.0);
        assert!(!f.is_valid());
        let f = AudioFrame::new(vec![0.1, f32::INFINITY], CANONICAL_SAMPLE_RATE_HZ, 0.0);
        assert!(!f.is_valid());
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        let f = AudioFrame::new(vec![0.0], 11_025, 0.0);
        assert!(!f.is_valid());
    }

    #[test]
    fn rms_of_silence_is_zero() {
        let f = AudioFrame::new(vec![0.0; 160], CANONICAL_SAMPLE_RATE_HZ, 0.0);
        assert_eq!(f.rms(), 0.0);
    }
}
