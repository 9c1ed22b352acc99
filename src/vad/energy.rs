//! RMS-energy voice activity detector, used when no VAD model is available.
//!
//! Grounded in the reference energy VAD: filters out near-silent frames
//! without requiring a model download, now reshaped to the per-frame
//! `process(frame) -> bool` contract rather than whole-utterance analysis.

use super::{energy_threshold_for, VadProcessor};
use crate::types::AudioFrame;

pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }
}

impl VadProcessor for EnergyVad {
    fn process(&mut self, frame: &AudioFrame) -> bool {
        if frame.samples.is_empty() {
            return false;
        }
        frame.rms() > energy_threshold_for(self.threshold)
    }

    fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.0, 1.0);
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CANONICAL_SAMPLE_RATE_HZ;

    fn frame(samples: Vec<f32>) -> AudioFrame {
        AudioFrame::new(samples, CANONICAL_SAMPLE_RATE_HZ, 0.0)
    }

    #[test]
    fn empty_frame_is_never_speech() {
        let mut vad = EnergyVad::new(0.5);
        assert!(!vad.process(&frame(vec![])));
    }

    #[test]
    fn silence_is_not_speech() {
        let mut vad = EnergyVad::new(0.5);
        assert!(!vad.process(&frame(vec![0.0; 320])));
    }

    #[test]
    fn loud_tone_is_speech() {
        let mut vad = EnergyVad::new(0.5);
        let samples: Vec<f32> = (0..320)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.5)
            .collect();
        assert!(vad.process(&frame(samples)));
    }

    #[test]
    fn runtime_threshold_change_takes_effect_immediately() {
        let mut vad = EnergyVad::new(0.0); // most permissive energy threshold
        let quiet: Vec<f32> = (0..320)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.02)
            .collect();
        assert!(vad.process(&frame(quiet.clone())));
        vad.set_threshold(1.0); // strictest energy threshold
        assert!(!vad.process(&frame(quiet)));
    }
}
