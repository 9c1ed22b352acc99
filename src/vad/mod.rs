//! Voice activity detection (§4.4): a single per-frame contract,
//! `process(frame) -> bool`, backed by either the Whisper VAD model or an
//! RMS-energy fallback when no model is available.

mod energy;
mod model;

pub use energy::EnergyVad;
pub use model::ModelVad;

use crate::types::AudioFrame;

/// Common contract every VAD implementation honors. Threshold is settable at
/// runtime (reload-safe-to-apply); empty frames always return `false`.
pub trait VadProcessor: Send + Sync {
    fn process(&mut self, frame: &AudioFrame) -> bool;
    fn set_threshold(&mut self, threshold: f32);
    fn threshold(&self) -> f32;
}

/// `0.01 + (1 - threshold) * 0.04`, the energy-fallback RMS gate.
pub fn energy_threshold_for(threshold: f32) -> f32 {
    0.01 + (1.0 - threshold.clamp(0.0, 1.0)) * 0.04
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_threshold_monotonic_in_threshold() {
        let low = energy_threshold_for(0.0);
        let high = energy_threshold_for(1.0);
        assert!(low > high);
        assert!((low - 0.05).abs() < 1e-6);
        assert!((high - 0.01).abs() < 1e-6);
    }
}
