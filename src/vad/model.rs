//! Model-backed VAD using whisper-rs's bundled Silero-in-GGML VAD context.
//!
//! Grounded in the reference Whisper VAD adapter; reshaped from
//! whole-utterance `detect()` to the per-frame `process(frame) -> bool`
//! contract — speech is detected iff the model returns any speech interval
//! for the frame.

use std::sync::Mutex;

use whisper_rs::{WhisperVadContext, WhisperVadContextParams, WhisperVadParams};

use super::VadProcessor;
use crate::error::RecognitionError;
use crate::types::AudioFrame;

pub struct ModelVad {
    ctx: Mutex<WhisperVadContext>,
    threshold: f32,
}

impl ModelVad {
    pub fn load(model_path: &str, threshold: f32) -> Result<Self, RecognitionError> {
        let params = WhisperVadContextParams::default();
        let ctx = WhisperVadContext::new(model_path, params)
            .map_err(|e| RecognitionError::ModelLoadFailed(format!("VAD model: {e}")))?;
        tracing::info!(model_path, "voice activity detection model loaded");
        Ok(Self {
            ctx: Mutex::new(ctx),
            threshold: threshold.clamp(0.0, 1.0),
        })
    }
}

// WhisperVadContext is not Send/Sync on its own; the Mutex above serializes
// all access, and the coordinator only ever calls `process` from its single
// worker thread.
unsafe impl Send for ModelVad {}
unsafe impl Sync for ModelVad {}

impl VadProcessor for ModelVad {
    fn process(&mut self, frame: &AudioFrame) -> bool {
        if frame.samples.is_empty() {
            return false;
        }
        let mut ctx = match self.ctx.lock() {
            Ok(ctx) => ctx,
            Err(_) => {
                tracing::warn!("VAD context lock poisoned; treating frame as silence");
                return false;
            }
        };
        let mut params = WhisperVadParams::new();
        params.set_threshold(self.threshold);
        match ctx.segments_from_samples(params, &frame.samples) {
            Ok(segments) => segments.num_segments() > 0,
            Err(e) => {
                tracing::warn!(error = %e, "VAD inference failed; treating frame as silence");
                false
            }
        }
    }

    fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.0, 1.0);
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }
}
