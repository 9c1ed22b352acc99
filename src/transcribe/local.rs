//! Local Faster-Whisper-compatible ASR backend (§4.5), grounded in the
//! reference whisper-rs transcriber: model path resolution by named profile,
//! short-clip `audio_ctx` optimization, and geometric-mean token confidence —
//! reshaped onto the `AsrBackend` contract with a bounded transcription
//! timeout and idempotent load/unload/switch.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::AsrBackend;
use crate::error::RecognitionError;
use crate::types::TranscriptEvent;

/// Named model-size presets over the same whisper.cpp engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProfile {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelProfile {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tiny" => Some(Self::Tiny),
            "base" => Some(Self::Base),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            _ => None,
        }
    }

    fn ggml_filename(self) -> &'static str {
        match self {
            Self::Tiny => "ggml-tiny.bin",
            Self::Base => "ggml-base.bin",
            Self::Small => "ggml-small.bin",
            Self::Medium => "ggml-medium.bin",
            Self::Large => "ggml-large-v3.bin",
        }
    }
}

struct LoadedModel {
    profile: ModelProfile,
    ctx: WhisperContext,
}

/// Local ASR backend. Model load is idempotent; `switch_model` unloads the
/// prior model before loading the requested one.
///
/// The fields that a bounded transcription call needs are held behind an
/// `Arc` (rather than directly on `LocalAsrBackend`) so a timed-out call can
/// hand its clone to a genuinely detached background thread: `whisper-rs`
/// inference is not cancellable mid-call, and `std::thread::scope` would
/// still block the caller until that thread finished regardless of what the
/// scope's closure returns, defeating the bound entirely.
pub struct LocalAsrBackend {
    inner: Arc<Inner>,
}

struct Inner {
    models_dir: PathBuf,
    language: String,
    threads: usize,
    /// `Duration::ZERO` disables the bound.
    transcription_timeout: Duration,
    loaded: Mutex<Option<LoadedModel>>,
}

impl LocalAsrBackend {
    pub fn new(models_dir: PathBuf, language: String, transcription_timeout_seconds: f64) -> Self {
        Self {
            inner: Arc::new(Inner {
                models_dir,
                language,
                threads: num_cpus::get().min(4),
                transcription_timeout: if transcription_timeout_seconds <= 0.0 {
                    Duration::ZERO
                } else {
                    Duration::from_secs_f64(transcription_timeout_seconds)
                },
                loaded: Mutex::new(None),
            }),
        }
    }

    /// No-op if `profile` is already loaded.
    pub fn load_model(&self, profile: ModelProfile) -> Result<(), RecognitionError> {
        self.inner.load_model(profile)
    }

    pub fn unload_model(&self) {
        self.inner.unload_model()
    }

    /// No-op if `profile` is already the loaded model; otherwise unloads
    /// then reloads exactly once.
    pub fn switch_model(&self, profile: ModelProfile) -> Result<(), RecognitionError> {
        self.inner.switch_model(profile)
    }
}

impl Inner {
    /// No-op if `profile` is already loaded.
    fn load_model(&self, profile: ModelProfile) -> Result<(), RecognitionError> {
        let mut guard = self.loaded.lock().expect("model mutex poisoned");
        if let Some(existing) = guard.as_ref() {
            if existing.profile == profile {
                return Ok(());
            }
        }
        let path = self.models_dir.join(profile.ggml_filename());
        let path_str = path
            .to_str()
            .ok_or_else(|| RecognitionError::ModelNotFound(path.display().to_string()))?;
        if !path.exists() {
            return Err(RecognitionError::ModelNotFound(path.display().to_string()));
        }
        tracing::info!(model = %path.display(), "loading local ASR model");
        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| RecognitionError::ModelLoadFailed(e.to_string()))?;
        *guard = Some(LoadedModel { profile, ctx });
        Ok(())
    }

    fn unload_model(&self) {
        let mut guard = self.loaded.lock().expect("model mutex poisoned");
        *guard = None;
    }

    /// No-op if `profile` is already the loaded model; otherwise unloads
    /// then reloads exactly once.
    fn switch_model(&self, profile: ModelProfile) -> Result<(), RecognitionError> {
        {
            let guard = self.loaded.lock().expect("model mutex poisoned");
            if matches!(guard.as_ref(), Some(m) if m.profile == profile) {
                return Ok(());
            }
        }
        self.unload_model();
        self.load_model(profile)
    }

    fn run_inference(&self, samples: &[f32]) -> Result<Vec<TranscriptEvent>, RecognitionError> {
        let guard = self.loaded.lock().expect("model mutex poisoned");
        let loaded = guard
            .as_ref()
            .ok_or_else(|| RecognitionError::ModelNotFound("no local model loaded".to_string()))?;

        let duration_secs = samples.len() as f32 / crate::types::CANONICAL_SAMPLE_RATE_HZ as f32;
        let mut state = loaded
            .ctx
            .create_state()
            .map_err(|e| RecognitionError::TranscriptionFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.language));
        }
        params.set_n_threads(self.threads as i32);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_blank(true);
        if duration_secs < 30.0 {
            params.set_single_segment(true);
        }
        if let Some(audio_ctx) = audio_ctx_for(duration_secs) {
            params.set_audio_ctx(audio_ctx);
        }

        state
            .full(params, samples)
            .map_err(|e| RecognitionError::TranscriptionFailed(e.to_string()))?;

        let mut events = Vec::new();
        let mut full_text = String::new();
        for segment in state.as_iter() {
            let text = segment
                .to_str()
                .map_err(|e| RecognitionError::TranscriptionFailed(e.to_string()))?
                .trim()
                .to_string();
            if text.is_empty() {
                continue;
            }
            full_text.push_str(&text);
            full_text.push(' ');

            let n_tokens = segment.n_tokens();
            let mut log_probs = Vec::with_capacity(n_tokens as usize);
            for i in 0..n_tokens {
                if let Some(token) = segment.get_token(i) {
                    let p = token.token_probability().max(1e-6);
                    log_probs.push(p.ln());
                }
            }
            let avg_logprob = if log_probs.is_empty() {
                -2.0
            } else {
                log_probs.iter().sum::<f32>() / log_probs.len() as f32
            };
            events.push(TranscriptEvent::final_event(
                text,
                confidence_from_avg_logprob(avg_logprob),
            ));
        }

        let interim = TranscriptEvent::interim(full_text.trim().to_string());
        let mut out = Vec::with_capacity(events.len() + 1);
        out.push(interim);
        out.extend(events);
        Ok(out)
    }
}

impl AsrBackend for LocalAsrBackend {
    fn transcribe(&self, samples: &[f32]) -> Result<Vec<TranscriptEvent>, RecognitionError> {
        let timeout = self.inner.transcription_timeout;
        if timeout.is_zero() {
            return self.inner.run_inference(samples);
        }

        // whisper-rs inference is not cancellable mid-call. A detached
        // thread (not `thread::scope`, which blocks its caller until every
        // spawned thread finishes regardless of what the closure returns)
        // lets this call give up at the configured bound while the
        // in-flight inference runs to completion in the background and its
        // result is simply dropped, per the coordinator's "drop in-flight
        // results on timeout" semantics.
        let (tx, rx) = mpsc::channel();
        let samples = samples.to_vec();
        let inner = Arc::clone(&self.inner);
        let start = Instant::now();
        std::thread::spawn(move || {
            let result = inner.run_inference(&samples);
            let _ = tx.send(result);
        });
        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    elapsed_s = start.elapsed().as_secs_f64(),
                    "local transcription exceeded the configured timeout"
                );
                Err(RecognitionError::TranscriptionTimeout(timeout.as_secs_f64()))
            }
        }
    }
}

/// `duration_secs * 50 + 64`, valid only for clips under 22.5s.
fn audio_ctx_for(duration_secs: f32) -> Option<i32> {
    if duration_secs <= 22.5 {
        Some((duration_secs * 50.0) as i32 + 64)
    } else {
        None
    }
}

fn confidence_from_avg_logprob(avg_logprob: f32) -> f32 {
    ((avg_logprob + 2.0) / 4.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_profile_parses_known_names() {
        assert_eq!(ModelProfile::parse("tiny"), Some(ModelProfile::Tiny));
        assert_eq!(ModelProfile::parse("large"), Some(ModelProfile::Large));
        assert_eq!(ModelProfile::parse("huge"), None);
    }

    #[test]
    fn confidence_formula_matches_spec() {
        assert_eq!(confidence_from_avg_logprob(-2.0), 0.0);
        assert_eq!(confidence_from_avg_logprob(2.0), 1.0);
        assert_eq!(confidence_from_avg_logprob(0.0), 0.5);
    }

    #[test]
    fn confidence_clamps_outside_bounds() {
        assert_eq!(confidence_from_avg_logprob(-10.0), 0.0);
        assert_eq!(confidence_from_avg_logprob(10.0), 1.0);
    }

    #[test]
    fn audio_ctx_formula_applies_only_under_22_5s() {
        assert_eq!(audio_ctx_for(1.0), Some(114));
        assert_eq!(audio_ctx_for(22.5), Some(1189));
        assert_eq!(audio_ctx_for(30.0), None);
    }

    #[test]
    fn load_model_on_missing_file_reports_model_not_found() {
        let backend = LocalAsrBackend::new(PathBuf::from("/nonexistent/models"), "en".to_string(), 30.0);
        let err = backend.load_model(ModelProfile::Tiny).unwrap_err();
        assert!(matches!(err, RecognitionError::ModelNotFound(_)));
    }

    #[test]
    fn transcribe_without_a_loaded_model_fails() {
        let backend = LocalAsrBackend::new(PathBuf::from("/nonexistent/models"), "en".to_string(), 0.0);
        let err = backend.transcribe(&[0.1, 0.2]).unwrap_err();
        assert!(matches!(err, RecognitionError::ModelNotFound(_)));
    }
}
