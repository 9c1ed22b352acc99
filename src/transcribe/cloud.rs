//! Cloud ASR backend: an OpenAI-compatible JSON transcription endpoint over
//! HTTPS, grounded in the reference remote transcriber's `ureq`-based request
//! building and bearer-auth/JSON-parsing pattern — reshaped from multipart
//! WAV upload to the raw-PCM JSON contract, and with plaintext HTTP rejected
//! outright rather than merely warned about.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;

use super::AsrBackend;
use crate::error::RecognitionError;
use crate::types::{TranscriptEvent, CANONICAL_SAMPLE_RATE_HZ};

const ENV_API_KEY: &str = "VOICEKEY_OPENAI_API_KEY";

/// Cloud ASR backend. Construction fails closed on non-HTTPS endpoints.
pub struct CloudAsrBackend {
    api_base: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl CloudAsrBackend {
    /// `api_key` overrides the environment; pass `None` to read
    /// `VOICEKEY_OPENAI_API_KEY`.
    pub fn new(
        api_base: String,
        model: String,
        api_key: Option<String>,
        timeout_seconds: f64,
    ) -> Result<Self, RecognitionError> {
        if !api_base.starts_with("https://") {
            return Err(RecognitionError::RouterMisconfigured(format!(
                "cloud ASR api_base must use https://, got: {api_base}"
            )));
        }
        let api_key = api_key
            .or_else(|| std::env::var(ENV_API_KEY).ok())
            .ok_or_else(|| {
                RecognitionError::RouterMisconfigured(format!(
                    "cloud ASR requires an API key; set {ENV_API_KEY} or pass one explicitly"
                ))
            })?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            api_key,
            timeout: Duration::from_secs_f64(timeout_seconds.max(0.0)),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.api_base)
    }
}

impl AsrBackend for CloudAsrBackend {
    fn transcribe(&self, samples: &[f32]) -> Result<Vec<TranscriptEvent>, RecognitionError> {
        let audio_base64 = BASE64.encode(pcm_f32le_bytes(samples));
        let body = json!({
            "model": self.model,
            "encoding": "pcm_f32le",
            "sample_rate_hz": CANONICAL_SAMPLE_RATE_HZ,
            "audio_base64": audio_base64,
        });

        let request = ureq::post(&self.endpoint())
            .timeout(self.timeout)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.api_key));

        let response = request
            .send_json(body)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => RecognitionError::CloudHttp(code),
                ureq::Error::Transport(t) => RecognitionError::CloudTransport(t.to_string()),
            })?;

        let value: serde_json::Value = response
            .into_json()
            .map_err(|e| RecognitionError::CloudJson(e.to_string()))?;

        let text = value
            .get("text")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RecognitionError::CloudEmptyText)?;

        let confidence = value
            .get("confidence")
            .and_then(|v| v.as_f64())
            .map(|c| c.clamp(0.0, 1.0) as f32)
            .unwrap_or(1.0);

        Ok(vec![TranscriptEvent::final_event(text, confidence)])
    }
}

fn pcm_f32le_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_plaintext_http_at_construction() {
        let err = CloudAsrBackend::new(
            "http://example.com".to_string(),
            "whisper-1".to_string(),
            Some("key".to_string()),
            30.0,
        )
        .unwrap_err();
        assert!(matches!(err, RecognitionError::RouterMisconfigured(_)));
    }

    #[test]
    fn requires_an_api_key_from_argument_or_env() {
        std::env::remove_var(ENV_API_KEY);
        let err = CloudAsrBackend::new(
            "https://api.example.com".to_string(),
            "whisper-1".to_string(),
            None,
            30.0,
        )
        .unwrap_err();
        assert!(matches!(err, RecognitionError::RouterMisconfigured(_)));
    }

    #[test]
    fn endpoint_path_matches_the_exact_contract() {
        let backend = CloudAsrBackend::new(
            "https://api.example.com/".to_string(),
            "whisper-1".to_string(),
            Some("key".to_string()),
            30.0,
        )
        .unwrap();
        assert_eq!(backend.endpoint(), "https://api.example.com/audio/transcriptions");
    }

    #[test]
    fn pcm_encoding_round_trips_sample_count() {
        let samples = vec![0.0_f32, 0.5, -0.5, 1.0];
        let bytes = pcm_f32le_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 4);
    }
}
