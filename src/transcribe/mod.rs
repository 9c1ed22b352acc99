//! ASR routing layer (§4.5): local/cloud backend contract, the router that
//! resolves `LOCAL_ONLY` / `HYBRID` / `CLOUD_PRIMARY` modes, and the per-call
//! fallback algorithm.

pub mod cloud;
pub mod local;

pub use cloud::CloudAsrBackend;
pub use local::{LocalAsrBackend, ModelProfile};

use crate::error::RecognitionError;
use crate::types::TranscriptEvent;

/// Contract every ASR backend honors.
pub trait AsrBackend: Send + Sync {
    fn transcribe(&self, samples: &[f32]) -> Result<Vec<TranscriptEvent>, RecognitionError>;
}

/// Which backend actually served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Cloud,
}

/// Resolved routing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrMode {
    LocalOnly,
    Hybrid,
    CloudPrimary,
}

/// Outcome of one router call.
#[derive(Debug, Clone)]
pub struct AsrResult {
    pub events: Vec<TranscriptEvent>,
    pub backend_used: Option<BackendKind>,
    pub fallback_used: bool,
    pub mode: AsrMode,
}

/// Selects between local and cloud ASR backends per [`AsrMode`], with
/// per-call local→cloud fallback in `HYBRID` mode.
pub struct AsrRouter {
    mode: AsrMode,
    local: Option<Box<dyn AsrBackend>>,
    cloud: Option<Box<dyn AsrBackend>>,
}

impl AsrRouter {
    /// Construct the router, refusing to start if the resolved mode lacks a
    /// backend it requires.
    pub fn new(
        mode: AsrMode,
        local: Option<Box<dyn AsrBackend>>,
        cloud: Option<Box<dyn AsrBackend>>,
    ) -> Result<Self, RecognitionError> {
        match mode {
            AsrMode::LocalOnly if local.is_none() => {
                return Err(RecognitionError::RouterMisconfigured(
                    "LOCAL_ONLY mode requires a local ASR backend".to_string(),
                ));
            }
            AsrMode::Hybrid if local.is_none() || cloud.is_none() => {
                return Err(RecognitionError::RouterMisconfigured(
                    "HYBRID mode requires both a local and a cloud ASR backend".to_string(),
                ));
            }
            AsrMode::CloudPrimary if cloud.is_none() => {
                return Err(RecognitionError::RouterMisconfigured(
                    "CLOUD_PRIMARY mode requires a cloud ASR backend and credentials".to_string(),
                ));
            }
            _ => {}
        }
        Ok(Self { mode, local, cloud })
    }

    pub fn mode(&self) -> AsrMode {
        self.mode
    }

    /// Empty audio short-circuits to an empty event list without touching
    /// any backend.
    pub fn transcribe(&self, samples: &[f32]) -> Result<AsrResult, RecognitionError> {
        if samples.is_empty() {
            return Ok(AsrResult {
                events: Vec::new(),
                backend_used: None,
                fallback_used: false,
                mode: self.mode,
            });
        }

        match self.mode {
            AsrMode::LocalOnly => {
                let events = self
                    .local
                    .as_ref()
                    .expect("LOCAL_ONLY router constructed without a local backend")
                    .transcribe(samples)?;
                Ok(AsrResult {
                    events,
                    backend_used: Some(BackendKind::Local),
                    fallback_used: false,
                    mode: self.mode,
                })
            }
            AsrMode::CloudPrimary => {
                let events = self
                    .cloud
                    .as_ref()
                    .expect("CLOUD_PRIMARY router constructed without a cloud backend")
                    .transcribe(samples)?;
                Ok(AsrResult {
                    events,
                    backend_used: Some(BackendKind::Cloud),
                    fallback_used: false,
                    mode: self.mode,
                })
            }
            AsrMode::Hybrid => {
                let local = self
                    .local
                    .as_ref()
                    .expect("HYBRID router constructed without a local backend");
                match local.transcribe(samples) {
                    Ok(events) => Ok(AsrResult {
                        events,
                        backend_used: Some(BackendKind::Local),
                        fallback_used: false,
                        mode: self.mode,
                    }),
                    Err(local_err) => {
                        let cloud = self
                            .cloud
                            .as_ref()
                            .expect("HYBRID router constructed without a cloud backend");
                        match cloud.transcribe(samples) {
                            Ok(events) => {
                                tracing::warn!(
                                    error = %local_err,
                                    "local ASR failed; fell back to cloud"
                                );
                                Ok(AsrResult {
                                    events,
                                    backend_used: Some(BackendKind::Cloud),
                                    fallback_used: true,
                                    mode: self.mode,
                                })
                            }
                            Err(cloud_err) => Err(RecognitionError::HybridBothFailed {
                                local: local_err.to_string(),
                                cloud: cloud_err.to_string(),
                            }),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBackend {
        fail: bool,
        text: &'static str,
    }

    impl AsrBackend for StubBackend {
        fn transcribe(&self, _samples: &[f32]) -> Result<Vec<TranscriptEvent>, RecognitionError> {
            if self.fail {
                Err(RecognitionError::TranscriptionFailed(
                    "stub failure".to_string(),
                ))
            } else {
                Ok(vec![TranscriptEvent::final_event(self.text, 0.9)])
            }
        }
    }

    #[test]
    fn empty_audio_never_touches_a_backend() {
        let router = AsrRouter::new(
            AsrMode::LocalOnly,
            Some(Box::new(StubBackend {
                fail: true,
                text: "",
            })),
            None,
        )
        .unwrap();
        let result = router.transcribe(&[]).unwrap();
        assert!(result.events.is_empty());
        assert_eq!(result.backend_used, None);
    }

    #[test]
    fn local_only_propagates_local_error() {
        let router = AsrRouter::new(
            AsrMode::LocalOnly,
            Some(Box::new(StubBackend {
                fail: true,
                text: "",
            })),
            None,
        )
        .unwrap();
        assert!(router.transcribe(&[0.1]).is_err());
    }

    #[test]
    fn hybrid_falls_back_to_cloud_on_local_error() {
        let router = AsrRouter::new(
            AsrMode::Hybrid,
            Some(Box::new(StubBackend {
                fail: true,
                text: "",
            })),
            Some(Box::new(StubBackend {
                fail: false,
                text: "from cloud",
            })),
        )
        .unwrap();
        let result = router.transcribe(&[0.1]).unwrap();
        assert_eq!(result.backend_used, Some(BackendKind::Cloud));
        assert!(result.fallback_used);
        assert_eq!(result.events[0].text, "from cloud");
    }

    #[test]
    fn hybrid_reports_both_errors_when_both_fail() {
        let router = AsrRouter::new(
            AsrMode::Hybrid,
            Some(Box::new(StubBackend {
                fail: true,
                text: "",
            })),
            Some(Box::new(StubBackend {
                fail: true,
                text: "",
            })),
        )
        .unwrap();
        let err = router.transcribe(&[0.1]).unwrap_err();
        assert!(matches!(err, RecognitionError::HybridBothFailed { .. }));
    }

    #[test]
    fn hybrid_without_both_backends_refuses_to_construct() {
        let err = AsrRouter::new(
            AsrMode::Hybrid,
            Some(Box::new(StubBackend {
                fail: false,
                text: "x",
            })),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, RecognitionError::RouterMisconfigured(_)));
    }

    #[test]
    fn cloud_primary_never_touches_local() {
        let router = AsrRouter::new(
            AsrMode::CloudPrimary,
            None,
            Some(Box::new(StubBackend {
                fail: false,
                text: "cloud text",
            })),
        )
        .unwrap();
        let result = router.transcribe(&[0.1]).unwrap();
        assert_eq!(result.backend_used, Some(BackendKind::Cloud));
        assert!(!result.fallback_used);
    }
}
