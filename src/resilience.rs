//! Runtime error taxonomy, bounded retry policy, and safety-fallback decisions.
//!
//! Grounded in the reference resilience/runtime-error modules: a closed set of
//! runtime error codes each carrying a stable remediation string, a simple
//! fixed-backoff retry schedule, and the logic that decides when a safety
//! issue (e.g. a disconnected microphone) must force the state machine into
//! `PAUSED`.

use crate::state_machine::{AppEvent, AppState};

/// Category bucket for a [`RuntimeErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorCategory {
    Audio,
    Recognition,
    Injection,
    Config,
}

/// Closed taxonomy of runtime error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeErrorCode {
    NoMicrophone,
    MicrophoneDisconnected,
    HotkeyConflict,
    ModelChecksumFailed,
    KeyboardBlocked,
}

/// Static, immutable description of a runtime error code.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeErrorInfo {
    pub code: RuntimeErrorCode,
    pub category: RuntimeErrorCategory,
    pub title: &'static str,
    pub remediation: &'static str,
    pub retryable: bool,
    pub safety_critical: bool,
}

impl RuntimeErrorInfo {
    /// Combine the static remediation with a dynamic detail string.
    pub fn actionable_message(&self, detail: &str) -> String {
        if detail.is_empty() {
            format!("{}: {}", self.title, self.remediation)
        } else {
            format!("{}: {} ({})", self.title, self.remediation, detail)
        }
    }
}

/// Look up the static info record for a runtime error code.
pub fn runtime_error_info(code: RuntimeErrorCode) -> RuntimeErrorInfo {
    match code {
        RuntimeErrorCode::NoMicrophone => RuntimeErrorInfo {
            code,
            category: RuntimeErrorCategory::Audio,
            title: "No microphone available",
            remediation: "Connect a microphone and check OS sound settings.",
            retryable: true,
            safety_critical: false,
        },
        RuntimeErrorCode::MicrophoneDisconnected => RuntimeErrorInfo {
            code,
            category: RuntimeErrorCategory::Audio,
            title: "Microphone disconnected",
            remediation: "Reconnect the microphone; voicekey will retry automatically.",
            retryable: true,
            safety_critical: true,
        },
        RuntimeErrorCode::HotkeyConflict => RuntimeErrorInfo {
            code,
            category: RuntimeErrorCategory::Config,
            title: "Hotkey conflict",
            remediation: "Choose a different hotkey combination in settings.",
            retryable: false,
            safety_critical: false,
        },
        RuntimeErrorCode::ModelChecksumFailed => RuntimeErrorInfo {
            code,
            category: RuntimeErrorCategory::Recognition,
            title: "Model checksum failed",
            remediation: "Re-download the speech model; the local copy may be corrupted.",
            retryable: false,
            safety_critical: false,
        },
        RuntimeErrorCode::KeyboardBlocked => RuntimeErrorInfo {
            code,
            category: RuntimeErrorCategory::Injection,
            title: "Keyboard injection blocked",
            remediation: "Grant input/accessibility permissions to voicekey and restart.",
            retryable: false,
            safety_critical: true,
        },
    }
}

/// Immutable, validated bounded-retry schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_seconds: Vec<f64>,
}

impl RetryPolicy {
    /// Construct a policy; `max_attempts` must be `>= 1` and `backoff_seconds`
    /// must be non-empty with every entry strictly positive.
    pub fn new(max_attempts: u32, backoff_seconds: Vec<f64>) -> Result<Self, String> {
        if max_attempts < 1 {
            return Err("max_attempts must be >= 1".to_string());
        }
        if backoff_seconds.is_empty() {
            return Err("backoff_seconds must be non-empty".to_string());
        }
        if backoff_seconds.iter().any(|&s| !(s > 0.0)) {
            return Err("backoff_seconds entries must be positive".to_string());
        }
        Ok(Self {
            max_attempts,
            backoff_seconds,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to apply after the `n`-th consecutive failure (`n >= 1`).
    /// Returns `None` once `n` exceeds `max_attempts`.
    pub fn next_delay_after_failure(&self, n: u32) -> Option<f64> {
        assert!(n >= 1, "failure count must be >= 1");
        if n > self.max_attempts {
            return None;
        }
        let idx = (n - 1).min(self.backoff_seconds.len() as u32 - 1) as usize;
        Some(self.backoff_seconds[idx])
    }
}

/// The microphone-reconnect retry policy used by the audio capture adapter.
pub fn microphone_reconnect_retry_policy() -> RetryPolicy {
    RetryPolicy::new(3, vec![1.0, 2.0, 4.0]).expect("microphone reconnect policy is valid")
}

/// Decision returned by [`decide_safety_fallback`].
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyFallbackDecision {
    pub force_pause: bool,
    pub pause_event: Option<AppEvent>,
}

/// Decide whether a runtime error code must force the state machine to `PAUSED`.
///
/// `MicrophoneDisconnected` only forces a pause once the retry budget is
/// exhausted (it is expected to recover on its own); any other
/// safety-critical code always forces a pause immediately.
pub fn decide_safety_fallback(
    code: RuntimeErrorCode,
    state: AppState,
    retries_exhausted: bool,
) -> SafetyFallbackDecision {
    let info = runtime_error_info(code);
    let should_pause = if !info.safety_critical {
        false
    } else if code == RuntimeErrorCode::MicrophoneDisconnected {
        retries_exhausted
    } else {
        true
    };

    if !should_pause {
        return SafetyFallbackDecision {
            force_pause: false,
            pause_event: None,
        };
    }

    SafetyFallbackDecision {
        force_pause: true,
        pause_event: pause_event_for_state(state),
    }
}

pub(crate) fn pause_event_for_state(state: AppState) -> Option<AppEvent> {
    match state {
        AppState::Standby => Some(AppEvent::PauseRequested),
        AppState::Listening => Some(AppEvent::InactivityAutoPause),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_rejects_invalid_construction() {
        assert!(RetryPolicy::new(0, vec![1.0]).is_err());
        assert!(RetryPolicy::new(1, vec![]).is_err());
        assert!(RetryPolicy::new(1, vec![0.0]).is_err());
        assert!(RetryPolicy::new(1, vec![-1.0]).is_err());
    }

    #[test]
    fn next_delay_follows_schedule_then_none() {
        let policy = microphone_reconnect_retry_policy();
        assert_eq!(policy.next_delay_after_failure(1), Some(1.0));
        assert_eq!(policy.next_delay_after_failure(2), Some(2.0));
        assert_eq!(policy.next_delay_after_failure(3), Some(4.0));
        assert_eq!(policy.next_delay_after_failure(4), None);
    }

    #[test]
    fn next_delay_clamps_past_schedule_length_within_max_attempts() {
        let policy = RetryPolicy::new(5, vec![1.0, 2.0]).unwrap();
        assert_eq!(policy.next_delay_after_failure(1), Some(1.0));
        assert_eq!(policy.next_delay_after_failure(2), Some(2.0));
        assert_eq!(policy.next_delay_after_failure(5), Some(2.0));
        assert_eq!(policy.next_delay_after_failure(6), None);
    }

    #[test]
    fn microphone_disconnected_pauses_only_after_retries_exhausted() {
        let decision = decide_safety_fallback(
            RuntimeErrorCode::MicrophoneDisconnected,
            AppState::Listening,
            false,
        );
        assert!(!decision.force_pause);

        let decision = decide_safety_fallback(
            RuntimeErrorCode::MicrophoneDisconnected,
            AppState::Listening,
            true,
        );
        assert!(decision.force_pause);
        assert_eq!(decision.pause_event, Some(AppEvent::InactivityAutoPause));
    }

    #[test]
    fn keyboard_blocked_always_pauses() {
        let decision =
            decide_safety_fallback(RuntimeErrorCode::KeyboardBlocked, AppState::Standby, false);
        assert!(decision.force_pause);
        assert_eq!(decision.pause_event, Some(AppEvent::PauseRequested));
    }

    #[test]
    fn non_safety_critical_code_never_pauses() {
        let decision =
            decide_safety_fallback(RuntimeErrorCode::HotkeyConflict, AppState::Listening, true);
        assert!(!decision.force_pause);
        assert_eq!(decision.pause_event, None);
    }

    #[test]
    fn pause_in_processing_or_error_has_no_event() {
        let decision = decide_safety_fallback(
            RuntimeErrorCode::KeyboardBlocked,
            AppState::Processing,
            false,
        );
        assert!(decision.force_pause);
        assert_eq!(decision.pause_event, None);
    }
}
