//! Lifecycle state machine for the voicekey runtime.
//!
//! Defines the states governing the wake / listen / process / pause /
//! shutdown lifecycle, a strict mode-parameterized transition table, and a
//! mutex-guarded machine whose `transition()` is the single place the whole
//! runtime crosses from one state to the next.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Application lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    Initializing,
    Standby,
    Listening,
    Processing,
    Paused,
    ShuttingDown,
    Error,
}

/// Listening-mode policy, fixed at state-machine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListeningMode {
    WakeWord,
    Toggle,
    Continuous,
}

/// Events that may be fed to [`VoiceKeyStateMachine::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppEvent {
    InitSucceeded,
    InitFailed,
    WakePhraseDetected,
    ToggleListeningOn,
    ContinuousStart,
    SpeechFrameReceived,
    PartialHandled,
    FinalHandled,
    WakeWindowTimeout,
    InactivityAutoPause,
    StopRequested,
    PauseRequested,
    ResumeRequested,
    ShutdownComplete,
}

/// Snapshot of a successful transition, returned atomically under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionResult {
    pub from: AppState,
    pub to: AppState,
    pub event: AppEvent,
}

/// Hooks fired once on construction and once on entering `ShuttingDown`.
pub trait ModeHooks: Send + Sync {
    fn on_mode_enter(&self, _mode: ListeningMode) {}
    fn on_mode_exit(&self, _mode: ListeningMode) {}
}

struct NoOpModeHooks;
impl ModeHooks for NoOpModeHooks {}

fn common_transition(state: AppState, event: AppEvent) -> Option<AppState> {
    use AppEvent::*;
    use AppState::*;
    match (state, event) {
        (Initializing, InitSucceeded) => Some(Standby),
        (Initializing, InitFailed) => Some(Error),
        (Listening, SpeechFrameReceived) => Some(Processing),
        (Processing, PartialHandled) => Some(Listening),
        (Processing, FinalHandled) => Some(Listening),
        (Listening, WakeWindowTimeout) => Some(Standby),
        (Listening, InactivityAutoPause) => Some(Paused),
        (Listening, StopRequested) => Some(ShuttingDown),
        (Processing, StopRequested) => Some(ShuttingDown),
        (Standby, PauseRequested) => Some(Paused),
        (Paused, ResumeRequested) => Some(Standby),
        (Standby, StopRequested) => Some(ShuttingDown),
        (Paused, StopRequested) => Some(ShuttingDown),
        (Error, StopRequested) => Some(ShuttingDown),
        (ShuttingDown, ShutdownComplete) => None, // terminal: handled specially below
        _ => None,
    }
}

fn mode_transition(mode: ListeningMode, state: AppState, event: AppEvent) -> Option<AppState> {
    use AppEvent::*;
    use AppState::*;
    match (mode, state, event) {
        (ListeningMode::WakeWord, Standby, WakePhraseDetected) => Some(Listening),
        (ListeningMode::Toggle, Standby, ToggleListeningOn) => Some(Listening),
        (ListeningMode::Continuous, Standby, ContinuousStart) => Some(Listening),
        _ => None,
    }
}

/// Thread-safe lifecycle state machine, parameterized by a fixed listening mode.
pub struct VoiceKeyStateMachine {
    mode: ListeningMode,
    inner: Mutex<Inner>,
    hooks: Box<dyn ModeHooks>,
}

struct Inner {
    state: AppState,
    terminated: bool,
}

impl VoiceKeyStateMachine {
    pub fn new(mode: ListeningMode) -> Self {
        Self::with_hooks(mode, Box::new(NoOpModeHooks))
    }

    pub fn with_hooks(mode: ListeningMode, hooks: Box<dyn ModeHooks>) -> Self {
        hooks.on_mode_enter(mode);
        Self {
            mode,
            inner: Mutex::new(Inner {
                state: AppState::Initializing,
                terminated: false,
            }),
            hooks,
        }
    }

    pub fn mode(&self) -> ListeningMode {
        self.mode
    }

    pub fn state(&self) -> AppState {
        self.inner.lock().expect("state machine mutex poisoned").state
    }

    pub fn is_terminated(&self) -> bool {
        self.inner
            .lock()
            .expect("state machine mutex poisoned")
            .terminated
    }

    /// Apply `event`, returning the observed from/to pair atomically, or a
    /// typed [`crate::error::StateError`] if the transition is not legal.
    pub fn transition(
        &self,
        event: AppEvent,
    ) -> std::result::Result<TransitionResult, crate::error::StateError> {
        let mut guard = self.inner.lock().expect("state machine mutex poisoned");

        if guard.terminated {
            return Err(crate::error::StateError {
                mode: self.mode,
                state: guard.state,
                event,
            });
        }

        let from = guard.state;

        // The shutdown-complete transition terminates the machine rather than
        // landing on an ordinary state; handle it before the generic tables.
        if from == AppState::ShuttingDown && event == AppEvent::ShutdownComplete {
            guard.terminated = true;
            self.hooks.on_mode_exit(self.mode);
            return Ok(TransitionResult {
                from,
                to: from,
                event,
            });
        }

        let to = common_transition(from, event).or_else(|| mode_transition(self.mode, from, event));

        match to {
            Some(to) => {
                guard.state = to;
                if to == AppState::ShuttingDown {
                    self.hooks.on_mode_exit(self.mode);
                }
                Ok(TransitionResult { from, to, event })
            }
            None => Err(crate::error::StateError {
                mode: self.mode,
                state: from,
                event,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standby_machine(mode: ListeningMode) -> VoiceKeyStateMachine {
        let m = VoiceKeyStateMachine::new(mode);
        m.transition(AppEvent::InitSucceeded).unwrap();
        m
    }

    #[test]
    fn init_succeeded_reaches_standby() {
        let m = VoiceKeyStateMachine::new(ListeningMode::WakeWord);
        assert_eq!(m.state(), AppState::Initializing);
        let r = m.transition(AppEvent::InitSucceeded).unwrap();
        assert_eq!(r.to, AppState::Standby);
    }

    #[test]
    fn wake_word_mode_accepts_only_its_own_entry_event() {
        let m = standby_machine(ListeningMode::WakeWord);
        assert!(m.transition(AppEvent::ToggleListeningOn).is_err());
        assert!(m.transition(AppEvent::ContinuousStart).is_err());
        assert_eq!(m.state(), AppState::Standby);
        let r = m.transition(AppEvent::WakePhraseDetected).unwrap();
        assert_eq!(r.to, AppState::Listening);
    }

    #[test]
    fn mode_specific_event_rejected_outside_standby() {
        let m = standby_machine(ListeningMode::WakeWord);
        m.transition(AppEvent::WakePhraseDetected).unwrap();
        assert_eq!(m.state(), AppState::Listening);
        assert!(m.transition(AppEvent::WakePhraseDetected).is_err());
    }

    #[test]
    fn no_transition_legal_after_termination() {
        let m = standby_machine(ListeningMode::Toggle);
        m.transition(AppEvent::StopRequested).unwrap();
        m.transition(AppEvent::ShutdownComplete).unwrap();
        assert!(m.is_terminated());
        assert!(m.transition(AppEvent::InitSucceeded).is_err());
    }

    #[test]
    fn pause_resume_round_trip() {
        let m = standby_machine(ListeningMode::Continuous);
        m.transition(AppEvent::PauseRequested).unwrap();
        assert_eq!(m.state(), AppState::Paused);
        let r = m.transition(AppEvent::ResumeRequested).unwrap();
        assert_eq!(r.to, AppState::Standby);
    }

    #[test]
    fn stop_requested_from_any_non_terminal_non_processing_state_reaches_shutting_down() {
        let m = standby_machine(ListeningMode::Continuous);
        let r = m.transition(AppEvent::StopRequested).unwrap();
        assert_eq!(r.to, AppState::ShuttingDown);
    }

    #[test]
    fn processing_round_trips_to_listening() {
        let m = standby_machine(ListeningMode::Continuous);
        m.transition(AppEvent::ContinuousStart).unwrap();
        m.transition(AppEvent::SpeechFrameReceived).unwrap();
        assert_eq!(m.state(), AppState::Processing);
        let r = m.transition(AppEvent::FinalHandled).unwrap();
        assert_eq!(r.to, AppState::Listening);
    }
}
