//! Error types for voicekey
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the voicekey runtime.
#[derive(Error, Debug)]
pub enum VoiceKeyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Injection error: {0}")]
    Injection(#[from] InjectionError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using VoiceKeyError.
pub type Result<T> = std::result::Result<T, VoiceKeyError>;

/// Configuration-layer failures: bad settings, collisions, invalid schedules.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid cloud ASR settings: {0}")]
    InvalidCloudSettings(String),

    #[error("command phrase collision: '{phrase}' is registered by both '{first}' and '{second}'")]
    PhraseCollision {
        phrase: String,
        first: String,
        second: String,
    },

    #[error("invalid retry schedule: {0}")]
    InvalidRetrySchedule(String),

    #[error("invalid normalized hotkey '{0}'")]
    InvalidHotkey(String),

    #[error("unknown command id '{0}' referenced by custom configuration")]
    UnknownCommandId(String),

    #[error("invalid wake phrase: {0}")]
    InvalidWakePhrase(String),
}

/// Typed audio-capture error surface (device not found/busy/disconnected).
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio device not found: '{0}'")]
    DeviceNotFound(String),

    #[error("audio device not found: '{requested}'. {available}")]
    DeviceNotFoundWithList { requested: String, available: String },

    #[error("audio device busy: {0}")]
    DeviceBusy(String),

    #[error("audio device disconnected: {0}")]
    DeviceDisconnected(String),

    #[error("audio connection failed: {0}")]
    Connection(String),

    #[error("audio stream error: {0}")]
    StreamError(String),
}

/// Typed ASR failures: model load, transcription, timeout, cloud transport.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("transcription timed out after {0:.1}s")]
    TranscriptionTimeout(f64),

    #[error("cloud ASR transport error: {0}")]
    CloudTransport(String),

    #[error("cloud ASR returned HTTP {0}")]
    CloudHttp(u16),

    #[error("cloud ASR returned malformed JSON: {0}")]
    CloudJson(String),

    #[error("cloud ASR response missing non-empty 'text' field")]
    CloudEmptyText,

    #[error("ASR router misconfigured: {0}")]
    RouterMisconfigured(String),

    #[error("local transcription failed ({local}); cloud fallback also failed ({cloud})")]
    HybridBothFailed { local: String, cloud: String },
}

/// Typed keyboard/window injection failures (see platform::keyboard / platform::window).
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("cannot type empty text")]
    EmptyText,

    #[error("invalid key combo: {0}")]
    InvalidCombo(String),

    #[error("display server unsupported for this operation")]
    DisplayServerUnsupported,

    #[error("best-effort Wayland injection; results may be imprecise")]
    WaylandBestEffort,

    #[error("primary backend unavailable: {0}")]
    PrimaryBackendUnavailable(String),

    #[error("fallback backend unavailable: {0}")]
    FallbackBackendUnavailable(String),

    #[error("window-switch backend unavailable: {0}")]
    SwitchBackendUnavailable(String),

    #[error("input permission required: {0}")]
    InputPermissionRequired(String),

    #[error("administrator privileges recommended: {0}")]
    AdminRecommended(String),

    #[error("administrator privileges required: {0}")]
    AdminRequired(String),

    #[error("injection failed: {0}")]
    InjectionFailed(String),

    #[error("window operation unsupported: {0}")]
    OperationUnsupported(String),

    #[error("window action failed: {0}")]
    ActionFailed(String),
}

/// Invalid state-machine transitions, carrying the offending (mode, state, event) triplet.
#[derive(Error, Debug)]
#[error("invalid transition: mode={mode:?} state={state:?} event={event:?}")]
pub struct StateError {
    pub mode: crate::state_machine::ListeningMode,
    pub state: crate::state_machine::AppState,
    pub event: crate::state_machine::AppEvent,
}

/// Lifecycle-level failures: duplicate instance startup.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("another voicekey instance is already running (lock held at '{lock_path}')")]
    DuplicateInstanceStartup { lock_path: String },
}

/// Errors related to hotkey registration and the platform listener thread.
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("unknown key name: '{0}'")]
    UnknownKey(String),

    #[error("no keyboard device found")]
    NoKeyboard,

    #[error("hotkey backend error: {0}")]
    Backend(String),

    #[error("hotkey '{hotkey}' conflicts with an existing registration")]
    Conflict {
        hotkey: String,
        alternatives: Vec<String>,
    },
}

#[cfg(target_os = "linux")]
impl From<evdev::Error> for HotkeyError {
    fn from(e: evdev::Error) -> Self {
        HotkeyError::Backend(e.to_string())
    }
}

/// Stable process exit codes (the process-level collaborator named in the daemon wiring spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    CommandError = 1,
    UsageError = 2,
    NotImplemented = 3,
    RuntimeError = 10,
}

impl From<&VoiceKeyError> for ExitCode {
    fn from(err: &VoiceKeyError) -> Self {
        match err {
            VoiceKeyError::Config(_) => ExitCode::UsageError,
            VoiceKeyError::Lifecycle(_) => ExitCode::CommandError,
            _ => ExitCode::RuntimeError,
        }
    }
}
