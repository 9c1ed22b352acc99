//! Configuration snapshot for voicekey (§4.15).
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/voicekey/config.toml)
//! 3. Environment variables (`VOICEKEY_OPENAI_API_KEY` only; the rest of the
//!    surface is config-file only)
//!
//! `Config` is constructed once at daemon startup and handed by reference to
//! every component's constructor. Reload produces a new snapshot; callers
//! compare the old and new snapshots with [`classify_change`] to learn which
//! keys are safe to apply live and which require a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::command::{CustomAction, CustomCommandSpec};
use crate::error::{ConfigError, VoiceKeyError};
use crate::state_machine::ListeningMode;

/// Environment variable carrying the cloud ASR bearer token. Never read from
/// the config file.
pub const ENV_CLOUD_API_KEY: &str = "VOICEKEY_OPENAI_API_KEY";

fn default_wake_phrase() -> String {
    "voice key".to_string()
}

fn default_asr_backend() -> AsrBackendKind {
    AsrBackendKind::LocalOnly
}

fn default_model_profile() -> String {
    "base".to_string()
}

fn default_compute_type() -> String {
    "auto".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_cloud_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_cloud_model() -> String {
    "whisper-1".to_string()
}

fn default_cloud_timeout_seconds() -> f64 {
    10.0
}

fn default_sample_rate_hz() -> u32 {
    16_000
}

fn default_chunk_ms() -> u32 {
    100
}

fn default_queue_capacity() -> usize {
    32
}

fn default_speech_threshold() -> f32 {
    0.5
}

fn default_min_speech_ms() -> u32 {
    200
}

fn default_sensitivity() -> f32 {
    0.5
}

fn default_wake_window_timeout_seconds() -> f64 {
    5.0
}

fn default_inactivity_auto_pause_seconds() -> f64 {
    300.0
}

fn default_toggle_listening_hotkey() -> String {
    "ctrl+alt+v".to_string()
}

fn default_pause_hotkey() -> String {
    "ctrl+alt+p".to_string()
}

fn default_stop_hotkey() -> String {
    "ctrl+alt+x".to_string()
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_char_delay_ms() -> u64 {
    0
}

fn default_listening_mode() -> ListeningMode {
    ListeningMode::Toggle
}

/// Resolved ASR routing mode, as configured (before the router validates
/// backend availability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsrBackendKind {
    LocalOnly,
    Hybrid,
    CloudPrimary,
}

impl AsrBackendKind {
    pub fn as_router_mode(self) -> crate::transcribe::AsrMode {
        match self {
            Self::LocalOnly => crate::transcribe::AsrMode::LocalOnly,
            Self::Hybrid => crate::transcribe::AsrMode::Hybrid,
            Self::CloudPrimary => crate::transcribe::AsrMode::CloudPrimary,
        }
    }

    fn needs_cloud_credentials(self) -> bool {
        matches!(self, Self::Hybrid | Self::CloudPrimary)
    }
}

/// `engine.*` — ASR backend selection and cloud endpoint parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_asr_backend")]
    pub asr_backend: AsrBackendKind,
    #[serde(default = "default_model_profile")]
    pub model_profile: String,
    #[serde(default = "default_compute_type")]
    pub compute_type: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_cloud_api_base")]
    pub cloud_api_base: String,
    #[serde(default = "default_cloud_model")]
    pub cloud_model: String,
    #[serde(default = "default_cloud_timeout_seconds")]
    pub cloud_timeout_seconds: f64,
    #[serde(default)]
    pub network_fallback_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asr_backend: default_asr_backend(),
            model_profile: default_model_profile(),
            compute_type: default_compute_type(),
            language: default_language(),
            cloud_api_base: default_cloud_api_base(),
            cloud_model: default_cloud_model(),
            cloud_timeout_seconds: default_cloud_timeout_seconds(),
            network_fallback_enabled: false,
        }
    }
}

/// `audio.*` — capture device and frame-queue shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u32,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: default_sample_rate_hz(),
            chunk_ms: default_chunk_ms(),
            device_id: None,
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// `vad.*` — speech/silence classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    #[serde(default = "default_true_value")]
    pub enabled: bool,
    #[serde(default = "default_speech_threshold")]
    pub speech_threshold: f32,
    #[serde(default = "default_min_speech_ms")]
    pub min_speech_ms: u32,
}

fn default_true_value() -> bool {
    true
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            speech_threshold: default_speech_threshold(),
            min_speech_ms: default_min_speech_ms(),
        }
    }
}

/// `wake_word.*` — wake-phrase detector and window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeWordConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_wake_phrase")]
    pub phrase: String,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    #[serde(default = "default_wake_window_timeout_seconds")]
    pub wake_window_timeout_seconds: f64,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            phrase: default_wake_phrase(),
            sensitivity: default_sensitivity(),
            wake_window_timeout_seconds: default_wake_window_timeout_seconds(),
        }
    }
}

/// `modes.*` — listening-mode policy and pause/resume behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModesConfig {
    #[serde(default = "default_listening_mode")]
    pub default: ListeningMode,
    #[serde(default = "default_inactivity_auto_pause_seconds")]
    pub inactivity_auto_pause_seconds: f64,
    #[serde(default)]
    pub paused_resume_phrase_enabled: bool,
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            default: default_listening_mode(),
            inactivity_auto_pause_seconds: default_inactivity_auto_pause_seconds(),
            paused_resume_phrase_enabled: false,
        }
    }
}

/// `hotkeys.*` — normalized hotkey strings bound at daemon start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeysConfig {
    #[serde(default = "default_toggle_listening_hotkey")]
    pub toggle_listening: String,
    #[serde(default = "default_pause_hotkey")]
    pub pause: String,
    #[serde(default = "default_stop_hotkey")]
    pub stop: String,
}

impl Default for HotkeysConfig {
    fn default() -> Self {
        Self {
            toggle_listening: default_toggle_listening_hotkey(),
            pause: default_pause_hotkey(),
            stop: default_stop_hotkey(),
        }
    }
}

/// `typing.*` — confidence gate and keystroke pacing for text output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_char_delay_ms")]
    pub char_delay_ms: u64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            char_delay_ms: default_char_delay_ms(),
        }
    }
}

/// `features.*` — optional command channels gated off by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub text_expansion_enabled: bool,
    #[serde(default)]
    pub window_commands_enabled: bool,
}

/// One entry of `custom_commands`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCommandConfig {
    pub command_id: String,
    pub phrase: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub action: CustomActionConfig,
}

/// The action a [`CustomCommandConfig`] performs when matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomActionConfig {
    KeyCombo { keys: Vec<String> },
    Text { text: String },
}

impl From<CustomActionConfig> for CustomAction {
    fn from(value: CustomActionConfig) -> Self {
        match value {
            CustomActionConfig::KeyCombo { keys } => CustomAction::KeyCombo(keys),
            CustomActionConfig::Text { text } => CustomAction::Text(text),
        }
    }
}

impl From<CustomCommandConfig> for CustomCommandSpec {
    fn from(value: CustomCommandConfig) -> Self {
        CustomCommandSpec {
            command_id: value.command_id,
            phrase: value.phrase,
            aliases: value.aliases,
            action: value.action.into(),
        }
    }
}

/// The validated, in-memory configuration snapshot (§4.15). Schema
/// parsing/migration/backup-on-corruption is out of scope; this struct owns
/// only the loaded snapshot and its reload classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default)]
    pub wake_word: WakeWordConfig,
    #[serde(default)]
    pub modes: ModesConfig,
    #[serde(default)]
    pub hotkeys: HotkeysConfig,
    #[serde(default)]
    pub typing: TypingConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub snippets: HashMap<String, String>,
    #[serde(default)]
    pub custom_commands: Vec<CustomCommandConfig>,
}

impl Config {
    /// Default config file path: `~/.config/voicekey/config.toml` (platform
    /// equivalents via `directories`).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "voicekey")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "voicekey")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Per-user runtime directory for the instance lock and other ephemeral
    /// files. Falls back to `/tmp/voicekey` when `XDG_RUNTIME_DIR` is unset.
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("voicekey")
    }

    pub fn models_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "voicekey")
            .map(|dirs| dirs.data_dir().join("models"))
            .unwrap_or_else(|| PathBuf::from("models"))
    }

    /// Load a snapshot from `path` (or the default path if `None`), falling
    /// back to built-in defaults when the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, VoiceKeyError> {
        let config_path = path.map(PathBuf::from).or_else(Self::default_path);
        let config = match config_path {
            Some(ref p) if p.exists() => {
                tracing::debug!(path = ?p, "loading config");
                let contents = std::fs::read_to_string(p)?;
                toml::from_str(&contents).map_err(|e| {
                    VoiceKeyError::Config(ConfigError::InvalidCloudSettings(format!(
                        "failed to parse config file {p:?}: {e}"
                    )))
                })?
            }
            Some(ref p) => {
                tracing::debug!(path = ?p, "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants serde's per-field defaults can't
    /// express: cloud credential availability for the resolved ASR mode.
    pub fn validate(&self) -> Result<(), VoiceKeyError> {
        if self.engine.asr_backend.needs_cloud_credentials() {
            self.resolve_cloud_api_key().map_err(VoiceKeyError::Config)?;
        }
        Ok(())
    }

    /// Resolve the cloud ASR bearer token from the environment. Never read
    /// from the config file itself.
    pub fn resolve_cloud_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(ENV_CLOUD_API_KEY).map_err(|_| {
            ConfigError::InvalidCloudSettings(format!(
                "engine.asr_backend requires cloud credentials; set {ENV_CLOUD_API_KEY}"
            ))
        })
    }

    /// Convert `custom_commands` into the registry's spec type.
    pub fn custom_command_specs(&self) -> Vec<CustomCommandSpec> {
        self.custom_commands
            .iter()
            .cloned()
            .map(CustomCommandConfig::into)
            .collect()
    }
}

/// Whether a reloaded config key can be applied to a running coordinator
/// without a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadAction {
    SafeToApply,
    RestartRequired,
}

/// Per-key classification of what changed between an old and new snapshot.
/// `engine.asr_backend`, `engine.model_profile`, and `engine.compute_type`
/// are restart-required; everything else is safe-to-apply.
pub fn classify_change(old: &Config, new: &Config) -> Vec<(&'static str, ReloadAction)> {
    let mut changes = Vec::new();

    if old.engine.asr_backend != new.engine.asr_backend {
        changes.push(("engine.asr_backend", ReloadAction::RestartRequired));
    }
    if old.engine.model_profile != new.engine.model_profile {
        changes.push(("engine.model_profile", ReloadAction::RestartRequired));
    }
    if old.engine.compute_type != new.engine.compute_type {
        changes.push(("engine.compute_type", ReloadAction::RestartRequired));
    }

    macro_rules! safe_if_changed {
        ($key:expr, $old:expr, $new:expr) => {
            if $old != $new {
                changes.push(($key, ReloadAction::SafeToApply));
            }
        };
    }

    safe_if_changed!("engine.language", old.engine.language, new.engine.language);
    safe_if_changed!(
        "engine.cloud_api_base",
        old.engine.cloud_api_base,
        new.engine.cloud_api_base
    );
    safe_if_changed!(
        "engine.cloud_model",
        old.engine.cloud_model,
        new.engine.cloud_model
    );
    safe_if_changed!(
        "engine.cloud_timeout_seconds",
        old.engine.cloud_timeout_seconds,
        new.engine.cloud_timeout_seconds
    );
    safe_if_changed!(
        "engine.network_fallback_enabled",
        old.engine.network_fallback_enabled,
        new.engine.network_fallback_enabled
    );
    safe_if_changed!("audio.device_id", old.audio.device_id, new.audio.device_id);
    safe_if_changed!(
        "audio.queue_capacity",
        old.audio.queue_capacity,
        new.audio.queue_capacity
    );
    safe_if_changed!("vad.enabled", old.vad.enabled, new.vad.enabled);
    safe_if_changed!(
        "vad.speech_threshold",
        old.vad.speech_threshold,
        new.vad.speech_threshold
    );
    safe_if_changed!(
        "wake_word.enabled",
        old.wake_word.enabled,
        new.wake_word.enabled
    );
    safe_if_changed!(
        "wake_word.phrase",
        old.wake_word.phrase,
        new.wake_word.phrase
    );
    safe_if_changed!(
        "wake_word.sensitivity",
        old.wake_word.sensitivity,
        new.wake_word.sensitivity
    );
    safe_if_changed!(
        "wake_word.wake_window_timeout_seconds",
        old.wake_word.wake_window_timeout_seconds,
        new.wake_word.wake_window_timeout_seconds
    );
    safe_if_changed!("modes.default", old.modes.default, new.modes.default);
    safe_if_changed!(
        "modes.inactivity_auto_pause_seconds",
        old.modes.inactivity_auto_pause_seconds,
        new.modes.inactivity_auto_pause_seconds
    );
    safe_if_changed!(
        "modes.paused_resume_phrase_enabled",
        old.modes.paused_resume_phrase_enabled,
        new.modes.paused_resume_phrase_enabled
    );
    safe_if_changed!(
        "hotkeys.toggle_listening",
        old.hotkeys.toggle_listening,
        new.hotkeys.toggle_listening
    );
    safe_if_changed!("hotkeys.pause", old.hotkeys.pause, new.hotkeys.pause);
    safe_if_changed!("hotkeys.stop", old.hotkeys.stop, new.hotkeys.stop);
    safe_if_changed!(
        "typing.confidence_threshold",
        old.typing.confidence_threshold,
        new.typing.confidence_threshold
    );
    safe_if_changed!(
        "typing.char_delay_ms",
        old.typing.char_delay_ms,
        new.typing.char_delay_ms
    );
    safe_if_changed!(
        "features.text_expansion_enabled",
        old.features.text_expansion_enabled,
        new.features.text_expansion_enabled
    );
    safe_if_changed!(
        "features.window_commands_enabled",
        old.features.window_commands_enabled,
        new.features.window_commands_enabled
    );
    safe_if_changed!("snippets", old.snippets, new.snippets);
    if old.custom_commands.len() != new.custom_commands.len() {
        changes.push(("custom_commands", ReloadAction::SafeToApply));
    }

    changes
}
