//! Runtime coordinator (§4.9): the component that owns every other piece of
//! the pipeline and is the only place a raw transcript turns into either
//! typed text or an executed command.
//!
//! Grounded in the reference daemon's single-worker-thread orchestration
//! loop (poll audio with a bounded timeout, classify with VAD, accumulate an
//! utterance across speech frames, hand the accumulated utterance to the ASR
//! on the first silent frame) reshaped onto the trait objects defined by the
//! rest of this crate: the wake detector, the state machine, the parser, the
//! routing policy, the action router, and the confidence filter are all
//! wired together here rather than scattered across the daemon's old
//! push-to-talk command handlers.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

use crate::action::ActionRouter;
use crate::audio::{AudioCapture, AudioFrameQueue};
use crate::command::{CommandParser, CommandRegistry, FeatureGates, ParseResult, ParserConfig, SnippetExpander};
use crate::confidence::ConfidenceFilter;
use crate::config::Config;
use crate::error::{InjectionError, VoiceKeyError};
use crate::hotkey::{normalize_hotkey, HotkeyBackend};
use crate::keyboard::KeyboardBackend;
use crate::routing::{self, RoutingDecision};
use crate::state_machine::{AppEvent, AppState, ListeningMode, VoiceKeyStateMachine};
use crate::transcribe::{AsrBackend, AsrMode, AsrRouter, CloudAsrBackend, LocalAsrBackend, ModelProfile};
use crate::types::{now_seconds, TranscriptEvent};
use crate::vad::{EnergyVad, ModelVad, VadProcessor};
use crate::wake::{WakeDetector, WakeWindowController};
use crate::watchdog::Watchdog;
use crate::window::WindowBackend;
use crate::instance::InstanceLock;

/// Default bound on a single local-ASR call. Not exposed as a config key (no
/// `engine.local_timeout_seconds` is named in the configuration snapshot);
/// chosen generously relative to the whisper-rs timeout test coverage in
/// `transcribe::local`.
const LOCAL_TRANSCRIPTION_TIMEOUT_SECONDS: f64 = 30.0;

/// Bound on how long `stop()` waits for the worker thread to exit before
/// giving up and logging instead of blocking forever.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Normalized hotkey strings bound at start.
#[derive(Debug, Clone)]
pub struct HotkeySpec {
    pub toggle_listening: String,
    pub pause: String,
    pub stop: String,
}

/// Result of one call into the coordinator's transcript/poll/hotkey API.
/// Fields are populated only when something actually happened; a no-op call
/// returns the default (all `None`/`false`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeUpdate {
    pub transition: Option<crate::state_machine::TransitionResult>,
    pub wake_detected: bool,
    pub routed_text: Option<String>,
    pub executed_command_id: Option<String>,
}

/// Everything [`RuntimeCoordinator::new`] needs, already constructed. Kept
/// as a plain struct (rather than a long argument list) the way the
/// reference daemon's builder assembles its dependencies before handing them
/// to the orchestrator.
pub struct RuntimeCoordinatorParts {
    pub mode: ListeningMode,
    pub wake_phrase: String,
    pub wake_window_timeout_seconds: f64,
    pub inactivity_auto_pause_seconds: f64,
    pub confidence_threshold: f32,
    pub resume_by_phrase_enabled: bool,
    pub registry: CommandRegistry,
    pub gates: FeatureGates,
    pub parser_config: ParserConfig,
    pub snippet_expander: Option<SnippetExpander>,
    pub asr_router: AsrRouter,
    pub audio_capture: Box<dyn AudioCapture>,
    pub vad: Box<dyn VadProcessor>,
    pub keyboard: Box<dyn KeyboardBackend>,
    pub window: Option<Box<dyn WindowBackend>>,
    pub hotkey_backend: Option<Box<dyn HotkeyBackend>>,
    pub hotkeys: Option<HotkeySpec>,
    pub instance_lock: Option<InstanceLock>,
}

/// Owns the lifecycle state machine, wake-window controller, watchdog,
/// parser/routing/action pipeline, ASR router, and the backends it drives.
/// Runs a single worker thread once [`RuntimeCoordinator::start`] is called;
/// all state-machine mutations, ASR calls, and keyboard-injection calls
/// happen on that thread.
pub struct RuntimeCoordinator {
    mode: ListeningMode,
    state_machine: VoiceKeyStateMachine,
    wake_detector: Option<WakeDetector>,
    wake_window: Mutex<WakeWindowController>,
    watchdog: Mutex<Watchdog<Box<dyn Fn(ListeningMode) -> f64 + Send + Sync>>>,
    confidence_filter: Mutex<ConfidenceFilter>,
    registry: CommandRegistry,
    gates: FeatureGates,
    parser_config: ParserConfig,
    snippet_expander: Option<SnippetExpander>,
    asr_router: AsrRouter,
    action_router: Mutex<ActionRouter>,
    hotkey_backend: Option<Mutex<Box<dyn HotkeyBackend>>>,
    hotkeys: Option<HotkeySpec>,
    audio_capture: AsyncMutex<Box<dyn AudioCapture>>,
    vad: Mutex<Box<dyn VadProcessor>>,
    text_output: Mutex<Box<dyn Fn(&str) + Send>>,
    instance_lock: Mutex<Option<InstanceLock>>,
    resume_by_phrase_enabled: bool,
    stop_flag: Arc<AtomicBool>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    /// Consecutive unexpected audio-capture disconnects observed by the
    /// worker loop, consulted against `resilience::microphone_reconnect_retry_policy`
    /// to decide when `MicrophoneDisconnected` must force a safety pause.
    mic_disconnect_failures: AtomicU32,
}

impl RuntimeCoordinator {
    pub fn new(parts: RuntimeCoordinatorParts) -> Result<Self, VoiceKeyError> {
        let wake_detector = if parts.mode == ListeningMode::WakeWord {
            Some(WakeDetector::new(&parts.wake_phrase).map_err(|e| {
                VoiceKeyError::Config(crate::error::ConfigError::InvalidWakePhrase(e))
            })?)
        } else {
            None
        };

        let inactivity_timeout = parts.inactivity_auto_pause_seconds;
        let timeout_for: Box<dyn Fn(ListeningMode) -> f64 + Send + Sync> =
            Box::new(move |_mode: ListeningMode| inactivity_timeout);

        Ok(Self {
            mode: parts.mode,
            state_machine: VoiceKeyStateMachine::new(parts.mode),
            wake_detector,
            wake_window: Mutex::new(WakeWindowController::new(parts.wake_window_timeout_seconds)),
            watchdog: Mutex::new(Watchdog::new(timeout_for)),
            confidence_filter: Mutex::new(ConfidenceFilter::new(parts.confidence_threshold)),
            registry: parts.registry,
            gates: parts.gates,
            parser_config: parts.parser_config,
            snippet_expander: parts.snippet_expander,
            asr_router: parts.asr_router,
            action_router: Mutex::new(ActionRouter::new(parts.keyboard, parts.window)),
            hotkey_backend: parts.hotkey_backend.map(Mutex::new),
            hotkeys: parts.hotkeys,
            audio_capture: AsyncMutex::new(parts.audio_capture),
            vad: Mutex::new(parts.vad),
            text_output: Mutex::new(Box::new(|_: &str| {})),
            instance_lock: Mutex::new(parts.instance_lock),
            resume_by_phrase_enabled: parts.resume_by_phrase_enabled,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker_handle: Mutex::new(None),
            mic_disconnect_failures: AtomicU32::new(0),
        })
    }

    /// Build a coordinator fully wired from a validated configuration
    /// snapshot, selecting concrete backends for the current platform.
    pub fn from_config(
        config: &Config,
        instance_lock: Option<InstanceLock>,
    ) -> Result<Arc<Self>, VoiceKeyError> {
        let gates = FeatureGates {
            window_commands_enabled: config.features.window_commands_enabled,
            text_expansion_enabled: config.features.text_expansion_enabled,
        };
        let registry = CommandRegistry::build(config.custom_command_specs())?;
        let snippet_expander = config
            .features
            .text_expansion_enabled
            .then(|| SnippetExpander::new(config.snippets.clone()));

        let asr_router = build_asr_router(config)?;
        let audio_capture = crate::audio::create_capture(&config.audio)?;
        let vad = build_vad(config);
        let keyboard = default_keyboard_backend();
        let window: Option<Box<dyn WindowBackend>> = config
            .features
            .window_commands_enabled
            .then(default_window_backend);

        let hotkeys = Some(HotkeySpec {
            toggle_listening: normalize_hotkey(&config.hotkeys.toggle_listening)?,
            pause: normalize_hotkey(&config.hotkeys.pause)?,
            stop: normalize_hotkey(&config.hotkeys.stop)?,
        });

        let parts = RuntimeCoordinatorParts {
            mode: config.modes.default,
            wake_phrase: config.wake_word.phrase.clone(),
            wake_window_timeout_seconds: config.wake_word.wake_window_timeout_seconds,
            inactivity_auto_pause_seconds: config.modes.inactivity_auto_pause_seconds,
            confidence_threshold: config.typing.confidence_threshold,
            resume_by_phrase_enabled: config.modes.paused_resume_phrase_enabled,
            registry,
            gates,
            parser_config: ParserConfig::default(),
            snippet_expander,
            asr_router,
            audio_capture,
            vad,
            keyboard,
            window,
            hotkey_backend: Some(default_hotkey_backend()),
            hotkeys,
            instance_lock,
        };

        let coordinator = Arc::new(Self::new(parts)?);

        let typing_delay = config.typing.char_delay_ms as u32;
        let typing_keyboard = Mutex::new(default_keyboard_backend());
        coordinator.set_text_output(Box::new(move |text: &str| {
            if let Err(e) = typing_keyboard
                .lock()
                .expect("typing keyboard mutex poisoned")
                .type_text(text, typing_delay)
            {
                tracing::warn!(error = %e, "failed to type dictated text");
            }
        }));

        Ok(coordinator)
    }

    pub fn mode(&self) -> ListeningMode {
        self.mode
    }

    pub fn state(&self) -> AppState {
        self.state_machine.state()
    }

    pub fn is_running(&self) -> bool {
        self.worker_handle
            .lock()
            .expect("worker handle mutex poisoned")
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Replace the text-output delegate invoked for plain dictation.
    /// Defaults to a no-op until this is called (by [`Self::from_config`] in
    /// production, or by a test installing a recording closure).
    pub fn set_text_output(&self, callback: Box<dyn Fn(&str) + Send>) {
        *self.text_output.lock().expect("text output mutex poisoned") = callback;
    }

    /// Narrow convenience entry point matching the literal per-mode rule
    /// set: outside `WAKE_WORD` mode (and outside the always-applicable
    /// `PAUSED` path) this is a no-op. [`Self::on_transcript_event`] is the
    /// mode-agnostic dispatcher the worker loop actually calls; see
    /// `DESIGN.md` for why both exist.
    pub fn on_transcript(&self, text: &str, vad_active: bool) -> RuntimeUpdate {
        let state = self.state_machine.state();
        if state == AppState::Paused {
            return self.handle_paused(text);
        }
        if self.mode != ListeningMode::WakeWord {
            return RuntimeUpdate::default();
        }
        match state {
            AppState::Standby => self.handle_wake_detection(text, vad_active),
            AppState::Listening => self.handle_listening(text),
            _ => RuntimeUpdate::default(),
        }
    }

    /// Mode-agnostic transcript entry point: confidence-filters `event`,
    /// then dispatches on the current state regardless of listening mode.
    /// This is what the worker loop and all non-`WAKE_WORD` modes actually
    /// use to turn transcripts into output.
    pub fn on_transcript_event(&self, event: &TranscriptEvent, vad_active: bool) -> RuntimeUpdate {
        if !self
            .confidence_filter
            .lock()
            .expect("confidence filter mutex poisoned")
            .admit(event)
        {
            return RuntimeUpdate::default();
        }

        let state = self.state_machine.state();
        if state == AppState::Paused {
            return self.handle_paused(&event.text);
        }
        if state == AppState::Standby && self.mode == ListeningMode::WakeWord {
            return self.handle_wake_detection(&event.text, vad_active);
        }
        if state == AppState::Listening {
            return self.handle_listening(&event.text);
        }
        RuntimeUpdate::default()
    }

    /// Advance wake-window/watchdog expiries. Only has an effect in
    /// `WAKE_WORD` mode while `LISTENING`.
    pub fn poll(&self) -> RuntimeUpdate {
        self.poll_at(now_seconds())
    }

    fn poll_at(&self, now: f64) -> RuntimeUpdate {
        if self.mode != ListeningMode::WakeWord || self.state_machine.state() != AppState::Listening {
            return RuntimeUpdate::default();
        }
        let expired = self
            .wake_window
            .lock()
            .expect("wake window mutex poisoned")
            .poll_timeout(now);
        if !expired {
            return RuntimeUpdate::default();
        }
        match self.state_machine.transition(AppEvent::WakeWindowTimeout) {
            Ok(transition) => {
                self.watchdog.lock().expect("watchdog mutex poisoned").disarm();
                RuntimeUpdate {
                    transition: Some(transition),
                    ..Default::default()
                }
            }
            Err(_) => RuntimeUpdate::default(),
        }
    }

    /// Bump wake-window/watchdog activity without running the parser; used
    /// by callers that observed liveness (e.g. a non-speech keepalive) but
    /// have no transcript to hand off.
    pub fn on_activity(&self) -> RuntimeUpdate {
        let now = now_seconds();
        self.wake_window
            .lock()
            .expect("wake window mutex poisoned")
            .on_activity(now);
        self.watchdog
            .lock()
            .expect("watchdog mutex poisoned")
            .on_vad_activity(now);
        RuntimeUpdate::default()
    }

    /// Toggle-hotkey callback (§4.9). In `Toggle` mode this is a strict
    /// `STANDBY ↔ LISTENING` pair; from `PAUSED` it always resumes. See
    /// `DESIGN.md` for the `WakeWord`/`Continuous` mode behavior, which has
    /// no direct counterpart in the state table.
    pub fn handle_toggle_hotkey(&self) -> RuntimeUpdate {
        let now = now_seconds();
        match self.state_machine.state() {
            AppState::Paused => self.apply_transition(AppEvent::ResumeRequested),
            AppState::Standby if self.mode == ListeningMode::Toggle => {
                let update = self.apply_transition(AppEvent::ToggleListeningOn);
                if update.transition.is_some() {
                    self.wake_window.lock().expect("wake window mutex poisoned").open_window(now);
                    self.watchdog.lock().expect("watchdog mutex poisoned").arm(self.mode, now);
                }
                update
            }
            AppState::Listening | AppState::Processing if self.mode == ListeningMode::Toggle => {
                let update = self.apply_transition(AppEvent::WakeWindowTimeout);
                if update.transition.is_some() {
                    self.wake_window.lock().expect("wake window mutex poisoned").close();
                    self.watchdog.lock().expect("watchdog mutex poisoned").disarm();
                }
                update
            }
            AppState::Listening if self.mode == ListeningMode::WakeWord => {
                // No direct toggle-off event exists for this mode; closing
                // the window early lets the next `poll()` drive the state
                // machine to STANDBY through the normal expiry path.
                self.wake_window.lock().expect("wake window mutex poisoned").close();
                RuntimeUpdate::default()
            }
            _ => RuntimeUpdate::default(),
        }
    }

    fn apply_transition(&self, event: AppEvent) -> RuntimeUpdate {
        match self.state_machine.transition(event) {
            Ok(transition) => RuntimeUpdate {
                transition: Some(transition),
                ..Default::default()
            },
            Err(_) => RuntimeUpdate::default(),
        }
    }

    fn parse(&self, text: &str) -> ParseResult {
        CommandParser::new(&self.registry, self.gates, self.parser_config).parse(text)
    }

    fn maybe_expand(&self, literal: &str) -> String {
        match &self.snippet_expander {
            Some(expander) if self.gates.text_expansion_enabled => expander.expand(literal),
            _ => literal.to_string(),
        }
    }

    fn handle_paused(&self, text: &str) -> RuntimeUpdate {
        let parsed = self.parse(text);
        let state = self.state_machine.state();
        if routing::route(state, &parsed, self.resume_by_phrase_enabled) != RoutingDecision::Allow {
            return RuntimeUpdate::default();
        }
        let ParseResult::System { command_id, .. } = parsed else {
            return RuntimeUpdate::default();
        };
        let event = match command_id.as_str() {
            "voice_key_stop" => AppEvent::StopRequested,
            "resume_voice_key" => AppEvent::ResumeRequested,
            _ => return RuntimeUpdate::default(),
        };
        self.apply_transition(event)
    }

    fn handle_wake_detection(&self, text: &str, vad_active: bool) -> RuntimeUpdate {
        if !vad_active {
            return RuntimeUpdate::default();
        }
        let Some(detector) = &self.wake_detector else {
            return RuntimeUpdate::default();
        };
        let (matched, _normalized) = detector.detect(text);
        if !matched {
            return RuntimeUpdate::default();
        }
        match self.state_machine.transition(AppEvent::WakePhraseDetected) {
            Ok(transition) => {
                let now = now_seconds();
                self.wake_window.lock().expect("wake window mutex poisoned").open_window(now);
                self.watchdog.lock().expect("watchdog mutex poisoned").arm(self.mode, now);
                RuntimeUpdate {
                    transition: Some(transition),
                    wake_detected: true,
                    ..Default::default()
                }
            }
            Err(_) => RuntimeUpdate::default(),
        }
    }

    fn handle_listening(&self, text: &str) -> RuntimeUpdate {
        let now = now_seconds();
        if self.mode == ListeningMode::WakeWord {
            let mut window = self.wake_window.lock().expect("wake window mutex poisoned");
            if !window.is_open(now) {
                return RuntimeUpdate::default();
            }
            window.on_activity(now);
        }
        self.watchdog
            .lock()
            .expect("watchdog mutex poisoned")
            .on_transcript_activity(now);

        match self.parse(text) {
            ParseResult::Text { literal, .. } => {
                let expanded = self.maybe_expand(&literal);
                (self.text_output.lock().expect("text output mutex poisoned"))(&expanded);
                RuntimeUpdate {
                    routed_text: Some(expanded),
                    ..Default::default()
                }
            }
            ParseResult::Command { command_id, .. } | ParseResult::System { command_id, .. } => {
                self.dispatch_command(&command_id)
            }
        }
    }

    fn dispatch_command(&self, command_id: &str) -> RuntimeUpdate {
        match command_id {
            "pause_voice_key" => {
                let state = self.state_machine.state();
                match crate::resilience::pause_event_for_state(state) {
                    Some(event) => self.apply_transition(event),
                    None => RuntimeUpdate::default(),
                }
            }
            "voice_key_stop" => self.apply_transition(AppEvent::StopRequested),
            _ => match self
                .action_router
                .lock()
                .expect("action router mutex poisoned")
                .dispatch(command_id, &self.registry)
            {
                Ok(report) => RuntimeUpdate {
                    executed_command_id: Some(report.command_id),
                    ..Default::default()
                },
                Err(e) => {
                    tracing::warn!(error = %e, command_id, "action dispatch failed");
                    if is_keyboard_blocked(&e) {
                        self.apply_safety_fallback(crate::resilience::RuntimeErrorCode::KeyboardBlocked);
                    }
                    RuntimeUpdate::default()
                }
            },
        }
    }

    /// Apply the §4.11 safety-fallback-to-paused decision for `code`
    /// synchronously against the current state.
    fn apply_safety_fallback(&self, code: crate::resilience::RuntimeErrorCode) {
        let state = self.state_machine.state();
        let decision = crate::resilience::decide_safety_fallback(code, state, true);
        if !decision.force_pause {
            return;
        }
        let Some(event) = decision.pause_event else {
            return;
        };
        if let Ok(transition) = self.state_machine.transition(event) {
            tracing::warn!(?transition, ?code, "forced PAUSED by safety fallback");
        }
    }

    fn handle_hotkey(&self, name: &str) {
        let Some(hotkeys) = &self.hotkeys else { return };
        match name {
            n if n == "toggle_listening" => {
                let _ = self.handle_toggle_hotkey();
            }
            n if n == "pause" => {
                let state = self.state_machine.state();
                if let Some(event) = crate::resilience::pause_event_for_state(state) {
                    let _ = self.state_machine.transition(event);
                }
            }
            n if n == "stop" => {
                let _ = self.state_machine.transition(AppEvent::StopRequested);
            }
            _ => {}
        }
        let _ = hotkeys;
    }

    fn process_utterance(&self, samples: Vec<f32>) {
        let result = match self.asr_router.transcribe(&samples) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "ASR transcription failed; dropping utterance");
                return;
            }
        };
        for event in &result.events {
            let _ = self.on_transcript_event(event, true);
        }
    }

    fn worker_loop(self: Arc<Self>, queue: Arc<AudioFrameQueue>) {
        let mut accumulator: Vec<f32> = Vec::new();
        let poll_interval = Duration::from_millis(100);

        while !self.stop_flag.load(Ordering::SeqCst) {
            if let Some(backend) = &self.hotkey_backend {
                let fired = backend
                    .lock()
                    .expect("hotkey backend mutex poisoned")
                    .try_recv();
                if let Some(name) = fired {
                    self.handle_hotkey(&name);
                }
            }

            match queue.recv_timeout(poll_interval) {
                Some(frame) => {
                    if !frame.is_valid() {
                        crate::types::record_invalid_frame();
                        continue;
                    }
                    let is_speech = self.vad.lock().expect("vad mutex poisoned").process(&frame);
                    if is_speech {
                        accumulator.extend_from_slice(&frame.samples);
                        self.wake_window
                            .lock()
                            .expect("wake window mutex poisoned")
                            .on_activity(frame.timestamp);
                        self.watchdog
                            .lock()
                            .expect("watchdog mutex poisoned")
                            .on_vad_activity(frame.timestamp);
                    } else if !accumulator.is_empty() {
                        self.process_utterance(std::mem::take(&mut accumulator));
                    }
                }
                None => {
                    if self.mode == ListeningMode::WakeWord
                        && self.state_machine.state() == AppState::Listening
                    {
                        let _ = self.poll();
                    }
                    self.check_audio_health();
                }
            }
        }
    }

    /// Check for an audio-capture disconnect the callback thread observed
    /// (`AudioCapture::is_running()` going false without our own `stop()`
    /// having run) and, once the reconnect retry budget is exhausted, force
    /// the §4.11 safety-fallback-to-paused decision synchronously.
    fn check_audio_health(&self) {
        if self.stop_flag.load(Ordering::SeqCst) {
            return;
        }
        let Ok(capture) = self.audio_capture.try_lock() else {
            return;
        };
        if capture.is_running() {
            self.mic_disconnect_failures.store(0, Ordering::SeqCst);
            return;
        }
        drop(capture);

        let failures = self.mic_disconnect_failures.fetch_add(1, Ordering::SeqCst) + 1;
        let retries_exhausted = crate::resilience::microphone_reconnect_retry_policy()
            .next_delay_after_failure(failures)
            .is_none();
        let decision = crate::resilience::decide_safety_fallback(
            crate::resilience::RuntimeErrorCode::MicrophoneDisconnected,
            self.state_machine.state(),
            retries_exhausted,
        );
        tracing::warn!(failures, retries_exhausted, "microphone disconnected");
        if decision.force_pause {
            if let Some(event) = decision.pause_event {
                if let Ok(transition) = self.state_machine.transition(event) {
                    tracing::warn!(?transition, "forced PAUSED after microphone disconnect");
                }
            }
        }
    }

    /// Start sequence (§4.9): start audio capture, spawn the worker thread,
    /// transition `INIT_SUCCEEDED`, then register hotkeys.
    pub async fn start(self: &Arc<Self>) -> Result<(), VoiceKeyError> {
        let queue = {
            let mut capture = self.audio_capture.lock().await;
            capture.start().await?;
            capture.audio_queue()
        };

        self.stop_flag.store(false, Ordering::SeqCst);

        let worker_handle = {
            let this = Arc::clone(self);
            std::thread::spawn(move || this.worker_loop(queue))
        };
        *self
            .worker_handle
            .lock()
            .expect("worker handle mutex poisoned") = Some(worker_handle);

        self.state_machine.transition(AppEvent::InitSucceeded)?;

        self.action_router
            .lock()
            .expect("action router mutex poisoned")
            .self_check();

        if self.mode == ListeningMode::Continuous {
            self.state_machine.transition(AppEvent::ContinuousStart)?;
            let now = now_seconds();
            self.wake_window.lock().expect("wake window mutex poisoned").open_window(now);
            self.watchdog.lock().expect("watchdog mutex poisoned").arm(self.mode, now);
        }

        if let (Some(backend), Some(hotkeys)) = (&self.hotkey_backend, &self.hotkeys) {
            let mut backend = backend.lock().expect("hotkey backend mutex poisoned");
            backend.start()?;
            log_registration(backend.register("toggle_listening", &hotkeys.toggle_listening)?);
            log_registration(backend.register("pause", &hotkeys.pause)?);
            log_registration(backend.register("stop", &hotkeys.stop)?);
        }

        Ok(())
    }

    /// Stop sequence (§4.9): signal the worker, stop audio capture, join the
    /// thread with a bounded (~2s) wait, attempt `STOP_REQUESTED` (ignoring
    /// failure if the machine is already past it), unregister hotkeys, and
    /// release the instance lock.
    pub async fn stop(&self) -> Result<(), VoiceKeyError> {
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(handle) = self
            .worker_handle
            .lock()
            .expect("worker handle mutex poisoned")
            .take()
        {
            let deadline = Instant::now() + WORKER_JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                tracing::warn!("worker thread did not exit within the bounded join window");
            }
        }

        {
            let mut capture = self.audio_capture.lock().await;
            capture.stop().await?;
        }

        let _ = self.state_machine.transition(AppEvent::StopRequested);
        let _ = self.state_machine.transition(AppEvent::ShutdownComplete);

        if let Some(backend) = &self.hotkey_backend {
            let mut backend = backend.lock().expect("hotkey backend mutex poisoned");
            backend.unregister("toggle_listening");
            backend.unregister("pause");
            backend.unregister("stop");
        }

        if let Some(lock) = self
            .instance_lock
            .lock()
            .expect("instance lock mutex poisoned")
            .take()
        {
            lock.release();
        }

        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn default_keyboard_backend() -> Box<dyn KeyboardBackend> {
    Box::new(crate::keyboard::LinuxKeyboard::default())
}
#[cfg(not(target_os = "linux"))]
fn default_keyboard_backend() -> Box<dyn KeyboardBackend> {
    Box::new(crate::keyboard::InMemoryKeyboard::default())
}

#[cfg(target_os = "linux")]
fn default_window_backend() -> Box<dyn WindowBackend> {
    Box::new(crate::window::LinuxWindow::default())
}
#[cfg(not(target_os = "linux"))]
fn default_window_backend() -> Box<dyn WindowBackend> {
    Box::new(crate::window::InMemoryWindow::default())
}

#[cfg(target_os = "linux")]
fn default_hotkey_backend() -> Box<dyn HotkeyBackend> {
    Box::new(crate::hotkey::EvdevHotkeyBackend::default())
}
#[cfg(not(target_os = "linux"))]
fn default_hotkey_backend() -> Box<dyn HotkeyBackend> {
    Box::new(crate::hotkey::InMemoryHotkeyBackend::default())
}

fn build_local_backend(config: &Config) -> Result<LocalAsrBackend, VoiceKeyError> {
    let profile = ModelProfile::parse(&config.engine.model_profile).unwrap_or_else(|| {
        tracing::warn!(
            configured = %config.engine.model_profile,
            "unknown model_profile; falling back to 'base'"
        );
        ModelProfile::Base
    });
    let backend = LocalAsrBackend::new(
        Config::models_dir(),
        config.engine.language.clone(),
        LOCAL_TRANSCRIPTION_TIMEOUT_SECONDS,
    );
    backend.load_model(profile)?;
    Ok(backend)
}

fn build_cloud_backend(config: &Config) -> Result<CloudAsrBackend, VoiceKeyError> {
    Ok(CloudAsrBackend::new(
        config.engine.cloud_api_base.clone(),
        config.engine.cloud_model.clone(),
        None,
        config.engine.cloud_timeout_seconds,
    )?)
}

fn build_asr_router(config: &Config) -> Result<AsrRouter, VoiceKeyError> {
    let mode = config.engine.asr_backend.as_router_mode();

    let local: Option<Box<dyn AsrBackend>> = match mode {
        AsrMode::LocalOnly | AsrMode::Hybrid => Some(Box::new(build_local_backend(config)?)),
        AsrMode::CloudPrimary => None,
    };
    let cloud: Option<Box<dyn AsrBackend>> = match mode {
        AsrMode::Hybrid | AsrMode::CloudPrimary => Some(Box::new(build_cloud_backend(config)?)),
        AsrMode::LocalOnly => None,
    };

    Ok(AsrRouter::new(mode, local, cloud)?)
}

/// Whether an `InjectionError` indicates the keyboard is safety-critically
/// blocked (no adapter can type at all) rather than a one-off malformed
/// command, per §7's `KeyboardBlocked` safety-critical code.
fn is_keyboard_blocked(e: &InjectionError) -> bool {
    matches!(
        e,
        InjectionError::PrimaryBackendUnavailable(_)
            | InjectionError::FallbackBackendUnavailable(_)
            | InjectionError::InputPermissionRequired(_)
            | InjectionError::AdminRequired(_)
    )
}

/// Log a hotkey `register()` outcome: a conflict (either blocked or already
/// bound) surfaces the deterministic alternative suggestions §4.13 computes
/// rather than being silently absorbed.
fn log_registration(report: crate::hotkey::RegistrationReport) {
    if report.registered {
        tracing::info!(hotkey = %report.hotkey, "hotkey registered");
    } else {
        tracing::warn!(
            hotkey = %report.hotkey,
            alternatives = ?report.alternatives,
            "hotkey registration conflict; try one of the suggested alternatives"
        );
    }
}

/// Select a VAD implementation per §4.4: attempt the Whisper-VAD model
/// first, falling back to the RMS-energy gate only when the model is
/// disabled or unavailable.
fn build_vad(config: &Config) -> Box<dyn VadProcessor> {
    if !config.vad.enabled {
        return Box::new(EnergyVad::new(config.vad.speech_threshold));
    }
    let model_path = Config::models_dir().join("ggml-silero-vad.bin");
    match model_path.to_str() {
        Some(path) => match ModelVad::load(path, config.vad.speech_threshold) {
            Ok(vad) => Box::new(vad),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    model_path = %model_path.display(),
                    "VAD model unavailable; falling back to energy-based VAD"
                );
                Box::new(EnergyVad::new(config.vad.speech_threshold))
            }
        },
        None => {
            tracing::warn!("VAD model path is not valid UTF-8; falling back to energy-based VAD");
            Box::new(EnergyVad::new(config.vad.speech_threshold))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::hotkey::InMemoryHotkeyBackend;
    use crate::keyboard::InMemoryKeyboard;
    use crate::transcribe::BackendKind;
    use crate::error::AudioError;
    use crate::keyboard::{BackendHealth as KeyboardBackendHealth, KeyboardBackend, KeyboardCapabilityReport};

    struct AlwaysBlockedKeyboard;

    impl KeyboardBackend for AlwaysBlockedKeyboard {
        fn type_text(&mut self, _text: &str, _delay_ms: u32) -> Result<(), InjectionError> {
            Err(InjectionError::PrimaryBackendUnavailable("no adapter found".to_string()))
        }
        fn press_key(&mut self, _key: &str) -> Result<(), InjectionError> {
            Err(InjectionError::PrimaryBackendUnavailable("no adapter found".to_string()))
        }
        fn press_combo(&mut self, _keys: &[String]) -> Result<(), InjectionError> {
            Err(InjectionError::PrimaryBackendUnavailable("no adapter found".to_string()))
        }
        fn self_check(&mut self) -> KeyboardCapabilityReport {
            KeyboardCapabilityReport {
                health: KeyboardBackendHealth::Unavailable,
                backend_name: "always-blocked",
                detail: "no adapter found".to_string(),
            }
        }
    }

    struct NullAudioCapture {
        queue: Arc<AudioFrameQueue>,
        running: bool,
    }

    impl NullAudioCapture {
        fn new() -> Self {
            Self {
                queue: Arc::new(AudioFrameQueue::new(8)),
                running: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl AudioCapture for NullAudioCapture {
        async fn start(&mut self) -> Result<(), AudioError> {
            self.running = true;
            Ok(())
        }
        async fn stop(&mut self) -> Result<(), AudioError> {
            self.running = false;
            Ok(())
        }
        fn is_running(&self) -> bool {
            self.running
        }
        fn audio_queue(&self) -> Arc<AudioFrameQueue> {
            self.queue.clone()
        }
    }

    struct StubAsr {
        text: &'static str,
        confidence: f32,
    }

    impl AsrBackend for StubAsr {
        fn transcribe(&self, _samples: &[f32]) -> Result<Vec<TranscriptEvent>, RecognitionError> {
            Ok(vec![TranscriptEvent::final_event(self.text, self.confidence)])
        }
    }

    fn test_parts(mode: ListeningMode) -> RuntimeCoordinatorParts {
        RuntimeCoordinatorParts {
            mode,
            wake_phrase: "voice key".to_string(),
            wake_window_timeout_seconds: 5.0,
            inactivity_auto_pause_seconds: 300.0,
            confidence_threshold: 0.5,
            resume_by_phrase_enabled: true,
            registry: CommandRegistry::build(Vec::new()).unwrap(),
            gates: FeatureGates::default(),
            parser_config: ParserConfig::default(),
            snippet_expander: None,
            asr_router: AsrRouter::new(
                AsrMode::LocalOnly,
                Some(Box::new(StubAsr {
                    text: "unused",
                    confidence: 1.0,
                })),
                None,
            )
            .unwrap(),
            audio_capture: Box::new(NullAudioCapture::new()),
            vad: Box::new(EnergyVad::new(0.5)),
            keyboard: Box::new(InMemoryKeyboard::default()),
            window: None,
            hotkey_backend: Some(Box::new(InMemoryHotkeyBackend::default())),
            hotkeys: Some(HotkeySpec {
                toggle_listening: "ctrl+alt+v".to_string(),
                pause: "ctrl+alt+p".to_string(),
                stop: "ctrl+alt+x".to_string(),
            }),
            instance_lock: None,
        }
    }

    fn started(mode: ListeningMode) -> RuntimeCoordinator {
        let coordinator = RuntimeCoordinator::new(test_parts(mode)).unwrap();
        coordinator.state_machine.transition(AppEvent::InitSucceeded).unwrap();
        if mode == ListeningMode::Continuous {
            coordinator
                .state_machine
                .transition(AppEvent::ContinuousStart)
                .unwrap();
            coordinator.wake_window.lock().unwrap().open_window(0.0);
        }
        coordinator
    }

    #[test]
    fn wake_then_dictate_then_type() {
        let c = started(ListeningMode::WakeWord);
        let update = c.on_transcript_event(
            &TranscriptEvent::final_event("Please VOICE  KEY start listening", 1.0),
            true,
        );
        assert!(update.wake_detected);
        assert_eq!(c.state(), AppState::Listening);

        let recorded = Arc::new(Mutex::new(Vec::new()));
        let recorded_clone = recorded.clone();
        c.set_text_output(Box::new(move |text: &str| {
            recorded_clone.lock().unwrap().push(text.to_string());
        }));

        let update = c.on_transcript_event(&TranscriptEvent::final_event("hello from runtime", 0.9), true);
        assert_eq!(update.routed_text.as_deref(), Some("hello from runtime"));
        assert_eq!(recorded.lock().unwrap().as_slice(), ["hello from runtime"]);
    }

    #[test]
    fn unknown_command_suffix_falls_back_to_literal() {
        let c = started(ListeningMode::WakeWord);
        c.on_transcript_event(&TranscriptEvent::final_event("voice key", 1.0), true);
        assert_eq!(c.state(), AppState::Listening);
        let update = c.on_transcript_event(&TranscriptEvent::final_event("hello world command", 0.9), true);
        assert_eq!(update.routed_text.as_deref(), Some("hello world command"));
    }

    #[test]
    fn builtin_command_executes_keyboard_action() {
        let c = started(ListeningMode::WakeWord);
        c.on_transcript_event(&TranscriptEvent::final_event("voice key", 1.0), true);
        let update = c.on_transcript_event(&TranscriptEvent::final_event("new line command", 0.9), true);
        assert_eq!(update.executed_command_id.as_deref(), Some("new_line"));
        assert!(update.routed_text.is_none());
    }

    #[test]
    fn paused_behavior_drops_then_resumes_then_stops() {
        let c = started(ListeningMode::Toggle);
        c.state_machine.transition(AppEvent::PauseRequested).unwrap();
        assert_eq!(c.state(), AppState::Paused);

        let update = c.on_transcript_event(&TranscriptEvent::final_event("hello from paused", 0.9), true);
        assert!(update.transition.is_none());
        assert_eq!(c.state(), AppState::Paused);

        let update = c.on_transcript_event(&TranscriptEvent::final_event("resume voice key", 1.0), true);
        assert_eq!(c.state(), AppState::Standby);
        assert!(update.transition.is_some());

        c.state_machine.transition(AppEvent::PauseRequested).unwrap();
        let update = c.on_transcript_event(&TranscriptEvent::final_event("voice key stop", 1.0), true);
        assert_eq!(c.state(), AppState::ShuttingDown);
        assert!(update.transition.is_some());
    }

    #[test]
    fn hybrid_fallback_reports_cloud_used() {
        struct FailingAsr;
        impl AsrBackend for FailingAsr {
            fn transcribe(&self, _samples: &[f32]) -> Result<Vec<TranscriptEvent>, RecognitionError> {
                Err(RecognitionError::TranscriptionFailed("boom".to_string()))
            }
        }
        let router = AsrRouter::new(
            AsrMode::Hybrid,
            Some(Box::new(FailingAsr)),
            Some(Box::new(StubAsr {
                text: "from cloud",
                confidence: 0.9,
            })),
        )
        .unwrap();
        let result = router.transcribe(&[0.1]).unwrap();
        assert_eq!(result.backend_used, Some(BackendKind::Cloud));
        assert!(result.fallback_used);
    }

    #[test]
    fn wake_window_expiry_drives_listening_to_standby_via_poll() {
        let c = started(ListeningMode::WakeWord);
        c.state_machine.transition(AppEvent::WakePhraseDetected).unwrap();
        c.wake_window.lock().unwrap().open_window(0.0);
        assert_eq!(c.state(), AppState::Listening);

        assert_eq!(c.poll_at(5.0), RuntimeUpdate::default());
        assert_eq!(c.state(), AppState::Listening);

        let update = c.poll_at(5.01);
        assert_eq!(c.state(), AppState::Standby);
        assert!(update.transition.is_some());
    }

    #[test]
    fn on_transcript_is_a_noop_outside_wake_word_mode() {
        let c = started(ListeningMode::Toggle);
        let update = c.on_transcript("hello there", true);
        assert_eq!(update, RuntimeUpdate::default());
        assert_eq!(c.state(), AppState::Standby);
    }

    #[test]
    fn toggle_hotkey_enters_and_leaves_listening_in_toggle_mode() {
        let c = started(ListeningMode::Toggle);
        let update = c.handle_toggle_hotkey();
        assert_eq!(c.state(), AppState::Listening);
        assert!(update.transition.is_some());

        let update = c.handle_toggle_hotkey();
        assert_eq!(c.state(), AppState::Standby);
        assert!(update.transition.is_some());
    }

    #[test]
    fn low_confidence_final_is_dropped_before_dispatch() {
        let c = started(ListeningMode::WakeWord);
        c.on_transcript_event(&TranscriptEvent::final_event("voice key", 1.0), true);
        let update = c.on_transcript_event(&TranscriptEvent::final_event("hello", 0.1), true);
        assert_eq!(update, RuntimeUpdate::default());
    }

    #[test]
    fn interim_events_bypass_confidence_filtering() {
        let c = started(ListeningMode::WakeWord);
        c.on_transcript_event(&TranscriptEvent::final_event("voice key", 1.0), true);
        let mut interim = TranscriptEvent::interim("hello");
        interim.confidence = 0.0;
        let update = c.on_transcript_event(&interim, true);
        assert_eq!(update.routed_text.as_deref(), Some("hello"));
    }

    #[test]
    fn continuous_mode_keeps_dictating_after_a_silence_gap() {
        // Continuous mode opens its wake window once at `start()` and has no
        // re-open path; closing it here simulates a silence gap longer than
        // `wake_window_timeout_seconds` having already elapsed. Dictation
        // must not depend on that window at all in this mode (§4.9).
        let c = started(ListeningMode::Continuous);
        c.wake_window.lock().unwrap().close();
        assert!(!c.wake_window.lock().unwrap().is_open(now_seconds()));

        let recorded = Arc::new(Mutex::new(Vec::new()));
        let recorded_clone = recorded.clone();
        c.set_text_output(Box::new(move |text: &str| {
            recorded_clone.lock().unwrap().push(text.to_string());
        }));

        let update = c.on_transcript_event(&TranscriptEvent::final_event("hello again", 0.9), true);
        assert_eq!(update.routed_text.as_deref(), Some("hello again"));
        assert_eq!(recorded.lock().unwrap().as_slice(), ["hello again"]);
    }

    #[test]
    fn toggle_mode_keeps_dictating_after_a_silence_gap() {
        let c = started(ListeningMode::Toggle);
        c.handle_toggle_hotkey();
        assert_eq!(c.state(), AppState::Listening);
        c.wake_window.lock().unwrap().close();

        let update = c.on_transcript_event(&TranscriptEvent::final_event("still here", 0.9), true);
        assert_eq!(update.routed_text.as_deref(), Some("still here"));
    }

    #[test]
    fn action_router_self_check_reports_in_memory_backends_ready() {
        use crate::keyboard::BackendHealth;
        let c = started(ListeningMode::WakeWord);
        let (keyboard_report, window_report) = c
            .action_router
            .lock()
            .unwrap()
            .self_check();
        assert_eq!(keyboard_report.health, BackendHealth::Ready);
        assert!(window_report.is_none());
    }

    #[test]
    fn keyboard_blocked_dispatch_failure_forces_paused() {
        let c = started(ListeningMode::WakeWord);
        c.on_transcript_event(&TranscriptEvent::final_event("voice key", 1.0), true);
        assert_eq!(c.state(), AppState::Listening);

        c.action_router
            .lock()
            .unwrap()
            .set_keyboard(Box::new(AlwaysBlockedKeyboard));

        let update = c.on_transcript_event(&TranscriptEvent::final_event("new line command", 0.9), true);
        assert!(update.executed_command_id.is_none());
        assert_eq!(c.state(), AppState::Paused);
    }
}
