//! voicekey: an offline voice-to-keystroke dictation runtime core.
//!
//! This library provides:
//! - Audio capture (cpal) → voice-activity detection → ASR routing
//!   (local-only / hybrid / cloud-primary, with per-call fallback)
//! - A lifecycle state machine (wake / listening / processing / paused /
//!   shutting-down) driven by transcript events, hotkeys, and watchdog
//!   timers
//! - A command registry + parser (feature-gated, fuzzy-matched, with
//!   snippet expansion) and an action router that turns a recognized
//!   command into a keyboard or window-manager action
//! - A cross-process single-instance guard
//!
//! # Architecture
//!
//! ```text
//!                         ┌───────────────────────────┐
//!                         │      RuntimeCoordinator    │
//!                         └───────────────────────────┘
//!                                       │
//!         ┌──────────────┬──────────────┼──────────────┬──────────────┐
//!         ▼              ▼              ▼              ▼              ▼
//!   ┌───────────┐  ┌────────────┐ ┌───────────┐  ┌────────────┐ ┌───────────┐
//!   │   Audio   │  │    VAD     │ │    ASR    │  │  Command   │ │  Hotkeys  │
//!   │  (cpal)   │  │ (energy /  │ │  Router   │  │  Registry  │ │ (evdev)   │
//!   │           │  │  whisper)  │ │ local/    │  │  + Parser  │ │           │
//!   │           │  │            │ │ cloud     │  │            │ │           │
//!   └───────────┘  └────────────┘ └───────────┘  └────────────┘ └───────────┘
//!         │                             │               │
//!         │ audio frames                │ transcript    │ parsed command
//!         ▼                             ▼               ▼
//!   ┌─────────────────────────────────────────────────────────────────┐
//!   │           state_machine: wake/listening/processing/paused       │
//!   └─────────────────────────────────────────────────────────────────┘
//!                                       │
//!                          ┌────────────┴────────────┐
//!                          ▼                          ▼
//!                   ┌────────────┐             ┌────────────┐
//!                   │  Keyboard  │             │   Window   │
//!                   │ injection  │             │  actions   │
//!                   └────────────┘             └────────────┘
//! ```

pub mod action;
pub mod audio;
pub mod command;
pub mod confidence;
pub mod config;
pub mod cpu;
pub mod error;
pub mod hotkey;
pub mod instance;
pub mod keyboard;
pub mod normalize;
pub mod resilience;
pub mod routing;
pub mod runtime;
pub mod state_machine;
pub mod transcribe;
pub mod types;
pub mod vad;
pub mod wake;
pub mod watchdog;
pub mod window;

pub use config::Config;
pub use error::{Result, VoiceKeyError};
pub use instance::InstanceLock;
pub use runtime::RuntimeCoordinator;
pub use state_machine::{AppEvent, AppState, ListeningMode, VoiceKeyStateMachine};
