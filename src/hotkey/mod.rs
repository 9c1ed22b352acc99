//! Hotkey abstraction (§4.13): normalized `modifier+...+key` syntax,
//! deterministic conflict suggestions, and a backend trait for registering
//! and polling fired hotkeys.
//!
//! Grounded in the reference evdev-based listener: kernel-level device
//! discovery and `parse_key_name` survive into the Linux backend; the
//! registration/conflict-suggestion layer above it is new, built to the
//! §4.13 contract.

#[cfg(target_os = "linux")]
pub mod evdev_backend;
pub mod memory;
mod normalize;

#[cfg(target_os = "linux")]
pub use evdev_backend::EvdevHotkeyBackend;
pub use memory::InMemoryHotkeyBackend;
pub use normalize::{normalize_hotkey, suggest_alternatives};

use crate::error::HotkeyError;

/// Outcome of a single `register()` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationReport {
    pub hotkey: String,
    pub registered: bool,
    pub alternatives: Vec<String>,
}

/// Contract every hotkey backend honors. `register`/`unregister` mutate the
/// backend's bookkeeping synchronously; the actual key-event listener runs
/// on its own thread and is drained via `try_recv`.
pub trait HotkeyBackend: Send {
    /// `hotkey` must already be normalized (see [`normalize_hotkey`]).
    fn register(&mut self, name: &str, hotkey: &str) -> Result<RegistrationReport, HotkeyError>;
    /// Idempotent: unregistering an unknown name is not an error.
    fn unregister(&mut self, name: &str);
    fn list_registered(&self) -> Vec<(String, String)>;
    /// Start the background listener thread, if any. Idempotent.
    fn start(&mut self) -> Result<(), HotkeyError>;
    /// Non-blocking poll for the name of a fired hotkey.
    fn try_recv(&mut self) -> Option<String>;
}
