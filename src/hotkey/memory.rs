//! Deterministic in-memory hotkey backend used by tests: registrations are
//! bookkept without touching any input device, and hotkeys are "fired" by
//! calling `fire()` directly.

use std::collections::{HashMap, VecDeque};

use super::{normalize::suggest_alternatives, HotkeyBackend, RegistrationReport};
use crate::error::HotkeyError;

#[derive(Debug, Default)]
pub struct InMemoryHotkeyBackend {
    registrations: HashMap<String, String>,
    pending: VecDeque<String>,
}

impl InMemoryHotkeyBackend {
    /// Test helper: simulate the named hotkey firing.
    pub fn fire(&mut self, name: &str) {
        if self.registrations.contains_key(name) {
            self.pending.push_back(name.to_string());
        }
    }
}

impl HotkeyBackend for InMemoryHotkeyBackend {
    fn register(&mut self, name: &str, hotkey: &str) -> Result<RegistrationReport, HotkeyError> {
        let conflict = self
            .registrations
            .values()
            .any(|existing| existing == hotkey);
        if conflict {
            return Ok(RegistrationReport {
                hotkey: hotkey.to_string(),
                registered: false,
                alternatives: suggest_alternatives(hotkey),
            });
        }
        self.registrations
            .insert(name.to_string(), hotkey.to_string());
        Ok(RegistrationReport {
            hotkey: hotkey.to_string(),
            registered: true,
            alternatives: Vec::new(),
        })
    }

    fn unregister(&mut self, name: &str) {
        self.registrations.remove(name);
    }

    fn list_registered(&self) -> Vec<(String, String)> {
        self.registrations
            .iter()
            .map(|(name, hotkey)| (name.clone(), hotkey.clone()))
            .collect()
    }

    fn start(&mut self) -> Result<(), HotkeyError> {
        Ok(())
    }

    fn try_recv(&mut self) -> Option<String> {
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_fire_is_observable() {
        let mut backend = InMemoryHotkeyBackend::default();
        backend.register("toggle", "ctrl+f9").unwrap();
        backend.fire("toggle");
        assert_eq!(backend.try_recv(), Some("toggle".to_string()));
        assert_eq!(backend.try_recv(), None);
    }

    #[test]
    fn conflicting_hotkey_reports_unregistered_with_alternatives() {
        let mut backend = InMemoryHotkeyBackend::default();
        backend.register("toggle", "ctrl+f9").unwrap();
        let report = backend.register("pause", "ctrl+f9").unwrap();
        assert!(!report.registered);
        assert_eq!(report.alternatives.len(), 3);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut backend = InMemoryHotkeyBackend::default();
        backend.unregister("never_registered");
        backend.register("toggle", "ctrl+f9").unwrap();
        backend.unregister("toggle");
        backend.unregister("toggle");
        assert!(backend.list_registered().is_empty());
    }
}
