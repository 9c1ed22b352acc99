//! Deterministic in-memory keyboard adapter: records every call instead of
//! touching the display server. Used by tests and as the fallback on
//! platforms with no concrete adapter.

use super::{BackendHealth, KeyboardBackend, KeyboardCapabilityReport};
use crate::error::InjectionError;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    TypeText { text: String, delay_ms: u32 },
    PressKey { key: String },
    PressCombo { keys: Vec<String> },
}

#[derive(Debug, Default)]
pub struct InMemoryKeyboard {
    pub calls: Vec<RecordedCall>,
}

impl KeyboardBackend for InMemoryKeyboard {
    fn type_text(&mut self, text: &str, delay_ms: u32) -> Result<(), InjectionError> {
        if text.is_empty() {
            return Err(InjectionError::EmptyText);
        }
        self.calls.push(RecordedCall::TypeText {
            text: text.to_string(),
            delay_ms,
        });
        Ok(())
    }

    fn press_key(&mut self, key: &str) -> Result<(), InjectionError> {
        self.calls.push(RecordedCall::PressKey {
            key: key.to_string(),
        });
        Ok(())
    }

    fn press_combo(&mut self, keys: &[String]) -> Result<(), InjectionError> {
        if keys.is_empty() {
            return Err(InjectionError::InvalidCombo("combo has no keys".to_string()));
        }
        self.calls.push(RecordedCall::PressCombo {
            keys: keys.to_vec(),
        });
        Ok(())
    }

    fn self_check(&mut self) -> KeyboardCapabilityReport {
        KeyboardCapabilityReport {
            health: BackendHealth::Ready,
            backend_name: "in_memory",
            detail: "deterministic test adapter".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_rejected() {
        let mut kb = InMemoryKeyboard::default();
        assert!(matches!(
            kb.type_text("", 0),
            Err(InjectionError::EmptyText)
        ));
    }

    #[test]
    fn records_calls_in_order() {
        let mut kb = InMemoryKeyboard::default();
        kb.type_text("hello", 5).unwrap();
        kb.press_key("Enter").unwrap();
        kb.press_combo(&["ctrl".to_string(), "c".to_string()])
            .unwrap();
        assert_eq!(kb.calls.len(), 3);
        assert_eq!(
            kb.calls[0],
            RecordedCall::TypeText {
                text: "hello".to_string(),
                delay_ms: 5
            }
        );
    }

    #[test]
    fn self_check_always_ready() {
        let mut kb = InMemoryKeyboard::default();
        assert_eq!(kb.self_check().health, BackendHealth::Ready);
    }
}
