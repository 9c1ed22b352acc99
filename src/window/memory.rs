//! Deterministic in-memory window adapter: records every call, always
//! reports `READY`. Used by tests and as the fallback on unsupported
//! platforms.

use super::{WindowBackend, WindowCapabilityReport};
use crate::error::InjectionError;
use crate::keyboard::BackendHealth;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedOp {
    MaximizeActive,
    MinimizeActive,
    CloseActive,
    SwitchNext,
}

#[derive(Debug, Default)]
pub struct InMemoryWindow {
    pub calls: Vec<RecordedOp>,
}

impl WindowBackend for InMemoryWindow {
    fn maximize_active(&mut self) -> Result<(), InjectionError> {
        self.calls.push(RecordedOp::MaximizeActive);
        Ok(())
    }

    fn minimize_active(&mut self) -> Result<(), InjectionError> {
        self.calls.push(RecordedOp::MinimizeActive);
        Ok(())
    }

    fn close_active(&mut self) -> Result<(), InjectionError> {
        self.calls.push(RecordedOp::CloseActive);
        Ok(())
    }

    fn switch_next(&mut self) -> Result<(), InjectionError> {
        self.calls.push(RecordedOp::SwitchNext);
        Ok(())
    }

    fn self_check(&mut self) -> WindowCapabilityReport {
        WindowCapabilityReport {
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
    fn records_calls_in_order() {
        let mut w = InMemoryWindow::default();
        w.maximize_active().unwrap();
        w.switch_next().unwrap();
        assert_eq!(
            w.calls,
            vec![RecordedOp::MaximizeActive, RecordedOp::SwitchNext]
        );
    }

    #[test]
    fn self_check_always_ready() {
        let mut w = InMemoryWindow::default();
        assert_eq!(w.self_check().health, BackendHealth::Ready);
    }
}
