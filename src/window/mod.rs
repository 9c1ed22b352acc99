//! Window backend abstraction (§4.14): active-window manipulation, in the
//! same synchronous-trait/external-tool-chain shape as the keyboard backend.

#[cfg(target_os = "linux")]
mod linux;
mod memory;

#[cfg(target_os = "linux")]
pub use linux::LinuxWindow;
pub use memory::InMemoryWindow;

use crate::error::InjectionError;
use crate::keyboard::BackendHealth;

#[derive(Debug, Clone)]
pub struct WindowCapabilityReport {
    pub health: BackendHealth,
    pub backend_name: &'static str,
    pub detail: String,
}

/// Contract every window-manipulation adapter honors.
pub trait WindowBackend: Send {
    fn maximize_active(&mut self) -> Result<(), InjectionError>;
    fn minimize_active(&mut self) -> Result<(), InjectionError>;
    fn close_active(&mut self) -> Result<(), InjectionError>;
    fn switch_next(&mut self) -> Result<(), InjectionError>;
    fn self_check(&mut self) -> WindowCapabilityReport;
}
