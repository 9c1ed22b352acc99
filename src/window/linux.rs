//! Linux window adapter chaining external window-management tools: `wmctrl`
//! first, falling back to `xdotool`. Same chaining idiom as the keyboard
//! adapter (NotFound detection, graceful degrade, never panics).

use std::process::{Command, Stdio};

use super::{WindowBackend, WindowCapabilityReport};
use crate::error::InjectionError;
use crate::keyboard::BackendHealth;

fn which(tool: &str) -> bool {
    Command::new("which")
        .arg(tool)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub struct LinuxWindow {
    wmctrl_available: bool,
    xdotool_available: bool,
}

impl Default for LinuxWindow {
    fn default() -> Self {
        Self {
            wmctrl_available: which("wmctrl"),
            xdotool_available: which("xdotool"),
        }
    }
}

impl LinuxWindow {
    fn run(&self, program: &str, args: &[&str]) -> Result<(), InjectionError> {
        let output = Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InjectionError::PrimaryBackendUnavailable(format!("{program} not installed"))
                } else {
                    InjectionError::ActionFailed(e.to_string())
                }
            })?;
        if !output.status.success() {
            return Err(InjectionError::ActionFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }
}

impl WindowBackend for LinuxWindow {
    fn maximize_active(&mut self) -> Result<(), InjectionError> {
        if self.wmctrl_available {
            return self.run("wmctrl", &["-r", ":ACTIVE:", "-b", "add,maximized_vert,maximized_horz"]);
        }
        if self.xdotool_available {
            return self.run("xdotool", &["getactivewindow", "windowsize", "100%", "100%"]);
        }
        Err(InjectionError::PrimaryBackendUnavailable(
            "neither wmctrl nor xdotool is available".to_string(),
        ))
    }

    fn minimize_active(&mut self) -> Result<(), InjectionError> {
        if self.wmctrl_available {
            return self.run("wmctrl", &["-r", ":ACTIVE:", "-b", "add,hidden"]);
        }
        if self.xdotool_available {
            return self.run("xdotool", &["getactivewindow", "windowminimize"]);
        }
        Err(InjectionError::PrimaryBackendUnavailable(
            "neither wmctrl nor xdotool is available".to_string(),
        ))
    }

    fn close_active(&mut self) -> Result<(), InjectionError> {
        if self.wmctrl_available {
            return self.run("wmctrl", &["-c", ":ACTIVE:"]);
        }
        if self.xdotool_available {
            return self.run("xdotool", &["getactivewindow", "windowclose"]);
        }
        Err(InjectionError::PrimaryBackendUnavailable(
            "neither wmctrl nor xdotool is available".to_string(),
        ))
    }

    fn switch_next(&mut self) -> Result<(), InjectionError> {
        if self.xdotool_available {
            return self.run("xdotool", &["key", "alt+Tab"]);
        }
        Err(InjectionError::SwitchBackendUnavailable(
            "xdotool required to switch windows; wmctrl alone cannot".to_string(),
        ))
    }

    fn self_check(&mut self) -> WindowCapabilityReport {
        self.wmctrl_available = which("wmctrl");
        self.xdotool_available = which("xdotool");
        if self.wmctrl_available && self.xdotool_available {
            WindowCapabilityReport {
                health: BackendHealth::Ready,
                backend_name: "wmctrl+xdotool",
                detail: "both window tools available".to_string(),
            }
        } else if self.wmctrl_available || self.xdotool_available {
            WindowCapabilityReport {
                health: BackendHealth::Degraded,
                backend_name: if self.wmctrl_available { "wmctrl" } else { "xdotool" },
                detail: "only one window tool available; switch_next may be unavailable".to_string(),
            }
        } else {
            WindowCapabilityReport {
                health: BackendHealth::Unavailable,
                backend_name: "none",
                detail: "neither wmctrl nor xdotool found on PATH".to_string(),
            }
        }
    }
}
