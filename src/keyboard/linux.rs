//! Linux keyboard adapter chaining external injection tools: `wtype` first
//! (Wayland virtual-keyboard, no daemon), falling back to `ydotool` (works
//! under X11/Wayland/TTY via the uinput kernel interface, requires
//! `ydotoold`). Never panics on a missing tool; `self_check` reports
//! `Degraded`/`Unavailable` and surfaces a typed error from the operation.

use std::collections::HashMap;
use std::process::{Command, Stdio};

use super::{BackendHealth, KeyboardBackend, KeyboardCapabilityReport};
use crate::error::InjectionError;

const WTYPE_KEY_NAMES: &[(&str, &str)] = &[
    ("Enter", "Return"),
    ("Tab", "Tab"),
    ("Space", "space"),
    ("Backspace", "BackSpace"),
    ("Delete", "Delete"),
    ("Left", "Left"),
    ("Right", "Right"),
    ("Up", "Up"),
    ("Down", "Down"),
    ("Escape", "Escape"),
];

fn wtype_key_name(key: &str) -> &str {
    WTYPE_KEY_NAMES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .unwrap_or(key)
}

fn which(tool: &str) -> bool {
    Command::new("which")
        .arg(tool)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub struct LinuxKeyboard {
    wtype_available: bool,
    ydotool_available: bool,
}

impl Default for LinuxKeyboard {
    fn default() -> Self {
        Self {
            wtype_available: which("wtype"),
            ydotool_available: which("ydotool"),
        }
    }
}

impl LinuxKeyboard {
    fn run_wtype(&self, args: &[&str]) -> Result<(), InjectionError> {
        let output = Command::new("wtype")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InjectionError::PrimaryBackendUnavailable("wtype not installed".to_string())
                } else {
                    InjectionError::InjectionFailed(e.to_string())
                }
            })?;
        if !output.status.success() {
            return Err(InjectionError::InjectionFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }

    fn run_ydotool(&self, args: &[&str]) -> Result<(), InjectionError> {
        let output = Command::new("ydotool")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InjectionError::FallbackBackendUnavailable("ydotool not installed".to_string())
                } else {
                    InjectionError::InjectionFailed(e.to_string())
                }
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("socket") || stderr.contains("daemon") {
                return Err(InjectionError::FallbackBackendUnavailable(
                    "ydotoold is not running".to_string(),
                ));
            }
            return Err(InjectionError::InjectionFailed(stderr.to_string()));
        }
        Ok(())
    }
}

impl KeyboardBackend for LinuxKeyboard {
    fn type_text(&mut self, text: &str, delay_ms: u32) -> Result<(), InjectionError> {
        if text.is_empty() {
            return Err(InjectionError::EmptyText);
        }
        if self.wtype_available {
            let delay = delay_ms.to_string();
            let mut args = vec![];
            if delay_ms > 0 {
                args.push("-d");
                args.push(&delay);
            }
            args.push("--");
            args.push(text);
            return self.run_wtype(&args);
        }
        if self.ydotool_available {
            let delay = delay_ms.to_string();
            return self.run_ydotool(&["type", "--key-delay", &delay, "--", text]);
        }
        Err(InjectionError::PrimaryBackendUnavailable(
            "neither wtype nor ydotool is available".to_string(),
        ))
    }

    fn press_key(&mut self, key: &str) -> Result<(), InjectionError> {
        if self.wtype_available {
            return self.run_wtype(&["-k", wtype_key_name(key)]);
        }
        if self.ydotool_available {
            return self.run_ydotool(&["key", &format!("{key}:1"), &format!("{key}:0")]);
        }
        Err(InjectionError::PrimaryBackendUnavailable(
            "neither wtype nor ydotool is available".to_string(),
        ))
    }

    fn press_combo(&mut self, keys: &[String]) -> Result<(), InjectionError> {
        if keys.is_empty() {
            return Err(InjectionError::InvalidCombo("combo has no keys".to_string()));
        }
        if self.wtype_available {
            let (modifiers, key) = keys.split_at(keys.len() - 1);
            let mut args: Vec<String> = Vec::new();
            for m in modifiers {
                args.push("-M".to_string());
                args.push(m.clone());
            }
            args.push("-k".to_string());
            args.push(wtype_key_name(&key[0]).to_string());
            for m in modifiers.iter().rev() {
                args.push("-m".to_string());
                args.push(m.clone());
            }
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            return self.run_wtype(&arg_refs);
        }
        if self.ydotool_available {
            let codes: Result<Vec<&'static str>, InjectionError> =
                keys.iter().map(|k| evdev_code(k)).collect();
            let codes = codes?;
            let mut args: Vec<String> = codes.iter().map(|c| format!("{c}:1")).collect();
            args.extend(codes.iter().rev().map(|c| format!("{c}:0")));
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            return self.run_ydotool(&arg_refs);
        }
        Err(InjectionError::PrimaryBackendUnavailable(
            "neither wtype nor ydotool is available".to_string(),
        ))
    }

    fn self_check(&mut self) -> KeyboardCapabilityReport {
        self.wtype_available = which("wtype");
        self.ydotool_available = which("ydotool");
        if self.wtype_available {
            KeyboardCapabilityReport {
                health: BackendHealth::Ready,
                backend_name: "wtype",
                detail: "wtype available on PATH".to_string(),
            }
        } else if self.ydotool_available {
            KeyboardCapabilityReport {
                health: BackendHealth::Degraded,
                backend_name: "ydotool",
                detail: "wtype unavailable; using ydotool fallback".to_string(),
            }
        } else {
            KeyboardCapabilityReport {
                health: BackendHealth::Unavailable,
                backend_name: "none",
                detail: "neither wtype nor ydotool found on PATH".to_string(),
            }
        }
    }
}

fn evdev_code(key: &str) -> Result<&'static str, InjectionError> {
    let map: HashMap<&str, &str> = [
        ("ctrl", "29"),
        ("alt", "56"),
        ("shift", "42"),
        ("meta", "125"),
        ("c", "46"),
        ("v", "47"),
        ("x", "45"),
        ("z", "44"),
        ("a", "30"),
        ("l", "38"),
        ("t", "20"),
        ("backspace", "14"),
    ]
    .into_iter()
    .collect();
    map.get(key)
        .copied()
        .ok_or_else(|| InjectionError::InvalidCombo(format!("unmapped key '{key}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wtype_key_name_translates_known_aliases() {
        assert_eq!(wtype_key_name("Enter"), "Return");
        assert_eq!(wtype_key_name("Space"), "space");
    }

    #[test]
    fn wtype_key_name_passes_through_unknown_keys() {
        assert_eq!(wtype_key_name("F5"), "F5");
    }

    #[test]
    fn evdev_code_rejects_unmapped_keys() {
        assert!(evdev_code("unknown_key").is_err());
    }
}
