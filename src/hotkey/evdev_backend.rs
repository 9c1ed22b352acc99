//! Linux hotkey backend: kernel-level key event detection over evdev.
//!
//! Device discovery and key-name parsing are adapted directly from the
//! reference evdev listener (non-blocking fd polling across all discovered
//! keyboard devices, same `find_keyboard_devices`/`parse_key_name` shape);
//! the registration/conflict bookkeeping above it is new.

use std::collections::{HashMap, HashSet};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use evdev::{Device, InputEventKind, Key};

use super::normalize::suggest_alternatives;
use super::{HotkeyBackend, RegistrationReport};
use crate::error::HotkeyError;

struct ParsedHotkey {
    modifiers: HashSet<Key>,
    key: Key,
}

pub struct EvdevHotkeyBackend {
    registrations: HashMap<String, String>,
    parsed: Arc<Mutex<HashMap<String, ParsedHotkey>>>,
    fired_tx: Sender<String>,
    fired_rx: Receiver<String>,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Default for EvdevHotkeyBackend {
    fn default() -> Self {
        let (fired_tx, fired_rx) = mpsc::channel();
        Self {
            registrations: HashMap::new(),
            parsed: Arc::new(Mutex::new(HashMap::new())),
            fired_tx,
            fired_rx,
            stop_tx: None,
            worker: None,
        }
    }
}

impl HotkeyBackend for EvdevHotkeyBackend {
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

        let parsed = parse_normalized(hotkey)?;
        self.registrations
            .insert(name.to_string(), hotkey.to_string());
        self.parsed
            .lock()
            .expect("hotkey map mutex poisoned")
            .insert(name.to_string(), parsed);
        Ok(RegistrationReport {
            hotkey: hotkey.to_string(),
            registered: true,
            alternatives: Vec::new(),
        })
    }

    fn unregister(&mut self, name: &str) {
        self.registrations.remove(name);
        self.parsed
            .lock()
            .expect("hotkey map mutex poisoned")
            .remove(name);
    }

    fn list_registered(&self) -> Vec<(String, String)> {
        self.registrations
            .iter()
            .map(|(name, hotkey)| (name.clone(), hotkey.clone()))
            .collect()
    }

    fn start(&mut self) -> Result<(), HotkeyError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let device_paths = find_keyboard_devices()?;
        if device_paths.is_empty() {
            return Err(HotkeyError::NoKeyboard);
        }
        let (stop_tx, stop_rx) = mpsc::channel();
        self.stop_tx = Some(stop_tx);
        let parsed = Arc::clone(&self.parsed);
        let fired_tx = self.fired_tx.clone();
        self.worker = Some(std::thread::spawn(move || {
            listener_loop(device_paths, parsed, fired_tx, stop_rx);
        }));
        Ok(())
    }

    fn try_recv(&mut self) -> Option<String> {
        self.fired_rx.try_recv().ok()
    }
}

fn parse_normalized(normalized: &str) -> Result<ParsedHotkey, HotkeyError> {
    let tokens: Vec<&str> = normalized.split('+').collect();
    let (modifier_tokens, key_token) = tokens.split_at(tokens.len() - 1);
    let mut modifiers = HashSet::new();
    for token in modifier_tokens {
        for key in modifier_keys(token)? {
            modifiers.insert(key);
        }
    }
    let key = parse_key_name(key_token[0])?;
    Ok(ParsedHotkey { modifiers, key })
}

fn modifier_keys(name: &str) -> Result<Vec<Key>, HotkeyError> {
    match name {
        "ctrl" => Ok(vec![Key::KEY_LEFTCTRL, Key::KEY_RIGHTCTRL]),
        "alt" => Ok(vec![Key::KEY_LEFTALT, Key::KEY_RIGHTALT]),
        "shift" => Ok(vec![Key::KEY_LEFTSHIFT, Key::KEY_RIGHTSHIFT]),
        "meta" => Ok(vec![Key::KEY_LEFTMETA, Key::KEY_RIGHTMETA]),
        other => Err(HotkeyError::UnknownKey(other.to_string())),
    }
}

fn listener_loop(
    device_paths: Vec<PathBuf>,
    parsed: Arc<Mutex<HashMap<String, ParsedHotkey>>>,
    fired_tx: Sender<String>,
    stop_rx: Receiver<()>,
) {
    let mut devices: Vec<Device> = device_paths
        .iter()
        .filter_map(|path| match Device::open(path) {
            Ok(device) => {
                let fd = device.as_raw_fd();
                unsafe {
                    let flags = libc::fcntl(fd, libc::F_GETFL);
                    if flags != -1 {
                        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    }
                }
                Some(device)
            }
            Err(e) => {
                tracing::warn!(?path, error = %e, "failed to open keyboard device");
                None
            }
        })
        .collect();

    if devices.is_empty() {
        tracing::error!("no keyboard devices could be opened for hotkey detection");
        return;
    }

    let mut held: HashSet<Key> = HashSet::new();
    let mut already_fired: HashSet<String> = HashSet::new();

    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(std::sync::mpsc::TryRecvError::Disconnected) => return,
            Err(std::sync::mpsc::TryRecvError::Empty) => {}
        }

        for device in &mut devices {
            if let Ok(events) = device.fetch_events() {
                for event in events {
                    if let InputEventKind::Key(key) = event.kind() {
                        match event.value() {
                            1 => {
                                held.insert(key);
                            }
                            0 => {
                                held.remove(&key);
                                already_fired.remove(&key_label(key));
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        let guard = parsed.lock().expect("hotkey map mutex poisoned");
        for (name, hk) in guard.iter() {
            if held.contains(&hk.key)
                && hk.modifiers.iter().all(|m| held.contains(m))
                && !already_fired.contains(name)
            {
                already_fired.insert(name.clone());
                if fired_tx.send(name.clone()).is_err() {
                    return;
                }
            }
        }
        drop(guard);

        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

fn key_label(key: Key) -> String {
    format!("{key:?}")
}

fn find_keyboard_devices() -> Result<Vec<PathBuf>, HotkeyError> {
    let mut keyboards = Vec::new();
    let input_dir = std::fs::read_dir("/dev/input")
        .map_err(|e| HotkeyError::DeviceAccess(format!("/dev/input: {e}")))?;

    for entry in input_dir {
        let entry = entry.map_err(|e| HotkeyError::DeviceAccess(e.to_string()))?;
        let path = entry.path();
        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);
        if !is_event_device {
            continue;
        }
        match Device::open(&path) {
            Ok(device) => {
                let has_keys = device
                    .supported_keys()
                    .map(|keys| {
                        keys.contains(Key::KEY_A)
                            && keys.contains(Key::KEY_Z)
                            && keys.contains(Key::KEY_ENTER)
                    })
                    .unwrap_or(false);
                if has_keys {
                    keyboards.push(path);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(HotkeyError::DeviceAccess(path.display().to_string()));
            }
            Err(_) => {}
        }
    }
    Ok(keyboards)
}

fn parse_key_name(name: &str) -> Result<Key, HotkeyError> {
    let normalized: String = name
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    let key_name = if normalized.starts_with("KEY_") {
        normalized
    } else {
        format!("KEY_{normalized}")
    };

    let key = match key_name.as_str() {
        "KEY_SCROLLLOCK" => Key::KEY_SCROLLLOCK,
        "KEY_PAUSE" => Key::KEY_PAUSE,
        "KEY_CAPSLOCK" => Key::KEY_CAPSLOCK,
        "KEY_NUMLOCK" => Key::KEY_NUMLOCK,
        "KEY_INSERT" => Key::KEY_INSERT,
        "KEY_F1" => Key::KEY_F1,
        "KEY_F2" => Key::KEY_F2,
        "KEY_F3" => Key::KEY_F3,
        "KEY_F4" => Key::KEY_F4,
        "KEY_F5" => Key::KEY_F5,
        "KEY_F6" => Key::KEY_F6,
        "KEY_F7" => Key::KEY_F7,
        "KEY_F8" => Key::KEY_F8,
        "KEY_F9" => Key::KEY_F9,
        "KEY_F10" => Key::KEY_F10,
        "KEY_F11" => Key::KEY_F11,
        "KEY_F12" => Key::KEY_F12,
        "KEY_F13" => Key::KEY_F13,
        "KEY_F14" => Key::KEY_F14,
        "KEY_F15" => Key::KEY_F15,
        "KEY_F16" => Key::KEY_F16,
        "KEY_F17" => Key::KEY_F17,
        "KEY_F18" => Key::KEY_F18,
        "KEY_F19" => Key::KEY_F19,
        "KEY_F20" => Key::KEY_F20,
        "KEY_F21" => Key::KEY_F21,
        "KEY_F22" => Key::KEY_F22,
        "KEY_F23" => Key::KEY_F23,
        "KEY_F24" => Key::KEY_F24,
        "KEY_HOME" => Key::KEY_HOME,
        "KEY_END" => Key::KEY_END,
        "KEY_PAGEUP" => Key::KEY_PAGEUP,
        "KEY_PAGEDOWN" => Key::KEY_PAGEDOWN,
        "KEY_DELETE" => Key::KEY_DELETE,
        "KEY_SPACE" => Key::KEY_SPACE,
        "KEY_ENTER" => Key::KEY_ENTER,
        "KEY_TAB" => Key::KEY_TAB,
        "KEY_BACKSPACE" => Key::KEY_BACKSPACE,
        "KEY_ESC" | "KEY_ESCAPE" => Key::KEY_ESC,
        "KEY_GRAVE" | "KEY_BACKTICK" => Key::KEY_GRAVE,
        "KEY_MUTE" => Key::KEY_MUTE,
        "KEY_VOLUMEDOWN" => Key::KEY_VOLUMEDOWN,
        "KEY_VOLUMEUP" => Key::KEY_VOLUMEUP,
        "KEY_PLAYPAUSE" => Key::KEY_PLAYPAUSE,
        "KEY_NEXTSONG" => Key::KEY_NEXTSONG,
        "KEY_PREVIOUSSONG" => Key::KEY_PREVIOUSSONG,
        _ => {
            return Err(HotkeyError::UnknownKey(format!(
                "{name}. Try: scrolllock, pause, f8-f24, or run 'evtest' to find key names"
            )));
        }
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_name_accepts_common_aliases() {
        assert_eq!(parse_key_name("ScrollLock").unwrap(), Key::KEY_SCROLLLOCK);
        assert_eq!(parse_key_name("f9").unwrap(), Key::KEY_F9);
        assert_eq!(parse_key_name("escape").unwrap(), Key::KEY_ESC);
    }

    #[test]
    fn parse_key_name_rejects_unknown_names() {
        assert!(parse_key_name("not_a_key").is_err());
    }

    #[test]
    fn modifier_keys_cover_both_sides() {
        assert_eq!(
            modifier_keys("ctrl").unwrap(),
            vec![Key::KEY_LEFTCTRL, Key::KEY_RIGHTCTRL]
        );
    }
}
