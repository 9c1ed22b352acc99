//! Action router (§4.8): dispatches a resolved command id to a window
//! operation, a built-in keyboard operation, or a custom command action, in
//! that fixed order, tagging the route actually taken. Falls through to
//! `Unhandled` rather than silently coercing between action shapes.

use crate::command::{CommandRegistry, CustomAction};
use crate::error::InjectionError;
use crate::keyboard::{BackendHealth, KeyboardBackend, KeyboardCapabilityReport};
use crate::window::{WindowBackend, WindowCapabilityReport};

/// Which dispatch lane served the command, for structured logging/telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Window,
    Keyboard,
    Custom,
    Unhandled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    pub command_id: String,
    pub route: Route,
}

/// Built-in window dispatch table: command id -> window operation name.
fn window_op(command_id: &str) -> Option<&'static str> {
    match command_id {
        "maximize_window" => Some("maximize_active"),
        "minimize_window" => Some("minimize_active"),
        "close_window" => Some("close_active"),
        "switch_window" => Some("switch_next"),
        _ => None,
    }
}

/// A built-in keyboard action: a single key, a modifier combo, or literal
/// text to type. Preserved verbatim from the reference dispatch table.
enum KeyboardAction {
    Key(&'static str),
    Combo(&'static [&'static str]),
    Text(&'static str),
}

fn keyboard_op(command_id: &str) -> Option<KeyboardAction> {
    use KeyboardAction::*;
    match command_id {
        "new_line" => Some(Key("Enter")),
        "tab" => Some(Key("Tab")),
        "space" => Some(Key("Space")),
        "backspace" => Some(Key("Backspace")),
        "delete" => Some(Key("Delete")),
        "left" => Some(Key("Left")),
        "right" => Some(Key("Right")),
        "up" => Some(Key("Up")),
        "down" => Some(Key("Down")),
        "escape" => Some(Key("Escape")),
        "control_c" | "copy_that" => Some(Combo(&["ctrl", "c"])),
        "control_v" | "paste_that" => Some(Combo(&["ctrl", "v"])),
        "control_x" | "cut_that" => Some(Combo(&["ctrl", "x"])),
        "control_z" => Some(Combo(&["ctrl", "z"])),
        "control_a" => Some(Combo(&["ctrl", "a"])),
        "control_l" => Some(Combo(&["ctrl", "l"])),
        "capital_hello" => Some(Text("Hello")),
        "all_caps_hello" => Some(Text("HELLO")),
        _ => None,
    }
}

/// Owns the keyboard/window backends and the command registry's custom
/// actions, and resolves a command id into one concrete side effect.
pub struct ActionRouter {
    keyboard: Box<dyn KeyboardBackend>,
    window: Option<Box<dyn WindowBackend>>,
}

impl ActionRouter {
    pub fn new(keyboard: Box<dyn KeyboardBackend>, window: Option<Box<dyn WindowBackend>>) -> Self {
        Self { keyboard, window }
    }

    /// Swap the keyboard backend; used by tests exercising the
    /// safety-fallback path against a backend that always fails.
    #[cfg(test)]
    pub fn set_keyboard(&mut self, keyboard: Box<dyn KeyboardBackend>) {
        self.keyboard = keyboard;
    }

    /// Run the §4.14/§4.16 capability self-check on every configured
    /// backend and log the result at a level matching its health, so a
    /// missing `wtype`/`ydotool`/`wmctrl`/`xdotool` is visible at startup
    /// instead of only surfacing on the first failed dispatch.
    pub fn self_check(&mut self) -> (KeyboardCapabilityReport, Option<WindowCapabilityReport>) {
        let keyboard_report = self.keyboard.self_check();
        log_keyboard_health(&keyboard_report);

        let window_report = self.window.as_mut().map(|window| {
            let report = window.self_check();
            log_window_health(&report);
            report
        });

        (keyboard_report, window_report)
    }

    /// Dispatch `command_id`, consulting `registry` for custom actions.
    /// Returns `Ok` with `Route::Unhandled` (never an error) when no lane
    /// claims the id.
    pub fn dispatch(
        &mut self,
        command_id: &str,
        registry: &CommandRegistry,
    ) -> Result<ActionReport, InjectionError> {
        if let Some(op) = window_op(command_id) {
            if let Some(window) = self.window.as_mut() {
                dispatch_window_op(window.as_mut(), op)?;
                return Ok(ActionReport {
                    command_id: command_id.to_string(),
                    route: Route::Window,
                });
            }
        }

        if let Some(action) = keyboard_op(command_id) {
            match action {
                KeyboardAction::Key(key) => self.keyboard.press_key(key)?,
                KeyboardAction::Combo(keys) => {
                    let combo: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                    self.keyboard.press_combo(&combo)?
                }
                KeyboardAction::Text(text) => self.keyboard.type_text(text, 0)?,
            }
            return Ok(ActionReport {
                command_id: command_id.to_string(),
                route: Route::Keyboard,
            });
        }

        if let Some(action) = registry.custom_action(command_id) {
            match action {
                CustomAction::KeyCombo(keys) => self.keyboard.press_combo(keys)?,
                CustomAction::Text(text) => self.keyboard.type_text(text, 0)?,
            }
            return Ok(ActionReport {
                command_id: command_id.to_string(),
                route: Route::Custom,
            });
        }

        Ok(ActionReport {
            command_id: command_id.to_string(),
            route: Route::Unhandled,
        })
    }
}

fn dispatch_window_op(window: &mut dyn WindowBackend, op: &str) -> Result<(), InjectionError> {
    match op {
        "maximize_active" => window.maximize_active(),
        "minimize_active" => window.minimize_active(),
        "close_active" => window.close_active(),
        "switch_next" => window.switch_next(),
        _ => unreachable!("window_op only returns known operation names"),
    }
}

fn log_keyboard_health(report: &KeyboardCapabilityReport) {
    match report.health {
        BackendHealth::Ready => {
            tracing::info!(adapter = report.backend_name, detail = %report.detail, "keyboard backend ready")
        }
        BackendHealth::Degraded => {
            tracing::warn!(adapter = report.backend_name, detail = %report.detail, "keyboard backend degraded")
        }
        BackendHealth::Unavailable => {
            tracing::warn!(adapter = report.backend_name, detail = %report.detail, "keyboard backend unavailable")
        }
    }
}

fn log_window_health(report: &WindowCapabilityReport) {
    match report.health {
        BackendHealth::Ready => {
            tracing::info!(adapter = report.backend_name, detail = %report.detail, "window backend ready")
        }
        BackendHealth::Degraded => {
            tracing::warn!(adapter = report.backend_name, detail = %report.detail, "window backend degraded")
        }
        BackendHealth::Unavailable => {
            tracing::warn!(adapter = report.backend_name, detail = %report.detail, "window backend unavailable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CustomCommandSpec;
    use crate::keyboard::InMemoryKeyboard;
    use crate::window::InMemoryWindow;
    use crate::types::KeyCombo;

    fn router() -> (ActionRouter, CommandRegistry) {
        let custom = CustomCommandSpec {
            command_id: "open_terminal".to_string(),
            phrase: "open terminal".to_string(),
            aliases: Vec::new(),
            action: CustomAction::KeyCombo(vec!["ctrl".to_string(), "shift".to_string(), "t".to_string()] as KeyCombo),
        };
        let registry = CommandRegistry::build(vec![custom]).unwrap();
        let router = ActionRouter::new(
            Box::new(InMemoryKeyboard::default()),
            Some(Box::new(InMemoryWindow::default())),
        );
        (router, registry)
    }

    #[test]
    fn window_command_routes_to_window_backend() {
        let (mut router, registry) = router();
        let report = router.dispatch("maximize_window", &registry).unwrap();
        assert_eq!(report.route, Route::Window);
    }

    #[test]
    fn builtin_keyboard_command_routes_to_keyboard() {
        let (mut router, registry) = router();
        let report = router.dispatch("new_line", &registry).unwrap();
        assert_eq!(report.route, Route::Keyboard);
    }

    #[test]
    fn window_gated_alias_routes_to_keyboard_combo() {
        let (mut router, registry) = router();
        let report = router.dispatch("copy_that", &registry).unwrap();
        assert_eq!(report.route, Route::Keyboard);
    }

    #[test]
    fn custom_command_routes_to_custom_lane() {
        let (mut router, registry) = router();
        let report = router.dispatch("open_terminal", &registry).unwrap();
        assert_eq!(report.route, Route::Custom);
    }

    #[test]
    fn unknown_command_id_is_unhandled_not_an_error() {
        let (mut router, registry) = router();
        let report = router.dispatch("not_a_real_command", &registry).unwrap();
        assert_eq!(report.route, Route::Unhandled);
    }

    #[test]
    fn missing_window_backend_falls_through_to_unhandled() {
        let mut router = ActionRouter::new(Box::new(InMemoryKeyboard::default()), None);
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let report = router.dispatch("maximize_window", &registry).unwrap();
        assert_eq!(report.route, Route::Unhandled);
    }
}
