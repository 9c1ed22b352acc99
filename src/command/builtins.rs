//! Built-in command definitions, preserved verbatim from the reference
//! registry: three always-matching `SYSTEM` phrases, a core `COMMAND` set
//! available in every configuration, and a `WINDOW_COMMANDS`-gated set.

use super::{CommandChannel, CommandDefinition, FeatureGate};

/// The three `SYSTEM`-channel special phrases. Matched only on exact
/// equality, never requiring the `command` suffix.
pub fn system_commands() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new("pause_voice_key", "pause voice key", CommandChannel::System),
        CommandDefinition::new(
            "resume_voice_key",
            "resume voice key",
            CommandChannel::System,
        ),
        CommandDefinition::new("voice_key_stop", "voice key stop", CommandChannel::System),
    ]
}

/// The core `COMMAND`-channel set, always available regardless of feature
/// gates.
pub fn core_commands() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new("new_line", "new line", CommandChannel::Command)
            .with_alias("enter"),
        CommandDefinition::new("tab", "tab", CommandChannel::Command),
        CommandDefinition::new("space", "space", CommandChannel::Command),
        CommandDefinition::new("backspace", "backspace", CommandChannel::Command),
        CommandDefinition::new("delete", "delete", CommandChannel::Command),
        CommandDefinition::new("left", "left", CommandChannel::Command),
        CommandDefinition::new("right", "right", CommandChannel::Command),
        CommandDefinition::new("up", "up", CommandChannel::Command),
        CommandDefinition::new("down", "down", CommandChannel::Command),
        CommandDefinition::new("escape", "escape", CommandChannel::Command),
        CommandDefinition::new("control_c", "control c", CommandChannel::Command),
        CommandDefinition::new("control_v", "control v", CommandChannel::Command),
        CommandDefinition::new("control_x", "control x", CommandChannel::Command),
        CommandDefinition::new("control_z", "control z", CommandChannel::Command),
        CommandDefinition::new("control_a", "control a", CommandChannel::Command),
        CommandDefinition::new("control_l", "control l", CommandChannel::Command),
        CommandDefinition::new("capital_hello", "capital hello", CommandChannel::Command),
        CommandDefinition::new("all_caps_hello", "all caps hello", CommandChannel::Command),
    ]
}

/// The `WINDOW_COMMANDS`-gated set.
pub fn window_commands() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new("maximize_window", "maximize window", CommandChannel::Command)
            .with_gate(FeatureGate::WindowCommands),
        CommandDefinition::new("minimize_window", "minimize window", CommandChannel::Command)
            .with_gate(FeatureGate::WindowCommands),
        CommandDefinition::new("close_window", "close window", CommandChannel::Command)
            .with_gate(FeatureGate::WindowCommands),
        CommandDefinition::new("switch_window", "switch window", CommandChannel::Command)
            .with_gate(FeatureGate::WindowCommands),
        CommandDefinition::new("copy_that", "copy that", CommandChannel::Command)
            .with_gate(FeatureGate::WindowCommands),
        CommandDefinition::new("paste_that", "paste that", CommandChannel::Command)
            .with_gate(FeatureGate::WindowCommands),
        CommandDefinition::new("cut_that", "cut that", CommandChannel::Command)
            .with_gate(FeatureGate::WindowCommands),
    ]
}
