//! Command registry and parser (§4.1).
//!
//! The registry maps normalized phrases (and aliases) to immutable command
//! definitions, built once at startup and never mutated afterward. The
//! parser turns a raw transcript into a [`ParseResult`] without ever raising
//! on the hot path — only registry construction (phrase collisions, unknown
//! custom-command ids) can fail.

pub mod builtins;
pub mod fuzzy;
pub mod parser;
pub mod snippet;

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::normalize::normalize;
use crate::types::KeyCombo;

pub use parser::{CommandParser, ParseResult, ParserConfig};
pub use snippet::SnippetExpander;

/// Which channel a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandChannel {
    Command,
    System,
}

/// A named switch gating a registered command's availability at lookup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureGate {
    WindowCommands,
    TextExpansion,
}

/// Which feature gates are currently active, resolved from the
/// configuration snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureGates {
    pub window_commands_enabled: bool,
    pub text_expansion_enabled: bool,
}

impl FeatureGates {
    pub fn allows(&self, gate: Option<FeatureGate>) -> bool {
        match gate {
            None => true,
            Some(FeatureGate::WindowCommands) => self.window_commands_enabled,
            Some(FeatureGate::TextExpansion) => self.text_expansion_enabled,
        }
    }
}

/// Immutable record describing one registered command.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    pub command_id: String,
    pub phrase: String,
    pub aliases: Vec<String>,
    pub channel: CommandChannel,
    pub feature_gate: Option<FeatureGate>,
}

impl CommandDefinition {
    pub fn new(command_id: &str, phrase: &str, channel: CommandChannel) -> Self {
        Self {
            command_id: command_id.to_string(),
            phrase: phrase.to_string(),
            aliases: Vec::new(),
            channel,
            feature_gate: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn with_gate(mut self, gate: FeatureGate) -> Self {
        self.feature_gate = Some(gate);
        self
    }

    fn all_phrases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.phrase.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Either a key-combo action or a literal-text action for a custom command.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomAction {
    KeyCombo(KeyCombo),
    Text(String),
}

/// A user-defined command loaded from configuration.
#[derive(Debug, Clone)]
pub struct CustomCommandSpec {
    pub command_id: String,
    pub phrase: String,
    pub aliases: Vec<String>,
    pub action: CustomAction,
}

/// Immutable, collision-checked map of normalized phrase → command.
pub struct CommandRegistry {
    by_phrase: HashMap<String, CommandDefinition>,
    custom_actions: HashMap<String, CustomAction>,
}

impl CommandRegistry {
    /// Build the registry from the built-in set plus `custom_commands`,
    /// rejecting any phrase collision (built-in vs built-in is a
    /// programming bug and asserted against; custom vs built-in or custom
    /// vs custom is a configuration error).
    pub fn build(custom_commands: Vec<CustomCommandSpec>) -> Result<Self, ConfigError> {
        let mut by_phrase: HashMap<String, CommandDefinition> = HashMap::new();
        let mut owner_of: HashMap<String, String> = HashMap::new();

        let mut insert = |def: CommandDefinition,
                           by_phrase: &mut HashMap<String, CommandDefinition>,
                           owner_of: &mut HashMap<String, String>|
         -> Result<(), ConfigError> {
            for phrase in def.all_phrases().map(normalize).collect::<Vec<_>>() {
                if let Some(existing_owner) = owner_of.get(&phrase) {
                    return Err(ConfigError::PhraseCollision {
                        phrase,
                        first: existing_owner.clone(),
                        second: def.command_id.clone(),
                    });
                }
                owner_of.insert(phrase.clone(), def.command_id.clone());
                by_phrase.insert(phrase, def.clone());
            }
            Ok(())
        };

        for def in builtins::system_commands() {
            insert(def, &mut by_phrase, &mut owner_of)?;
        }
        for def in builtins::core_commands() {
            insert(def, &mut by_phrase, &mut owner_of)?;
        }
        for def in builtins::window_commands() {
            insert(def, &mut by_phrase, &mut owner_of)?;
        }

        let mut custom_actions = HashMap::new();
        for custom in custom_commands {
            let def = CommandDefinition {
                command_id: custom.command_id.clone(),
                phrase: custom.phrase.clone(),
                aliases: custom.aliases.clone(),
                channel: CommandChannel::Command,
                feature_gate: None,
            };
            insert(def, &mut by_phrase, &mut owner_of)?;
            custom_actions.insert(custom.command_id.clone(), custom.action);
        }

        Ok(Self {
            by_phrase,
            custom_actions,
        })
    }

    /// Look up a normalized phrase, ignoring feature gates.
    pub fn lookup(&self, normalized_phrase: &str) -> Option<&CommandDefinition> {
        self.by_phrase.get(normalized_phrase)
    }

    /// Look up a normalized phrase, honoring feature gates and channel.
    pub fn lookup_active(
        &self,
        normalized_phrase: &str,
        channel: CommandChannel,
        gates: &FeatureGates,
    ) -> Option<&CommandDefinition> {
        self.lookup(normalized_phrase).filter(|def| {
            std::mem::discriminant(&def.channel) == std::mem::discriminant(&channel)
                && gates.allows(def.feature_gate)
        })
    }

    /// All `COMMAND`-channel phrases (canonical + aliases) currently active
    /// under `gates`, for fuzzy matching. Sorted for deterministic
    /// tie-breaking.
    pub fn active_command_phrases(&self, gates: &FeatureGates) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .by_phrase
            .iter()
            .filter(|(_, def)| {
                matches!(def.channel, CommandChannel::Command) && gates.allows(def.feature_gate)
            })
            .map(|(phrase, def)| (phrase.clone(), def.command_id.clone()))
            .collect();
        out.sort();
        out
    }

    pub fn custom_action(&self, command_id: &str) -> Option<&CustomAction> {
        self.custom_actions.get(command_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_no_internal_collisions() {
        CommandRegistry::build(Vec::new()).expect("builtin set must be collision-free");
    }

    #[test]
    fn custom_command_colliding_with_builtin_is_rejected() {
        let custom = CustomCommandSpec {
            command_id: "my_tab".to_string(),
            phrase: "tab".to_string(),
            aliases: Vec::new(),
            action: CustomAction::Text("x".to_string()),
        };
        let err = CommandRegistry::build(vec![custom]).unwrap_err();
        assert!(matches!(err, ConfigError::PhraseCollision { .. }));
    }

    #[test]
    fn lookup_active_respects_window_commands_gate() {
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let closed = FeatureGates::default();
        let open = FeatureGates {
            window_commands_enabled: true,
            text_expansion_enabled: false,
        };
        assert!(registry
            .lookup_active("maximize window", CommandChannel::Command, &closed)
            .is_none());
        assert!(registry
            .lookup_active("maximize window", CommandChannel::Command, &open)
            .is_some());
    }

    #[test]
    fn alias_resolves_to_same_command() {
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let gates = FeatureGates::default();
        let by_phrase = registry
            .lookup_active("new line", CommandChannel::Command, &gates)
            .unwrap();
        let by_alias = registry
            .lookup_active("enter", CommandChannel::Command, &gates)
            .unwrap();
        assert_eq!(by_phrase.command_id, by_alias.command_id);
    }
}
