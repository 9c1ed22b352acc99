//! Transcript parser: turns a raw transcript into a [`ParseResult`] sum type.
//! No exceptions on the hot path — only registry construction can fail.

use super::{CommandChannel, CommandRegistry, FeatureGates};
use crate::normalize::normalize;

/// Parser output. `literal` is present only when the transcript is to be
/// typed verbatim (after optional snippet expansion).
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    Text { normalized: String, literal: String },
    Command { normalized: String, command_id: String },
    System { normalized: String, command_id: String },
}

impl ParseResult {
    pub fn normalized(&self) -> &str {
        match self {
            ParseResult::Text { normalized, .. } => normalized,
            ParseResult::Command { normalized, .. } => normalized,
            ParseResult::System { normalized, .. } => normalized,
        }
    }
}

/// Tunables for the optional fuzzy-match step; disabled by default.
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    pub fuzzy_enabled: bool,
    /// Threshold in `[0, 1]`; a candidate must *strictly* exceed it.
    pub fuzzy_threshold: f64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            fuzzy_enabled: false,
            fuzzy_threshold: 0.8,
        }
    }
}

pub struct CommandParser<'a> {
    registry: &'a CommandRegistry,
    gates: FeatureGates,
    config: ParserConfig,
}

impl<'a> CommandParser<'a> {
    pub fn new(registry: &'a CommandRegistry, gates: FeatureGates, config: ParserConfig) -> Self {
        Self {
            registry,
            gates,
            config,
        }
    }

    pub fn parse(&self, transcript: &str) -> ParseResult {
        let normalized = normalize(transcript);
        if normalized.is_empty() {
            return ParseResult::Text {
                normalized,
                literal: String::new(),
            };
        }

        if let Some(def) =
            self.registry
                .lookup_active(&normalized, CommandChannel::System, &self.gates)
        {
            return ParseResult::System {
                normalized,
                command_id: def.command_id.clone(),
            };
        }

        if let Some(remainder) = strip_command_suffix(&normalized) {
            if let Some(def) =
                self.registry
                    .lookup_active(&remainder, CommandChannel::Command, &self.gates)
            {
                return ParseResult::Command {
                    normalized,
                    command_id: def.command_id.clone(),
                };
            }
            if self.config.fuzzy_enabled {
                if let Some(command_id) = self.fuzzy_match(&remainder) {
                    return ParseResult::Command {
                        normalized,
                        command_id,
                    };
                }
            }
            return ParseResult::Text {
                literal: normalized.clone(),
                normalized,
            };
        }

        ParseResult::Text {
            literal: normalized.clone(),
            normalized,
        }
    }

    fn fuzzy_match(&self, remainder: &str) -> Option<String> {
        let candidates = self.registry.active_command_phrases(&self.gates);
        let mut best: Option<(f64, String)> = None;
        for (phrase, command_id) in candidates {
            let r = super::fuzzy::ratio(remainder, &phrase);
            if r > self.config.fuzzy_threshold {
                let beats_current = match &best {
                    Some((best_r, _)) => r > *best_r,
                    None => true,
                };
                if beats_current {
                    best = Some((r, command_id));
                }
            }
        }
        best.map(|(_, id)| id)
    }
}

/// Strip a trailing " command" suffix (or a bare "command"), returning the
/// normalized remainder. Returns `None` if the transcript does not end in
/// the suffix at all.
fn strip_command_suffix(normalized: &str) -> Option<String> {
    if normalized == "command" {
        return Some(String::new());
    }
    normalized.strip_suffix(" command").map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandRegistry;

    fn parser(registry: &CommandRegistry) -> CommandParser<'_> {
        CommandParser::new(registry, FeatureGates::default(), ParserConfig::default())
    }

    #[test]
    fn unknown_command_suffix_falls_back_to_literal() {
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let result = parser(&registry).parse("hello world command");
        assert_eq!(
            result,
            ParseResult::Text {
                normalized: "hello world command".to_string(),
                literal: "hello world command".to_string(),
            }
        );
    }

    #[test]
    fn known_command_suffix_resolves_to_command_id() {
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let result = parser(&registry).parse("new line command");
        assert_eq!(
            result,
            ParseResult::Command {
                normalized: "new line command".to_string(),
                command_id: "new_line".to_string(),
            }
        );
    }

    #[test]
    fn system_phrase_matches_without_suffix() {
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let result = parser(&registry).parse("voice key stop");
        assert_eq!(
            result,
            ParseResult::System {
                normalized: "voice key stop".to_string(),
                command_id: "voice_key_stop".to_string(),
            }
        );
    }

    #[test]
    fn plain_text_without_suffix_is_literal() {
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let result = parser(&registry).parse("hello from runtime");
        assert_eq!(
            result,
            ParseResult::Text {
                normalized: "hello from runtime".to_string(),
                literal: "hello from runtime".to_string(),
            }
        );
    }

    #[test]
    fn empty_transcript_is_empty_text() {
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let result = parser(&registry).parse("   ");
        assert_eq!(
            result,
            ParseResult::Text {
                normalized: String::new(),
                literal: String::new(),
            }
        );
    }

    #[test]
    fn normalized_output_always_equals_normalize_of_input() {
        for t in ["Hello World", "  NEW   line   command ", "voice key stop"] {
            let registry = CommandRegistry::build(Vec::new()).unwrap();
            let result = parser(&registry).parse(t);
            assert_eq!(result.normalized(), normalize(t));
        }
    }

    #[test]
    fn fuzzy_match_requires_strictly_greater_than_threshold() {
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let config = ParserConfig {
            fuzzy_enabled: true,
            fuzzy_threshold: super::super::fuzzy::ratio("new lime", "new line"),
        };
        let p = CommandParser::new(&registry, FeatureGates::default(), config);
        // Ratio exactly equal to threshold must not match.
        let result = p.parse("new lime command");
        assert!(matches!(result, ParseResult::Text { .. }));
    }

    #[test]
    fn fuzzy_match_above_threshold_resolves_command() {
        let registry = CommandRegistry::build(Vec::new()).unwrap();
        let config = ParserConfig {
            fuzzy_enabled: true,
            fuzzy_threshold: 0.5,
        };
        let p = CommandParser::new(&registry, FeatureGates::default(), config);
        let result = p.parse("new lime command");
        assert_eq!(
            result,
            ParseResult::Command {
                normalized: "new lime command".to_string(),
                command_id: "new_line".to_string(),
            }
        );
    }
}
