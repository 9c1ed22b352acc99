//! Routing policy (§4.7): decides whether a parsed transcript is allowed to
//! reach the rest of the pipeline given the current lifecycle state. Pure
//! function of `(state, parse_result, resume_by_phrase_enabled)` — no side
//! effects, no locking.

use crate::command::ParseResult;
use crate::state_machine::AppState;

/// Outcome of consulting the routing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    Allow,
    Drop,
}

/// Decide whether `parse_result` is allowed to proceed while the runtime is
/// in `state`. Only `PAUSED` suppresses anything; every other state allows
/// everything through.
pub fn route(
    state: AppState,
    parse_result: &ParseResult,
    resume_by_phrase_enabled: bool,
) -> RoutingDecision {
    if state != AppState::Paused {
        return RoutingDecision::Allow;
    }

    let ParseResult::System { command_id, .. } = parse_result else {
        return RoutingDecision::Drop;
    };

    match command_id.as_str() {
        "voice_key_stop" => RoutingDecision::Allow,
        "resume_voice_key" if resume_by_phrase_enabled => RoutingDecision::Allow,
        _ => RoutingDecision::Drop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(command_id: &str) -> ParseResult {
        ParseResult::System {
            normalized: command_id.replace('_', " "),
            command_id: command_id.to_string(),
        }
    }

    fn text() -> ParseResult {
        ParseResult::Text {
            normalized: "hello".to_string(),
            literal: "hello".to_string(),
        }
    }

    fn command() -> ParseResult {
        ParseResult::Command {
            normalized: "new line".to_string(),
            command_id: "new_line".to_string(),
        }
    }

    #[test]
    fn non_paused_states_always_allow() {
        for state in [
            AppState::Initializing,
            AppState::Standby,
            AppState::Listening,
            AppState::Processing,
            AppState::ShuttingDown,
            AppState::Error,
        ] {
            assert_eq!(route(state, &text(), false), RoutingDecision::Allow);
            assert_eq!(route(state, &command(), false), RoutingDecision::Allow);
        }
    }

    #[test]
    fn paused_drops_dictation_and_commands() {
        assert_eq!(
            route(AppState::Paused, &text(), true),
            RoutingDecision::Drop
        );
        assert_eq!(
            route(AppState::Paused, &command(), true),
            RoutingDecision::Drop
        );
    }

    #[test]
    fn paused_always_allows_stop() {
        assert_eq!(
            route(AppState::Paused, &system("voice_key_stop"), false),
            RoutingDecision::Allow
        );
    }

    #[test]
    fn paused_allows_resume_only_when_channel_enabled() {
        let resume = system("resume_voice_key");
        assert_eq!(
            route(AppState::Paused, &resume, false),
            RoutingDecision::Drop
        );
        assert_eq!(
            route(AppState::Paused, &resume, true),
            RoutingDecision::Allow
        );
    }

    #[test]
    fn paused_drops_other_system_phrases() {
        assert_eq!(
            route(AppState::Paused, &system("pause_voice_key"), true),
            RoutingDecision::Drop
        );
    }
}
