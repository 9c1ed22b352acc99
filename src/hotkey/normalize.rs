//! Hotkey string normalization and deterministic conflict suggestions.

use crate::error::ConfigError;

const MODIFIER_ORDER: [&str; 4] = ["ctrl", "alt", "shift", "meta"];

fn resolve_modifier_alias(token: &str) -> Option<&'static str> {
    match token {
        "ctrl" | "control" | "ctl" => Some("ctrl"),
        "alt" | "option" | "opt" => Some("alt"),
        "shift" => Some("shift"),
        "meta" | "cmd" | "command" | "super" | "win" | "windows" => Some("meta"),
        _ => None,
    }
}

/// Parse `input` as `modifier+...+key`, fold case, resolve modifier aliases,
/// sort modifiers into the fixed `ctrl, alt, shift, meta` order, and dedup.
/// Returns the canonical string form, e.g. `normalize_hotkey("Control+F9")`
/// → `"ctrl+f9"`.
pub fn normalize_hotkey(input: &str) -> Result<String, ConfigError> {
    let tokens: Vec<String> = input
        .split('+')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(ConfigError::InvalidHotkey(input.to_string()));
    }

    let (modifier_tokens, key_tokens) = tokens.split_at(tokens.len() - 1);
    let key = key_tokens[0].clone();
    if key.is_empty() {
        return Err(ConfigError::InvalidHotkey(input.to_string()));
    }

    let mut modifiers: Vec<&'static str> = Vec::new();
    for token in modifier_tokens {
        let resolved = resolve_modifier_alias(token)
            .ok_or_else(|| ConfigError::InvalidHotkey(input.to_string()))?;
        if !modifiers.contains(&resolved) {
            modifiers.push(resolved);
        }
    }
    modifiers.sort_by_key(|m| MODIFIER_ORDER.iter().position(|o| o == m).unwrap());

    let mut out = modifiers.join("+");
    if !out.is_empty() {
        out.push('+');
    }
    out.push_str(&key);
    Ok(out)
}

/// Up to three deterministic alternatives when `normalized` conflicts with
/// an existing registration: vary the trailing key across `f12..f8` and the
/// modifier set across `(existing modifiers, ctrl+shift, ctrl+alt,
/// alt+shift)`, skipping the original and any duplicate.
pub fn suggest_alternatives(normalized: &str) -> Vec<String> {
    let tokens: Vec<&str> = normalized.split('+').collect();
    let existing_modifiers: Vec<&str> = tokens[..tokens.len() - 1].to_vec();

    let modifier_sets: [Vec<&str>; 4] = [
        existing_modifiers.clone(),
        vec!["ctrl", "shift"],
        vec!["ctrl", "alt"],
        vec!["alt", "shift"],
    ];
    let keys = ["f12", "f11", "f10", "f9", "f8"];

    let mut suggestions = Vec::new();
    'outer: for key in keys {
        for mods in &modifier_sets {
            let candidate = if mods.is_empty() {
                key.to_string()
            } else {
                format!("{}+{}", mods.join("+"), key)
            };
            if candidate == normalized || suggestions.contains(&candidate) {
                continue;
            }
            suggestions.push(candidate);
            if suggestions.len() == 3 {
                break 'outer;
            }
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_alias() {
        assert_eq!(normalize_hotkey("Control+F9").unwrap(), "ctrl+f9");
        assert_eq!(normalize_hotkey("CMD+Space").unwrap(), "meta+space");
    }

    #[test]
    fn sorts_modifiers_into_fixed_order() {
        assert_eq!(normalize_hotkey("shift+ctrl+alt+f1").unwrap(), "ctrl+alt+shift+f1");
    }

    #[test]
    fn dedups_repeated_modifiers() {
        assert_eq!(normalize_hotkey("ctrl+control+f1").unwrap(), "ctrl+f1");
    }

    #[test]
    fn bare_key_with_no_modifiers_is_valid() {
        assert_eq!(normalize_hotkey("ScrollLock").unwrap(), "scrolllock");
    }

    #[test]
    fn unknown_modifier_is_rejected() {
        assert!(normalize_hotkey("frobnicate+f1").is_err());
    }

    #[test]
    fn suggestions_never_include_the_original() {
        let suggestions = suggest_alternatives("ctrl+f9");
        assert!(!suggestions.contains(&"ctrl+f9".to_string()));
        assert_eq!(suggestions.len(), 3);
    }

    #[test]
    fn suggestions_have_no_duplicates() {
        let suggestions = suggest_alternatives("ctrl+shift+f12");
        let unique: std::collections::HashSet<_> = suggestions.iter().collect();
        assert_eq!(unique.len(), suggestions.len());
    }
}
