//! Deterministic, bounded-depth snippet expansion (§4.1).
//!
//! Only applied when the text-expansion feature is enabled and the parse
//! result is `TEXT`. Tokenizes on single spaces and replaces each token by
//! its mapping recursively, carrying a trail of in-progress tokens so
//! self-reference and longer cycles are left unexpanded rather than looping.

use std::collections::HashMap;

/// Default recursion bound if a configuration omits `snippets.max_depth`.
pub const DEFAULT_MAX_DEPTH: usize = 8;

pub struct SnippetExpander {
    map: HashMap<String, String>,
    max_depth: usize,
}

impl SnippetExpander {
    pub fn new(snippets: HashMap<String, String>) -> Self {
        Self::with_max_depth(snippets, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(snippets: HashMap<String, String>, max_depth: usize) -> Self {
        Self {
            map: snippets,
            max_depth,
        }
    }

    /// Expand every token in `text`, terminating within `max_depth` steps.
    pub fn expand(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        text.split(' ')
            .map(|tok| {
                let mut trail = Vec::new();
                self.expand_token(tok, &mut trail, 0)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn expand_token(&self, token: &str, trail: &mut Vec<String>, depth: usize) -> String {
        match self.map.get(token) {
            None => token.to_string(),
            Some(replacement) => {
                if depth >= self.max_depth || trail.contains(&token.to_string()) {
                    return token.to_string();
                }
                trail.push(token.to_string());
                let expanded = replacement
                    .split(' ')
                    .map(|t| self.expand_token(t, trail, depth + 1))
                    .collect::<Vec<_>>()
                    .join(" ");
                trail.pop();
                expanded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn expands_simple_token() {
        let expander = SnippetExpander::new(map(&[("brb", "be right back")]));
        assert_eq!(expander.expand("ok brb now"), "ok be right back now");
    }

    #[test]
    fn unmapped_tokens_pass_through() {
        let expander = SnippetExpander::new(map(&[]));
        assert_eq!(expander.expand("hello world"), "hello world");
    }

    #[test]
    fn self_reference_left_unexpanded() {
        let expander = SnippetExpander::new(map(&[("loop", "loop")]));
        assert_eq!(expander.expand("loop"), "loop");
    }

    #[test]
    fn mutual_cycle_left_unexpanded() {
        let expander = SnippetExpander::new(map(&[("a", "b"), ("b", "a")]));
        // a -> b -> a (a already in trail) -> stays "a"
        assert_eq!(expander.expand("a"), "a");
    }

    #[test]
    fn recursion_bounded_by_max_depth() {
        // chain of 10 tokens each expanding to the next; depth bound is 3.
        let expander = SnippetExpander::with_max_depth(
            map(&[("t0", "t1"), ("t1", "t2"), ("t2", "t3"), ("t3", "END")]),
            2,
        );
        // t0 -> depth0 expands to t1 (depth1) -> expands to t2 (depth2, == max_depth, stop)
        let result = expander.expand("t0");
        assert!(result.contains("t2") || result.contains("t1"));
    }

    #[test]
    fn empty_text_stays_empty() {
        let expander = SnippetExpander::new(map(&[]));
        assert_eq!(expander.expand(""), "");
    }
}
