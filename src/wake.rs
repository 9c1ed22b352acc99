//! Wake-phrase detector and wake-window controller (§4.2).

use crate::normalize::normalize;

/// Substring-matches a configured wake phrase against normalized transcripts.
pub struct WakeDetector {
    normalized_phrase: String,
}

impl WakeDetector {
    /// Construct a detector; the phrase must be non-empty after
    /// normalization.
    pub fn new(phrase: &str) -> Result<Self, String> {
        let normalized_phrase = normalize(phrase);
        if normalized_phrase.is_empty() {
            return Err("wake phrase must not be empty".to_string());
        }
        Ok(Self { normalized_phrase })
    }

    /// Returns `(matched, normalized_transcript)`.
    pub fn detect(&self, transcript: &str) -> (bool, String) {
        let normalized = normalize(transcript);
        let matched = normalized.contains(&self.normalized_phrase);
        (matched, normalized)
    }
}

/// A time-limited listening window, identified by a monotonic clock the
/// caller supplies (seconds since an arbitrary epoch).
pub struct WakeWindowController {
    timeout_seconds: f64,
    opened_at: Option<f64>,
    last_activity_at: Option<f64>,
}

impl WakeWindowController {
    pub fn new(timeout_seconds: f64) -> Self {
        Self {
            timeout_seconds,
            opened_at: None,
            last_activity_at: None,
        }
    }

    pub fn open_window(&mut self, now: f64) {
        self.opened_at = Some(now);
        self.last_activity_at = Some(now);
    }

    /// Advance `last_activity_at` to `now`, only if the window is open.
    pub fn on_activity(&mut self, now: f64) {
        if self.is_open(now) {
            self.last_activity_at = Some(now);
        }
    }

    /// A window opened at `t0` with timeout `τ` is open for any `now` with
    /// `now - last_activity_at <= τ` (inclusive at the boundary — at
    /// `now == t0 + τ` the window is still open; the first poll strictly
    /// past the boundary closes it).
    pub fn is_open(&self, now: f64) -> bool {
        match self.last_activity_at {
            Some(last) => now - last <= self.timeout_seconds,
            None => false,
        }
    }

    /// Close the window and report whether it was open and has now expired.
    pub fn poll_timeout(&mut self, now: f64) -> bool {
        let expired = self.opened_at.is_some() && !self.is_open(now);
        if expired {
            self.close();
        }
        expired
    }

    pub fn close(&mut self) {
        self.opened_at = None;
        self.last_activity_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_phrase() {
        assert!(WakeDetector::new("   ").is_err());
    }

    #[test]
    fn matches_substring_after_normalization() {
        let detector = WakeDetector::new("voice key").unwrap();
        let (matched, normalized) = detector.detect("Please VOICE  KEY start listening");
        assert!(matched);
        assert_eq!(normalized, "please voice key start listening");
    }

    #[test]
    fn no_match_reports_false() {
        let detector = WakeDetector::new("voice key").unwrap();
        let (matched, _) = detector.detect("hello there");
        assert!(!matched);
    }

    #[test]
    fn window_open_right_at_boundary_then_expired_just_after() {
        // Per spec: at t=5.00s still open; at t=5.01s a single poll_timeout()
        // call returns true and the window is closed.
        let mut window = WakeWindowController::new(5.0);
        window.open_window(0.0);
        assert!(window.is_open(5.00));
        assert!(!window.poll_timeout(5.00));
        assert!(window.poll_timeout(5.01));
        assert!(!window.is_open(5.01));
    }

    #[test]
    fn activity_resets_window_only_while_open() {
        let mut window = WakeWindowController::new(5.0);
        window.open_window(0.0);
        window.on_activity(4.0);
        assert!(window.is_open(8.9));
        assert!(!window.is_open(9.1));
    }

    #[test]
    fn activity_after_close_has_no_effect() {
        let mut window = WakeWindowController::new(5.0);
        window.on_activity(10.0);
        assert!(!window.is_open(10.0));
    }
}
