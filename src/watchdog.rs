//! Inactivity watchdog (§4.10): arms when the runtime enters `LISTENING`
//! with its active mode, and fires once the caller-supplied monotonic clock
//! shows no VAD or transcript activity for longer than the mode's timeout.
//! Same caller-supplied-clock idiom as [`crate::wake::WakeWindowController`].

use crate::state_machine::ListeningMode;

/// Which activity source last reset the timer determines nothing about the
/// timeout event itself; this only distinguishes *why* the watchdog fired
/// for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogTimeoutKind {
    VadInactivity,
    TranscriptInactivity,
}

/// A single watchdog timeout event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchdogTimeout {
    pub kind: WatchdogTimeoutKind,
    pub occurred_at: f64,
}

/// Telemetry snapshot: total timeouts fired, broken down by which activity
/// kind was being watched for when the mode most recently disarmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogCounters {
    pub vad_timeouts: u64,
    pub transcript_timeouts: u64,
}

/// Mode-aware inactivity timer. `timeout_for` maps a [`ListeningMode`] to its
/// configured inactivity timeout in seconds.
pub struct Watchdog<F> {
    timeout_for: F,
    armed: Option<(ListeningMode, f64)>,
    last_kind: WatchdogTimeoutKind,
    counters: WatchdogCounters,
}

impl<F> Watchdog<F>
where
    F: Fn(ListeningMode) -> f64,
{
    pub fn new(timeout_for: F) -> Self {
        Self {
            timeout_for,
            armed: None,
            last_kind: WatchdogTimeoutKind::VadInactivity,
            counters: WatchdogCounters::default(),
        }
    }

    /// Arm on entering `LISTENING`, resetting the activity clock to `now`.
    /// The watchdog watches for VAD inactivity until a transcript event
    /// arrives first.
    pub fn arm(&mut self, mode: ListeningMode, now: f64) {
        self.armed = Some((mode, now));
        self.last_kind = WatchdogTimeoutKind::VadInactivity;
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Bump the activity clock, a no-op while disarmed.
    pub fn on_vad_activity(&mut self, now: f64) {
        if let Some((_, last)) = self.armed.as_mut() {
            *last = now;
            self.last_kind = WatchdogTimeoutKind::VadInactivity;
        }
    }

    /// Bump the activity clock, a no-op while disarmed.
    pub fn on_transcript_activity(&mut self, now: f64) {
        if let Some((_, last)) = self.armed.as_mut() {
            *last = now;
            self.last_kind = WatchdogTimeoutKind::TranscriptInactivity;
        }
    }

    /// `None` while disarmed. Otherwise, if `now - last_activity_at` has
    /// reached the mode's timeout, disarms, bumps the matching counter, and
    /// returns the timeout event. The reported kind matches whichever
    /// activity source last reset the clock.
    pub fn poll_timeout(&mut self, now: f64) -> Option<WatchdogTimeout> {
        let (mode, last) = self.armed?;
        if now - last < (self.timeout_for)(mode) {
            return None;
        }
        self.armed = None;
        match self.last_kind {
            WatchdogTimeoutKind::VadInactivity => self.counters.vad_timeouts += 1,
            WatchdogTimeoutKind::TranscriptInactivity => self.counters.transcript_timeouts += 1,
        }
        Some(WatchdogTimeout {
            kind: self.last_kind,
            occurred_at: now,
        })
    }

    pub fn counters(&self) -> WatchdogCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_timeout(_: ListeningMode) -> f64 {
        10.0
    }

    #[test]
    fn disarmed_watchdog_never_times_out() {
        let mut watchdog = Watchdog::new(fixed_timeout);
        assert_eq!(watchdog.poll_timeout(1000.0), None);
    }

    #[test]
    fn arms_and_times_out_after_inactivity() {
        let mut watchdog = Watchdog::new(fixed_timeout);
        watchdog.arm(ListeningMode::Toggle, 0.0);
        assert_eq!(watchdog.poll_timeout(9.9), None);
        let timeout = watchdog.poll_timeout(10.0).unwrap();
        assert_eq!(timeout.occurred_at, 10.0);
        assert!(!watchdog.is_armed());
        assert_eq!(watchdog.counters().vad_timeouts, 1);
    }

    #[test]
    fn activity_resets_the_clock() {
        let mut watchdog = Watchdog::new(fixed_timeout);
        watchdog.arm(ListeningMode::Continuous, 0.0);
        watchdog.on_vad_activity(5.0);
        assert_eq!(watchdog.poll_timeout(14.9), None);
        assert!(watchdog.poll_timeout(15.0).is_some());
    }

    #[test]
    fn rearming_resets_disarmed_state() {
        let mut watchdog = Watchdog::new(fixed_timeout);
        watchdog.arm(ListeningMode::WakeWord, 0.0);
        watchdog.poll_timeout(10.0);
        assert!(!watchdog.is_armed());
        watchdog.arm(ListeningMode::WakeWord, 20.0);
        assert!(watchdog.is_armed());
        assert_eq!(watchdog.poll_timeout(29.9), None);
    }
}
