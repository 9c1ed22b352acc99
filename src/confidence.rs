//! Confidence filter (§4.3). Drops low-confidence final transcripts; interims
//! pass through untouched. The only mutable state is a monotonic drop
//! counter, read and written exclusively on the coordinator thread.

use crate::types::TranscriptEvent;

pub const DEFAULT_THRESHOLD: f32 = 0.5;

pub struct ConfidenceFilter {
    threshold: f32,
    dropped: u64,
}

impl ConfidenceFilter {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            dropped: 0,
        }
    }

    /// Returns `true` if `event` survives the filter. Confidence exactly at
    /// the threshold passes.
    pub fn admit(&mut self, event: &TranscriptEvent) -> bool {
        if !event.is_final {
            return true;
        }
        if event.confidence < self.threshold {
            self.dropped += 1;
            false
        } else {
            true
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interim_always_passes() {
        let mut filter = ConfidenceFilter::new(0.9);
        let event = TranscriptEvent {
            confidence: 0.0,
            ..TranscriptEvent::interim("partial")
        };
        assert!(filter.admit(&event));
        assert_eq!(filter.dropped_count(), 0);
    }

    #[test]
    fn final_below_threshold_is_dropped_and_counted() {
        let mut filter = ConfidenceFilter::new(0.5);
        let event = TranscriptEvent::final_event("hi", 0.49);
        assert!(!filter.admit(&event));
        assert_eq!(filter.dropped_count(), 1);
    }

    #[test]
    fn final_exactly_at_threshold_passes() {
        let mut filter = ConfidenceFilter::new(0.5);
        let event = TranscriptEvent::final_event("hi", 0.5);
        assert!(filter.admit(&event));
        assert_eq!(filter.dropped_count(), 0);
    }

    #[test]
    fn final_above_threshold_passes() {
        let mut filter = ConfidenceFilter::new(0.5);
        let event = TranscriptEvent::final_event("hi", 0.9);
        assert!(filter.admit(&event));
    }
}
