//! Bounded single-producer/single-consumer frame queue (§5): the capture
//! callback pushes without blocking, dropping the newest frame and counting
//! the drop when full; the worker thread dequeues with a short timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;
use std::time::Duration;

use crate::types::AudioFrame;

/// Shared bounded queue. Holds both channel halves: `push` is used by the
/// capture thread, `recv_timeout` by the single worker thread.
pub struct AudioFrameQueue {
    sender: SyncSender<AudioFrame>,
    receiver: Mutex<Receiver<AudioFrame>>,
    dropped: AtomicU64,
}

impl AudioFrameQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = sync_channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            dropped: AtomicU64::new(0),
        }
    }

    /// Non-blocking push from the capture callback. Drops the newest frame
    /// and bumps the drop counter if the queue is full; returns whether the
    /// frame was accepted.
    pub fn push(&self, frame: AudioFrame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Bounded-timeout dequeue for the worker thread. `None` on timeout or
    /// disconnection.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<AudioFrame> {
        self.receiver.lock().unwrap().recv_timeout(timeout).ok()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sample: f32) -> AudioFrame {
        AudioFrame::new(vec![sample], 16_000, 0.0)
    }

    #[test]
    fn push_then_recv_round_trips() {
        let queue = AudioFrameQueue::new(4);
        assert!(queue.push(frame(0.1)));
        let received = queue.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(received.samples, vec![0.1]);
    }

    #[test]
    fn full_queue_drops_newest_and_counts() {
        let queue = AudioFrameQueue::new(1);
        assert!(queue.push(frame(0.1)));
        assert!(!queue.push(frame(0.2)));
        assert_eq!(queue.dropped_count(), 1);
        let received = queue.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(received.samples, vec![0.1]);
    }

    #[test]
    fn recv_times_out_on_empty_queue() {
        let queue = AudioFrameQueue::new(4);
        assert!(queue.recv_timeout(Duration::from_millis(10)).is_none());
    }
}
