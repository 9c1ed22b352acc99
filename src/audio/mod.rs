//! Audio capture (§6): device discovery, resampling to the canonical rate,
//! and a bounded-queue hand-off to the runtime coordinator's worker thread.

pub mod cpal_capture;
pub mod queue;

pub use cpal_capture::CpalCapture;
pub use queue::AudioFrameQueue;

use std::sync::Arc;

use crate::config::AudioConfig;
use crate::error::AudioError;

/// Contract every audio-capture adapter honors. `start`/`stop` are async to
/// match the daemon's tokio-based lifecycle wiring; the actual frame
/// hand-off to the worker thread runs over the synchronous bounded queue
/// returned by [`AudioCapture::audio_queue`].
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    async fn start(&mut self) -> Result<(), AudioError>;
    async fn stop(&mut self) -> Result<(), AudioError>;
    fn is_running(&self) -> bool;
    fn audio_queue(&self) -> Arc<AudioFrameQueue>;
}

/// Factory function to create the default capture adapter.
pub fn create_capture(config: &AudioConfig) -> Result<Box<dyn AudioCapture>, AudioError> {
    Ok(Box::new(cpal_capture::CpalCapture::new(config)?))
}
