//! cpal-based audio capture.
//!
//! Uses the cpal crate for cross-platform audio input. Works with PipeWire,
//! PulseAudio, and ALSA backends.
//!
//! Note: cpal::Stream is not Send, so capture runs in a dedicated thread and
//! communicates with the rest of the runtime over the bounded
//! [`AudioFrameQueue`], never via an async channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use super::{AudioCapture, AudioFrameQueue};
use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::types::{now_seconds, AudioFrame};

/// Commands sent to the capture thread.
enum CaptureCommand {
    Stop,
}

/// Parameters for building an audio input stream.
struct StreamBuildParams {
    queue: Arc<AudioFrameQueue>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
}

/// cpal-based audio capture implementation.
pub struct CpalCapture {
    config: AudioConfig,
    queue: Arc<AudioFrameQueue>,
    running: Arc<AtomicBool>,
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new(config: &AudioConfig) -> Result<Self, AudioError> {
        Ok(Self {
            config: config.clone(),
            queue: Arc::new(AudioFrameQueue::new(config.queue_capacity)),
            running: Arc::new(AtomicBool::new(false)),
            cmd_tx: None,
            thread_handle: None,
        })
    }
}

/// Find an audio input device by name with flexible matching.
///
/// Matching strategy (in order):
/// 1. Exact match (case-sensitive)
/// 2. Exact match (case-insensitive)
/// 3. Substring match: device name contains the search term (case-insensitive)
///
/// This allows users to specify either full cpal device names, short
/// PipeWire/PulseAudio names, or partial device names.
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?
        .collect();

    let device_names: Vec<String> = devices.iter().filter_map(|d| d.name().ok()).collect();
    let search_lower = device_name.to_lowercase();

    for device in &devices {
        if let Ok(name) = device.name() {
            if name == device_name {
                tracing::debug!("found audio device by exact match: {name}");
                return host
                    .input_devices()
                    .map_err(|e| AudioError::Connection(e.to_string()))?
                    .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
                    .ok_or_else(|| AudioError::DeviceNotFound(device_name.to_string()));
            }
        }
    }

    for device in &devices {
        if let Ok(name) = device.name() {
            if name.to_lowercase() == search_lower {
                tracing::debug!("found audio device by case-insensitive match: {name}");
                let matched_name = name.clone();
                return host
                    .input_devices()
                    .map_err(|e| AudioError::Connection(e.to_string()))?
                    .find(|d| d.name().map(|n| n == matched_name).unwrap_or(false))
                    .ok_or_else(|| AudioError::DeviceNotFound(device_name.to_string()));
            }
        }
    }

    for device in &devices {
        if let Ok(name) = device.name() {
            if name.to_lowercase().contains(&search_lower) {
                tracing::debug!("found audio device by substring match: {name}");
                let matched_name = name.clone();
                return host
                    .input_devices()
                    .map_err(|e| AudioError::Connection(e.to_string()))?
                    .find(|d| d.name().map(|n| n == matched_name).unwrap_or(false))
                    .ok_or_else(|| AudioError::DeviceNotFound(device_name.to_string()));
            }
        }
    }

    let available = if device_names.is_empty() {
        "no audio input devices found".to_string()
    } else {
        format!(
            "available devices:\n{}",
            device_names
                .iter()
                .map(|n| format!("  - {n}"))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    Err(AudioError::DeviceNotFoundWithList {
        requested: device_name.to_string(),
        available,
    })
}

#[async_trait::async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&mut self) -> Result<(), AudioError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();

        let device = match self.config.device_id.as_deref() {
            None | Some("default") => host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))?,
            Some(name) => find_audio_device(&host, name)?,
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(device = %device_name, "starting audio capture");

        let supported_config = device
            .default_input_config()
            .map_err(|e| AudioError::Connection(e.to_string()))?;

        let source_sample_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let target_sample_rate = self.config.sample_rate_hz;
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            source_sample_rate,
            source_channels,
            ?sample_format,
            "device stream config"
        );

        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();
        let queue = self.queue.clone();
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_fn = |err| tracing::error!("audio stream error: {err}");

            let make_params = || StreamBuildParams {
                queue: queue.clone(),
                source_rate: source_sample_rate,
                target_rate: target_sample_rate,
                source_channels,
            };

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => {
                    build_stream::<f32>(&device, &stream_config, make_params(), err_fn)
                }
                cpal::SampleFormat::I16 => {
                    build_stream::<i16>(&device, &stream_config, make_params(), err_fn)
                }
                cpal::SampleFormat::U16 => {
                    build_stream::<u16>(&device, &stream_config, make_params(), err_fn)
                }
                format => {
                    tracing::error!(?format, "unsupported sample format");
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("failed to build audio stream: {e}");
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("failed to start audio stream: {e}");
                running.store(false, Ordering::SeqCst);
                return;
            }

            tracing::debug!("audio capture thread started");

            let _ = cmd_rx.recv();
            drop(stream);
            running.store(false, Ordering::SeqCst);

            tracing::debug!("audio capture thread stopped");
        });

        self.cmd_tx = Some(cmd_tx);
        self.thread_handle = Some(thread_handle);

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            let _ = cmd_tx.send(CaptureCommand::Stop);
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::SeqCst);
        tracing::debug!(
            dropped_frames = self.queue.dropped_count(),
            "audio capture stopped"
        );
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn audio_queue(&self) -> Arc<AudioFrameQueue> {
        self.queue.clone()
    }
}

/// Build an input stream for a specific sample type, pushing resampled mono
/// `AudioFrame`s onto the bounded queue from the cpal callback. The callback
/// never blocks: [`AudioFrameQueue::push`] drops the newest frame on a full
/// queue.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    params: StreamBuildParams,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let StreamBuildParams {
        queue,
        source_rate,
        target_rate,
        source_channels,
    } = params;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels.max(1))
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels.max(1) as f32
                    })
                    .collect();

                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                let frame = AudioFrame::new(resampled, target_rate, now_seconds());
                queue.push(frame);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok(stream)
}

/// Linear interpolation resampling. For higher quality, a production build
/// would reach for `rubato`.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        let result = resample(&samples, 16000, 16000);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let result = resample(&samples, 48000, 16000);
        assert!(result.len() >= 2 && result.len() <= 4);
    }

    #[test]
    fn test_resample_upsample() {
        let samples = vec![1.0, 2.0];
        let result = resample(&samples, 8000, 16000);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_resample_empty() {
        let samples: Vec<f32> = vec![];
        let result = resample(&samples, 48000, 16000);
        assert!(result.is_empty());
    }
}
