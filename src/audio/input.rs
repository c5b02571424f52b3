use crate::audio::resampler::resample_mono;
use crate::audio::AudioCapture;
use crate::utils::TaskContext;
use crate::{DeskpalError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{unbounded, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Slack given to the device beyond the requested duration before failing
const DEVICE_GRACE: Duration = Duration::from_secs(2);

/// Microphone capture on the default cpal input device
///
/// The device is opened for each recording and released right after, so the
/// microphone is only held while a voice interaction is recording.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalCapture;

impl CpalCapture {
    pub fn new() -> Self {
        Self
    }
}

impl AudioCapture for CpalCapture {
    fn record(&self, duration: Duration, sample_rate: u32, ctx: &TaskContext) -> Result<Vec<f32>> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DeskpalError::AudioDeviceError("No input device available".into()))?;

        info!(
            "Recording {:.1}s from input device: {}",
            duration.as_secs_f32(),
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config: StreamConfig = device
            .default_input_config()
            .map_err(|e| DeskpalError::AudioDeviceError(format!("Failed to get input config: {}", e)))?
            .into();

        let device_rate = config.sample_rate.0;
        let channels = config.channels as usize;
        let (tx, rx) = unbounded::<Vec<f32>>();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let samples = if channels == 1 {
                        data.to_vec()
                    } else {
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                            .collect()
                    };
                    let _ = tx.send(samples);
                },
                |err| error!("Audio input stream error: {}", err),
                None,
            )
            .map_err(|e| DeskpalError::AudioDeviceError(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| DeskpalError::AudioDeviceError(format!("Failed to start input stream: {}", e)))?;

        let target = (duration.as_secs_f32() * device_rate as f32) as usize;
        let mut captured = Vec::with_capacity(target);
        let started = Instant::now();

        while captured.len() < target {
            ctx.checkpoint()?;
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(chunk) => captured.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => {
                    if started.elapsed() > duration + DEVICE_GRACE {
                        return Err(DeskpalError::AudioDeviceError(
                            "Input device stopped delivering audio".into(),
                        ));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DeskpalError::AudioDeviceError("Input stream closed".into()));
                }
            }
        }
        drop(stream);
        captured.truncate(target);

        debug!(
            "Captured {} samples at {} Hz in {:?}",
            captured.len(),
            device_rate,
            started.elapsed()
        );

        resample_mono(&captured, device_rate, sample_rate)
    }
}
