pub mod files;
#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod resampler;
pub mod wav;

pub use files::AudioFileStore;
#[cfg(feature = "audio-io")]
pub use input::CpalCapture;
#[cfg(feature = "audio-io")]
pub use output::RodioPlayback;
pub use resampler::resample_mono;
pub use wav::{encode_wav_bytes, wav_duration_secs};

use crate::utils::TaskContext;
use crate::{DeskpalError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// True when built with microphone and speaker support
pub const DEVICE_SUPPORT: bool = cfg!(feature = "audio-io");

/// Push-to-talk capture settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Length of every recording in seconds
    pub duration_secs: f32,
    /// Sample rate handed to the recognizer
    pub sample_rate: u32,
    /// How long to wait for the trigger key before giving up
    pub trigger_timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration_secs: 5.0,
            sample_rate: 16000,
            trigger_timeout_secs: 60,
        }
    }
}

impl CaptureConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f32(self.duration_secs)
    }

    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_secs(self.trigger_timeout_secs)
    }
}

/// Records a fixed-length mono buffer from the microphone
pub trait AudioCapture: Send + Sync {
    /// Block for `duration`, returning mono samples at `sample_rate`
    fn record(&self, duration: Duration, sample_rate: u32, ctx: &TaskContext) -> Result<Vec<f32>>;
}

/// Plays an audio file, returning once playback has finished
pub trait PlaybackSink: Send + Sync {
    fn play_file(&self, path: &Path, ctx: &TaskContext) -> Result<()>;
}

/// Stand-in used when the binary is built without audio device support
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDevice;

impl AudioCapture for UnavailableDevice {
    fn record(&self, _duration: Duration, _sample_rate: u32, _ctx: &TaskContext) -> Result<Vec<f32>> {
        Err(DeskpalError::AudioDeviceError(
            "audio capture is not available in this build (enable the `audio-io` feature)".into(),
        ))
    }
}

impl PlaybackSink for UnavailableDevice {
    fn play_file(&self, path: &Path, _ctx: &TaskContext) -> Result<()> {
        Err(DeskpalError::PlaybackFailure(format!(
            "audio playback is not available in this build, reply saved to {}",
            path.display()
        )))
    }
}

/// Capture and playback on the system default devices, or [`UnavailableDevice`]
/// when audio support was compiled out
pub fn default_devices() -> (Arc<dyn AudioCapture>, Arc<dyn PlaybackSink>) {
    #[cfg(feature = "audio-io")]
    {
        (Arc::new(CpalCapture::new()), Arc::new(RodioPlayback::new()))
    }
    #[cfg(not(feature = "audio-io"))]
    {
        (Arc::new(UnavailableDevice), Arc::new(UnavailableDevice))
    }
}
