use crate::audio::PlaybackSink;
use crate::utils::TaskContext;
use crate::{DeskpalError, Result};
use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Plays audio files on the default output device with rodio
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioPlayback;

impl RodioPlayback {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackSink for RodioPlayback {
    fn play_file(&self, path: &Path, ctx: &TaskContext) -> Result<()> {
        let (_stream, handle) = OutputStream::try_default()
            .map_err(|e| DeskpalError::PlaybackFailure(format!("No output device: {}", e)))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| DeskpalError::PlaybackFailure(format!("Failed to create sink: {}", e)))?;

        let file = File::open(path).map_err(|e| {
            DeskpalError::PlaybackFailure(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| DeskpalError::PlaybackFailure(format!("Failed to decode audio: {}", e)))?;

        sink.append(source);
        info!("Playing {}", path.display());

        while !sink.empty() {
            if ctx.is_cancelled() {
                sink.stop();
                debug!("Playback cancelled");
                return Err(DeskpalError::Cancelled);
            }
            thread::sleep(Duration::from_millis(100));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_playback_failure() {
        let ctx = TaskContext::unbounded();
        let result = RodioPlayback::new().play_file(Path::new("/nonexistent/reply.wav"), &ctx);
        assert!(matches!(result, Err(DeskpalError::PlaybackFailure(_))));
    }
}
