pub mod audio;
pub mod integration;
pub mod llm;
pub mod messages;
pub mod speech;
pub mod ui;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeskpalError {
    #[error("Invalid input")]
    InvalidInput,

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No speech detected")]
    NoSpeechDetected,

    #[error("Playback failure: {0}")]
    PlaybackFailure(String),

    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Recognition error: {0}")]
    RecognitionError(String),

    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Timed out after {0} ms")]
    TimedOut(u64),
}

impl From<std::io::Error> for DeskpalError {
    fn from(e: std::io::Error) -> Self {
        DeskpalError::IOError(e.to_string())
    }
}

impl DeskpalError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            DeskpalError::InvalidInput => true,
            // Network hiccups and bad payloads are worth a manual retry
            DeskpalError::TransportFailure(_) => true,
            DeskpalError::MalformedResponse(_) => true,
            DeskpalError::NoSpeechDetected => true,
            DeskpalError::PlaybackFailure(_) => true,
            // Hardware/device errors may require user intervention
            DeskpalError::AudioDeviceError(_) => false,
            DeskpalError::RecognitionError(_) => true,
            DeskpalError::SynthesisError(_) => true,
            DeskpalError::IOError(_) => false,
            DeskpalError::AudioProcessingError(_) => true,
            DeskpalError::ConfigError(_) => false,
            DeskpalError::ChannelError(_) => false,
            DeskpalError::Cancelled => true,
            DeskpalError::TimedOut(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeskpalError>;
