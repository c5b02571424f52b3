//! Speech services: recognition of captured audio and synthesis of replies

pub mod stt;
pub mod tts;

pub use stt::{
    normalize_transcript, LazyRecognizer, RecognitionBackend, RecognitionConfig,
    RecognizerFactory, RemoteTranscriber, SpeechRecognizer,
};
pub use tts::{SpeechSynthesizer, SynthesisConfig, VolcengineSynthesizer};
