//! Speech-to-text
//!
//! The orchestrator only sees [`SpeechRecognizer`]. Recognizers can be slow to
//! build (a local Whisper model takes seconds to load), so they sit behind a
//! [`LazyRecognizer`] that constructs one on first use and keeps it.

use crate::audio::encode_wav_bytes;
use crate::llm::client::transport_error;
use crate::{DeskpalError, Result};
use parking_lot::Mutex;
use reqwest::blocking::{multipart, Client};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Turns a mono sample buffer into text
pub trait SpeechRecognizer: Send + Sync {
    fn transcribe(&self, samples: &[f32], sample_rate: u32, timeout: Duration) -> Result<String>;
}

/// Builds a recognizer on demand
pub type RecognizerFactory = Box<dyn Fn() -> Result<Arc<dyn SpeechRecognizer>> + Send + Sync>;

/// Which recognizer implementation to construct
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionBackend {
    /// OpenAI-compatible `/audio/transcriptions` endpoint
    #[default]
    Remote,
    /// Local whisper.cpp model (requires the `whisper` feature)
    Whisper,
}

/// Configuration for speech recognition
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub backend: RecognitionBackend,
    /// Base URL of the transcription API
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Language hint (None for auto-detection)
    pub language: Option<String>,
    pub timeout_secs: u64,
    /// Model file for the local backend
    pub whisper_model_path: PathBuf,
    /// Threads used by the local backend
    pub n_threads: i32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            backend: RecognitionBackend::Remote,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "whisper-1".to_string(),
            language: Some("zh".to_string()),
            timeout_secs: 30,
            whisper_model_path: PathBuf::from("models/ggml-base.bin"),
            n_threads: 4,
        }
    }
}

impl RecognitionConfig {
    pub fn with_backend(mut self, backend: RecognitionBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }

    /// Factory for the configured backend, to be wrapped in a [`LazyRecognizer`]
    pub fn factory(&self) -> RecognizerFactory {
        let config = self.clone();
        Box::new(move || -> Result<Arc<dyn SpeechRecognizer>> {
            match config.backend {
                RecognitionBackend::Remote => Ok(Arc::new(RemoteTranscriber::new(&config)?)),
                #[cfg(feature = "whisper")]
                RecognitionBackend::Whisper => Ok(Arc::new(WhisperRecognizer::new(&config)?)),
                #[cfg(not(feature = "whisper"))]
                RecognitionBackend::Whisper => Err(DeskpalError::ConfigError(
                    "the whisper backend requires the `whisper` feature".into(),
                )),
            }
        })
    }
}

/// Constructs the recognizer on first use and caches it for the process lifetime
///
/// A failed construction is not cached; the next call tries again.
pub struct LazyRecognizer {
    factory: RecognizerFactory,
    instance: Mutex<Option<Arc<dyn SpeechRecognizer>>>,
    loads: AtomicUsize,
}

impl LazyRecognizer {
    pub fn new(factory: RecognizerFactory) -> Self {
        Self {
            factory,
            instance: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Wrap an already constructed recognizer
    pub fn ready(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        let fallback = recognizer.clone();
        Self {
            factory: Box::new(move || Ok(fallback.clone())),
            instance: Mutex::new(Some(recognizer)),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> Result<Arc<dyn SpeechRecognizer>> {
        // Held across construction so concurrent voice flows build it once
        let mut slot = self.instance.lock();
        if let Some(recognizer) = slot.as_ref() {
            return Ok(recognizer.clone());
        }

        info!("Loading speech recognizer");
        let recognizer = (self.factory)()?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        *slot = Some(recognizer.clone());
        Ok(recognizer)
    }

    pub fn is_loaded(&self) -> bool {
        self.instance.lock().is_some()
    }

    /// Number of times the factory produced a recognizer
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

/// Strip every space from a transcript
///
/// Recognizers emit spaces between CJK characters; those are dropped along
/// with surrounding whitespace.
pub fn normalize_transcript(text: &str) -> String {
    text.replace(' ', "").trim().to_string()
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Client for an OpenAI-compatible transcription endpoint
pub struct RemoteTranscriber {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    language: Option<String>,
}

impl RemoteTranscriber {
    pub fn new(config: &RecognitionConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DeskpalError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
        })
    }
}

impl SpeechRecognizer for RemoteTranscriber {
    fn transcribe(&self, samples: &[f32], sample_rate: u32, timeout: Duration) -> Result<String> {
        let wav = encode_wav_bytes(samples, sample_rate)?;
        debug!("Uploading {} bytes of audio for transcription", wav.len());

        let file = multipart::Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|e| DeskpalError::RecognitionError(e.to_string()))?;
        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", file);
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .multipart(form)
            .send()
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!("Transcription request returned HTTP {}", status);
            return Err(DeskpalError::TransportFailure(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        let text = response.text().map_err(|e| transport_error(e, timeout))?;
        parse_transcription(&text)
    }
}

/// Extract the text field of a transcription payload
pub fn parse_transcription(payload: &str) -> Result<String> {
    let response: TranscriptionResponse = serde_json::from_str(payload).map_err(|e| {
        DeskpalError::MalformedResponse(format!("Invalid transcription JSON: {}", e))
    })?;
    Ok(response.text)
}

#[cfg(feature = "whisper")]
pub use local::WhisperRecognizer;

#[cfg(feature = "whisper")]
mod local {
    use super::{RecognitionConfig, SpeechRecognizer};
    use crate::audio::resample_mono;
    use crate::{DeskpalError, Result};
    use std::time::Duration;
    use tracing::{debug, info};
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    const WHISPER_SAMPLE_RATE: u32 = 16000;

    /// Local whisper.cpp recognizer
    pub struct WhisperRecognizer {
        context: WhisperContext,
        language: Option<String>,
        n_threads: i32,
    }

    impl WhisperRecognizer {
        pub fn new(config: &RecognitionConfig) -> Result<Self> {
            info!("Loading Whisper model from: {:?}", config.whisper_model_path);

            if !config.whisper_model_path.exists() {
                return Err(DeskpalError::ConfigError(format!(
                    "Model file not found: {:?}",
                    config.whisper_model_path
                )));
            }

            let path = config
                .whisper_model_path
                .to_str()
                .ok_or_else(|| DeskpalError::ConfigError("Invalid model path".to_string()))?;
            let context =
                WhisperContext::new_with_params(path, WhisperContextParameters::default())
                    .map_err(|e| {
                        DeskpalError::RecognitionError(format!(
                            "Failed to load Whisper model: {:?}",
                            e
                        ))
                    })?;

            Ok(Self {
                context,
                language: config.language.clone(),
                n_threads: config.n_threads,
            })
        }
    }

    impl SpeechRecognizer for WhisperRecognizer {
        fn transcribe(&self, samples: &[f32], sample_rate: u32, _timeout: Duration) -> Result<String> {
            let samples = resample_mono(samples, sample_rate, WHISPER_SAMPLE_RATE)?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_n_threads(self.n_threads);
            params.set_translate(false);
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            if let Some(lang) = &self.language {
                params.set_language(Some(lang.as_str()));
            }

            let mut state = self.context.create_state().map_err(|e| {
                DeskpalError::RecognitionError(format!("Failed to create state: {:?}", e))
            })?;
            state.full(params, &samples).map_err(|e| {
                DeskpalError::RecognitionError(format!("Transcription failed: {:?}", e))
            })?;

            let segments = state.full_n_segments().map_err(|e| {
                DeskpalError::RecognitionError(format!("Failed to get segments: {:?}", e))
            })?;

            let mut text = String::new();
            for i in 0..segments {
                let segment = state.full_get_segment_text(i).map_err(|e| {
                    DeskpalError::RecognitionError(format!("Failed to get segment text: {:?}", e))
                })?;
                text.push_str(&segment);
            }

            debug!("Transcription result: '{}'", text.trim());
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct Fixed(&'static str);

    impl SpeechRecognizer for Fixed {
        fn transcribe(&self, _samples: &[f32], _rate: u32, _timeout: Duration) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_normalize_transcript() {
        assert_eq!(normalize_transcript("  你 好 世界 "), "你好世界");
        assert_eq!(normalize_transcript("   "), "");
        assert_eq!(normalize_transcript("\thello world\n"), "helloworld");
    }

    #[test]
    fn test_lazy_recognizer_builds_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = Arc::new(LazyRecognizer::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(Arc::new(Fixed("hi")) as Arc<dyn SpeechRecognizer>)
        })));
        assert!(!lazy.is_loaded());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lazy = lazy.clone();
                thread::spawn(move || lazy.get().unwrap().transcribe(&[], 16000, Duration::ZERO))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "hi");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.loads(), 1);
        assert!(lazy.is_loaded());
    }

    #[test]
    fn test_lazy_recognizer_retries_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = LazyRecognizer::new(Box::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DeskpalError::ConfigError("model missing".into()))
            } else {
                Ok(Arc::new(Fixed("ok")) as Arc<dyn SpeechRecognizer>)
            }
        }));

        assert!(lazy.get().is_err());
        assert!(!lazy.is_loaded());
        assert!(lazy.get().is_ok());
        assert_eq!(lazy.loads(), 1);
    }

    #[test]
    fn test_parse_transcription() {
        assert_eq!(parse_transcription(r#"{"text":"你 好"}"#).unwrap(), "你 好");
        assert!(matches!(
            parse_transcription("{}"),
            Err(DeskpalError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_config_endpoint() {
        let config = RecognitionConfig::default();
        assert_eq!(config.endpoint(), "https://api.openai.com/v1/audio/transcriptions");
        assert_eq!(config.backend, RecognitionBackend::Remote);
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_whisper_backend_needs_feature() {
        let factory = RecognitionConfig::default()
            .with_backend(RecognitionBackend::Whisper)
            .factory();
        assert!(matches!(factory(), Err(DeskpalError::ConfigError(_))));
    }
}
