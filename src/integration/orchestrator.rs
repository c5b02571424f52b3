//! Assistant orchestrator
//!
//! Owns the conversation history and turns user input into reply strings:
//! text goes straight to the chat service, speech runs
//! trigger -> capture -> recognition -> chat -> synthesis -> playback.
//!
//! Nothing escapes as an error. Failures come back as strings meant to be
//! shown to the user.

use super::config::AppConfig;
use super::trigger::TriggerGate;
use crate::audio::{
    wav_duration_secs, AudioCapture, AudioFileStore, CaptureConfig, PlaybackSink, UnavailableDevice,
};
use crate::llm::{ChatCompletion, ChatConfig, ChatRequest};
use crate::messages::{ConversationHistory, HistoryPolicy, Turn};
use crate::speech::{normalize_transcript, LazyRecognizer, SpeechRecognizer, SpeechSynthesizer};
use crate::utils::{StageTimer, TaskContext};
use crate::{DeskpalError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reply for empty or whitespace-only text input
pub const INVALID_INPUT_MESSAGE: &str = "Please provide valid input.";

/// Reply when a recording transcribes to nothing
pub const NO_SPEECH_MESSAGE: &str = "No speech detected.";

const CHAT_ERROR_PREFIX: &str = "API error: ";
const VOICE_ERROR_PREFIX: &str = "Voice interaction error: ";

/// Stages of a voice interaction, reported to the UI as they start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStage {
    WaitingForTrigger,
    Recording,
    Recognizing,
    Thinking,
    Speaking,
}

impl VoiceStage {
    pub fn label(&self) -> &'static str {
        match self {
            VoiceStage::WaitingForTrigger => "waiting for the talk key",
            VoiceStage::Recording => "recording",
            VoiceStage::Recognizing => "recognizing",
            VoiceStage::Thinking => "thinking",
            VoiceStage::Speaking => "speaking",
        }
    }
}

/// What to do with the user turn of a chat request that failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedTurnPolicy {
    /// Leave the history exactly as it was before the request
    #[default]
    Rollback,
    /// Keep the unanswered user turn in the history
    Keep,
}

/// Used for services the builder was not given
struct Unconfigured(&'static str);

impl SpeechRecognizer for Unconfigured {
    fn transcribe(&self, _samples: &[f32], _rate: u32, _timeout: Duration) -> Result<String> {
        Err(DeskpalError::ConfigError(format!("no {} configured", self.0)))
    }
}

impl SpeechSynthesizer for Unconfigured {
    fn synthesize(&self, _text: &str, _timeout: Duration) -> Result<Vec<u8>> {
        Err(DeskpalError::ConfigError(format!("no {} configured", self.0)))
    }
}

/// Builds an [`Assistant`] from already constructed services
pub struct AssistantBuilder {
    chat: Option<Arc<dyn ChatCompletion>>,
    recognizer: Option<LazyRecognizer>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    capture: Option<Arc<dyn AudioCapture>>,
    playback: Option<Arc<dyn PlaybackSink>>,
    files: Option<AudioFileStore>,
    trigger: Option<Arc<TriggerGate>>,
    chat_config: ChatConfig,
    capture_config: CaptureConfig,
    history_policy: HistoryPolicy,
    failed_turn_policy: FailedTurnPolicy,
    recognition_timeout: Duration,
    synthesis_timeout: Duration,
}

impl Default for AssistantBuilder {
    fn default() -> Self {
        Self {
            chat: None,
            recognizer: None,
            synthesizer: None,
            capture: None,
            playback: None,
            files: None,
            trigger: None,
            chat_config: ChatConfig::default(),
            capture_config: CaptureConfig::default(),
            history_policy: HistoryPolicy::default(),
            failed_turn_policy: FailedTurnPolicy::default(),
            recognition_timeout: Duration::from_secs(30),
            synthesis_timeout: Duration::from_secs(30),
        }
    }
}

impl AssistantBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take model, timeouts and policies from the application config
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.chat_config = config.chat.clone();
        self.capture_config = config.capture.clone();
        self.history_policy = config.history;
        self.failed_turn_policy = config.failed_turn_policy;
        self.recognition_timeout = config.recognition.timeout();
        self.synthesis_timeout = config.synthesis.timeout();
        self.files = Some(AudioFileStore::new(
            config.output_dir(),
            config.synthesis.encoding.clone(),
        ));
        self
    }

    pub fn chat(mut self, chat: Arc<dyn ChatCompletion>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn recognizer(mut self, recognizer: LazyRecognizer) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn capture(mut self, capture: Arc<dyn AudioCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn playback(mut self, playback: Arc<dyn PlaybackSink>) -> Self {
        self.playback = Some(playback);
        self
    }

    pub fn files(mut self, files: AudioFileStore) -> Self {
        self.files = Some(files);
        self
    }

    pub fn trigger(mut self, trigger: Arc<TriggerGate>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn chat_config(mut self, config: ChatConfig) -> Self {
        self.chat_config = config;
        self
    }

    pub fn capture_config(mut self, config: CaptureConfig) -> Self {
        self.capture_config = config;
        self
    }

    pub fn history_policy(mut self, policy: HistoryPolicy) -> Self {
        self.history_policy = policy;
        self
    }

    pub fn failed_turn_policy(mut self, policy: FailedTurnPolicy) -> Self {
        self.failed_turn_policy = policy;
        self
    }

    pub fn build(self) -> Result<Assistant> {
        let chat = self
            .chat
            .ok_or_else(|| DeskpalError::ConfigError("a chat completion service is required".into()))?;

        Ok(Assistant {
            chat,
            recognizer: self.recognizer.unwrap_or_else(|| {
                LazyRecognizer::ready(Arc::new(Unconfigured("speech recognizer")))
            }),
            synthesizer: self
                .synthesizer
                .unwrap_or_else(|| Arc::new(Unconfigured("speech synthesizer"))),
            capture: self.capture.unwrap_or_else(|| Arc::new(UnavailableDevice)),
            playback: self.playback.unwrap_or_else(|| Arc::new(UnavailableDevice)),
            files: self.files.unwrap_or_else(|| {
                AudioFileStore::new(std::env::temp_dir().join("deskpal"), "wav")
            }),
            trigger: self.trigger.unwrap_or_default(),
            history: ConversationHistory::new(self.history_policy),
            chat_config: self.chat_config,
            capture_config: self.capture_config,
            failed_turn_policy: self.failed_turn_policy,
            recognition_timeout: self.recognition_timeout,
            synthesis_timeout: self.synthesis_timeout,
        })
    }
}

/// Turns user input into replies, keeping the conversation history
pub struct Assistant {
    chat: Arc<dyn ChatCompletion>,
    recognizer: LazyRecognizer,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    capture: Arc<dyn AudioCapture>,
    playback: Arc<dyn PlaybackSink>,
    files: AudioFileStore,
    trigger: Arc<TriggerGate>,
    history: ConversationHistory,
    chat_config: ChatConfig,
    capture_config: CaptureConfig,
    failed_turn_policy: FailedTurnPolicy,
    recognition_timeout: Duration,
    synthesis_timeout: Duration,
}

impl Assistant {
    pub fn builder() -> AssistantBuilder {
        AssistantBuilder::new()
    }

    /// Reply to typed input
    pub fn convert_text_to_reply(&self, text: &str, ctx: &TaskContext) -> String {
        if text.trim().is_empty() {
            return INVALID_INPUT_MESSAGE.to_string();
        }

        match self.exchange(text, ctx) {
            Ok(reply) => reply,
            Err(e) => chat_error(e),
        }
    }

    /// Record after the talk key, answer, and speak the answer
    pub fn convert_speech_to_reply(&self, ctx: &TaskContext) -> String {
        self.convert_speech_to_reply_with_progress(ctx, |_| {})
    }

    /// Same as [`Self::convert_speech_to_reply`], reporting each stage as it begins
    pub fn convert_speech_to_reply_with_progress(
        &self,
        ctx: &TaskContext,
        progress: impl Fn(VoiceStage),
    ) -> String {
        let mut timer = StageTimer::start();

        let transcript = match self.listen(ctx, &progress, &mut timer) {
            Ok(transcript) => transcript,
            Err(e) => return voice_error(e),
        };
        if transcript.is_empty() {
            info!("Recording contained no speech");
            return NO_SPEECH_MESSAGE.to_string();
        }
        info!("User said: \"{}\"", transcript);

        progress(VoiceStage::Thinking);
        let reply = match self.exchange(&transcript, ctx) {
            Ok(reply) => reply,
            // Not read aloud
            Err(e) => return chat_error(e),
        };
        timer.finish_stage("chat");

        progress(VoiceStage::Speaking);
        if let Err(e) = self.speak(&reply, ctx, &mut timer) {
            return voice_error(e);
        }

        info!("Voice interaction finished: {}", timer.summary());
        reply
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_snapshot(&self) -> Vec<Turn> {
        self.history.snapshot()
    }

    pub fn clear_history(&self) {
        info!("Clearing conversation history");
        self.history.clear();
    }

    /// Gate released by the talk key
    pub fn trigger(&self) -> Arc<TriggerGate> {
        Arc::clone(&self.trigger)
    }

    /// One chat round trip; the history only changes once the outcome is known
    fn exchange(&self, text: &str, ctx: &TaskContext) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.chat_config.system_prompt {
            messages.push(Turn::system(prompt.as_str()));
        }
        messages.extend(self.history.snapshot());
        messages.push(Turn::user(text));

        let outcome = ctx.budget(self.chat_config.timeout()).and_then(|timeout| {
            let request = ChatRequest {
                model: &self.chat_config.model,
                messages: &messages,
                timeout,
            };
            let reply = self.chat.complete(&request)?;
            // A reply nobody will see is not committed
            ctx.checkpoint()?;
            Ok(reply)
        });

        match outcome {
            Ok(reply) => {
                self.history.commit_exchange(text, &reply);
                debug!("History now holds {} turns", self.history.len());
                Ok(reply)
            }
            Err(e) => {
                if self.failed_turn_policy == FailedTurnPolicy::Keep {
                    self.history.push_unanswered(text);
                }
                Err(e)
            }
        }
    }

    fn listen(
        &self,
        ctx: &TaskContext,
        progress: &impl Fn(VoiceStage),
        timer: &mut StageTimer,
    ) -> Result<String> {
        progress(VoiceStage::WaitingForTrigger);
        info!("Waiting for the talk key");
        self.trigger.wait(ctx, self.capture_config.trigger_timeout())?;
        timer.finish_stage("trigger");

        progress(VoiceStage::Recording);
        ctx.checkpoint()?;
        let samples = self.capture.record(
            self.capture_config.duration(),
            self.capture_config.sample_rate,
            ctx,
        )?;
        timer.finish_stage("capture");
        debug!("Captured {} samples", samples.len());

        progress(VoiceStage::Recognizing);
        let recognizer = self.recognizer.get()?;
        let timeout = ctx.budget(self.recognition_timeout)?;
        let raw = recognizer.transcribe(&samples, self.capture_config.sample_rate, timeout)?;
        timer.finish_stage("recognize");

        Ok(normalize_transcript(&raw))
    }

    fn speak(&self, reply: &str, ctx: &TaskContext, timer: &mut StageTimer) -> Result<()> {
        let timeout = ctx.budget(self.synthesis_timeout)?;
        let audio = self.synthesizer.synthesize(reply, timeout)?;
        if audio.is_empty() {
            return Err(DeskpalError::MalformedResponse(
                "synthesis returned no audio".into(),
            ));
        }
        timer.finish_stage("synthesize");
        if let Some(secs) = wav_duration_secs(&audio) {
            debug!("Synthesized {:.1}s of reply audio", secs);
        }

        let path = self.files.write(&audio)?;
        ctx.checkpoint()?;
        self.playback.play_file(&path, ctx)?;
        timer.finish_stage("playback");
        Ok(())
    }
}

fn chat_error(e: DeskpalError) -> String {
    log_failure("Chat request", &e);
    format!("{}{}", CHAT_ERROR_PREFIX, e)
}

fn voice_error(e: DeskpalError) -> String {
    log_failure("Voice interaction", &e);
    format!("{}{}", VOICE_ERROR_PREFIX, e)
}

fn log_failure(what: &str, e: &DeskpalError) {
    if e.is_recoverable() {
        warn!("{} failed: {}", what, e);
    } else {
        error!("{} failed: {}", what, e);
    }
}
