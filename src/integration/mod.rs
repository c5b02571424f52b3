//! Orchestration of the chat, speech and audio services

pub mod config;
pub mod orchestrator;
pub mod trigger;

pub use config::{AppConfig, DispatchConfig, UiConfig};
pub use orchestrator::{
    Assistant, AssistantBuilder, FailedTurnPolicy, VoiceStage, INVALID_INPUT_MESSAGE,
    NO_SPEECH_MESSAGE,
};
pub use trigger::TriggerGate;
