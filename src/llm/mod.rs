//! Chat completion service
//!
//! The orchestrator talks to the language model through [`ChatCompletion`];
//! [`OpenAiChatClient`] is the HTTP implementation used by the application.

pub mod client;

pub use client::{ChatConfig, OpenAiChatClient};

use crate::messages::Turn;
use crate::Result;
use std::time::Duration;

/// One chat-completion call
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    /// Model identifier understood by the service
    pub model: &'a str,
    /// Ordered turns, oldest first
    pub messages: &'a [Turn],
    /// Upper bound on the whole request
    pub timeout: Duration,
}

/// Produces the assistant reply for a conversation
pub trait ChatCompletion: Send + Sync {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String>;
}
