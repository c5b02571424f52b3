use super::types::{Role, Turn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Bounds applied to the conversation history after every commit
///
/// When a limit is exceeded the oldest exchange (a user turn and the assistant
/// turn answering it) is dropped until the history fits again. The most recent
/// exchange is always kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryPolicy {
    /// Maximum number of turns kept
    pub max_turns: Option<usize>,
    /// Maximum total characters of content kept
    pub max_chars: Option<usize>,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            max_turns: Some(40),
            max_chars: Some(24_000),
        }
    }
}

impl HistoryPolicy {
    /// Keep everything for the process lifetime
    pub fn unbounded() -> Self {
        Self {
            max_turns: None,
            max_chars: None,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }

    fn exceeded_by(&self, turns: &[Turn]) -> bool {
        if let Some(max) = self.max_turns {
            if turns.len() > max {
                return true;
            }
        }
        if let Some(max) = self.max_chars {
            let chars: usize = turns.iter().map(|t| t.content.chars().count()).sum();
            if chars > max {
                return true;
            }
        }
        false
    }
}

/// Thread-safe conversation history shared by concurrent interactions
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Arc<Mutex<Vec<Turn>>>,
    policy: HistoryPolicy,
}

impl ConversationHistory {
    pub fn new(policy: HistoryPolicy) -> Self {
        Self {
            turns: Arc::new(Mutex::new(Vec::new())),
            policy,
        }
    }

    /// Copy of the current turns
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.lock().clone()
    }

    /// Commit a completed exchange as one contiguous user/assistant pair
    pub fn commit_exchange(&self, user: &str, assistant: &str) {
        let mut turns = self.turns.lock();
        turns.push(Turn::user(user));
        turns.push(Turn::assistant(assistant));
        Self::trim(&mut turns, &self.policy);
    }

    /// Record a user turn whose request never produced an answer
    pub fn push_unanswered(&self, user: &str) {
        let mut turns = self.turns.lock();
        turns.push(Turn::user(user));
        Self::trim(&mut turns, &self.policy);
    }

    pub fn clear(&self) {
        self.turns.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.turns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.lock().is_empty()
    }

    fn trim(turns: &mut Vec<Turn>, policy: &HistoryPolicy) {
        let mut dropped = 0;
        while turns.len() > 2 && policy.exceeded_by(turns) {
            let first = turns.remove(0);
            dropped += 1;
            if first.role == Role::User
                && turns.len() > 2
                && turns.first().map(|t| t.role) == Some(Role::Assistant)
            {
                turns.remove(0);
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("Trimmed {} turns from conversation history", dropped);
        }
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(HistoryPolicy::default())
    }
}
