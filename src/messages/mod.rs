pub mod storage;
pub mod types;

pub use storage::{ConversationHistory, HistoryPolicy};
pub use types::{Role, Speaker, TranscriptEntry, Turn};
