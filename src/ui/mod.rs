//! Desktop window
//!
//! [`AppState`] is the interaction shell; [`DeskpalApp`] renders it with egui.

pub mod app;
pub mod components;
pub mod state;
pub mod theme;

pub use app::DeskpalApp;
pub use state::{AppState, InteractionKind, BUSY_MESSAGE, VOICE_PROMPT};
pub use theme::Theme;
