//! Notification channel from background jobs to the UI thread
//!
//! Any number of jobs hold a [`NotificationSender`]; the UI thread owns the
//! single [`NotificationReceiver`] and drains it once per frame. Each event
//! carries one complete string, so a result is always rendered whole.

use crate::integration::orchestrator::VoiceStage;
use crate::{DeskpalError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use uuid::Uuid;

/// Events delivered to the UI thread
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    /// An interaction finished; `text` is the reply or the error description
    Completed {
        interaction_id: Uuid,
        text: String,
    },
    /// A voice interaction reached a new stage
    Progress {
        interaction_id: Uuid,
        stage: VoiceStage,
    },
}

impl ShellEvent {
    pub fn interaction_id(&self) -> Uuid {
        match self {
            ShellEvent::Completed { interaction_id, .. } => *interaction_id,
            ShellEvent::Progress { interaction_id, .. } => *interaction_id,
        }
    }
}

/// Sending half, cloned into every job
#[derive(Clone)]
pub struct NotificationSender {
    tx: Sender<ShellEvent>,
    repaint: Option<egui::Context>,
}

impl NotificationSender {
    /// Wake the given egui context whenever an event is sent
    pub fn with_repaint(mut self, ctx: egui::Context) -> Self {
        self.repaint = Some(ctx);
        self
    }

    pub fn send(&self, event: ShellEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|e| DeskpalError::ChannelError(format!("Failed to deliver result: {}", e)))?;
        if let Some(ctx) = &self.repaint {
            ctx.request_repaint();
        }
        Ok(())
    }
}

/// Receiving half, owned by the UI thread
pub struct NotificationReceiver {
    rx: Receiver<ShellEvent>,
}

impl NotificationReceiver {
    /// Take every event that has arrived so far without blocking
    pub fn drain(&self) -> Vec<ShellEvent> {
        self.rx.try_iter().collect()
    }

    /// Block until the next event or the timeout
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<ShellEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create the channel. Unbounded so a job never waits on a window that is
/// not being repainted.
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = unbounded();
    (NotificationSender { tx, repaint: None }, NotificationReceiver { rx })
}
