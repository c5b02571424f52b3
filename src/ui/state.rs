//! Interaction shell state
//!
//! Owns the rendered transcript and hands every user action to the worker
//! pool as one job. Results come back through the notification channel and
//! are rendered on the UI thread by [`AppState::poll_events`]. Input is never
//! blocked while jobs are in flight.

use crate::integration::{Assistant, DispatchConfig, UiConfig, VoiceStage};
use crate::messages::{Speaker, TranscriptEntry};
use crate::utils::{
    notification_channel, CancelToken, LatencyTracker, NotificationReceiver, NotificationSender,
    ShellEvent, TaskContext, WorkerPool,
};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shown when a voice interaction starts waiting for the talk key
pub const VOICE_PROMPT: &str = "Press the → key (or Talk) to start speaking…";

/// Shown instead of dispatching when the job queue is full
pub const BUSY_MESSAGE: &str = "Too many requests in flight, please wait.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Text,
    Voice,
}

/// Bookkeeping for a dispatched interaction
#[derive(Debug)]
struct PendingInteraction {
    kind: InteractionKind,
    cancel: CancelToken,
    started: Instant,
    stage: Option<VoiceStage>,
}

pub struct AppState {
    /// Contents of the message input field
    pub input_text: String,
    transcript: Vec<TranscriptEntry>,
    assistant: Arc<Assistant>,
    pool: WorkerPool,
    notifier: NotificationSender,
    events: NotificationReceiver,
    pending: HashMap<Uuid, PendingInteraction>,
    task_timeout: Option<Duration>,
    voice_reply_prefix: String,
    latency: LatencyTracker,
    scroll_to_bottom: bool,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>, dispatch: &DispatchConfig, ui: &UiConfig) -> Result<Self> {
        let pool = WorkerPool::new(dispatch.workers, dispatch.queue_capacity)?;
        let (notifier, events) = notification_channel();

        Ok(Self {
            input_text: String::new(),
            transcript: Vec::new(),
            assistant,
            pool,
            notifier,
            events,
            pending: HashMap::new(),
            task_timeout: dispatch.task_timeout(),
            voice_reply_prefix: ui.voice_reply_prefix.clone(),
            latency: LatencyTracker::default(),
            scroll_to_bottom: false,
        })
    }

    /// Wake the window whenever a job delivers a result
    pub fn with_repaint(mut self, ctx: egui::Context) -> Self {
        self.notifier = self.notifier.clone().with_repaint(ctx);
        self
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn assistant(&self) -> &Arc<Assistant> {
        &self.assistant
    }

    /// Send the contents of the input field as a text interaction
    pub fn submit_text(&mut self) {
        let text = self.input_text.trim().to_string();
        if text.is_empty() {
            return;
        }

        self.render_turn(Speaker::You, &text);
        self.input_text.clear();

        let assistant = Arc::clone(&self.assistant);
        let notifier = self.notifier.clone();
        self.dispatch(InteractionKind::Text, move |ctx| {
            let reply = assistant.convert_text_to_reply(&text, &ctx);
            deliver(&notifier, ctx.id(), reply);
        });
    }

    /// Start a push-to-talk interaction, superseding any earlier one
    pub fn submit_voice(&mut self) {
        self.cancel_kind(InteractionKind::Voice);
        self.render_turn(Speaker::System, VOICE_PROMPT);

        let assistant = Arc::clone(&self.assistant);
        let notifier = self.notifier.clone();
        self.dispatch(InteractionKind::Voice, move |ctx| {
            let id = ctx.id();
            let reply = assistant.convert_speech_to_reply_with_progress(&ctx, |stage| {
                let _ = notifier.send(ShellEvent::Progress {
                    interaction_id: id,
                    stage,
                });
            });
            deliver(&notifier, id, reply);
        });
    }

    /// Release a voice interaction waiting for the talk key
    pub fn press_trigger(&self) -> bool {
        self.assistant.trigger().fire()
    }

    /// Append one entry to the transcript
    pub fn render_turn(&mut self, speaker: Speaker, text: &str) {
        let entry = TranscriptEntry::new(speaker, text);
        debug!("Rendering {}", entry.formatted());
        self.transcript.push(entry);
        self.scroll_to_bottom = true;
    }

    /// Render everything delivered since the last call, returns the number of events handled
    pub fn poll_events(&mut self) -> usize {
        let events = self.events.drain();
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        count
    }

    /// Block until nothing is pending or `timeout` elapses; false on timeout
    pub fn wait_for_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.pending.is_empty() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            if let Some(event) = self.events.recv_timeout(left) {
                self.handle_event(event);
                self.poll_events();
            }
        }
        true
    }

    /// Cancel every pending interaction; their results are discarded
    pub fn cancel_all(&mut self) {
        for (id, pending) in self.pending.drain() {
            debug!("Cancelling interaction {}", id);
            pending.cancel.cancel();
        }
    }

    /// Empty the transcript and the conversation history
    pub fn clear_chat(&mut self) {
        self.transcript.clear();
        self.assistant.clear_history();
    }

    /// Cancel pending work and stop accepting new jobs
    pub fn shutdown(&mut self) {
        self.cancel_all();
        self.pool.close();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Stage of the voice interaction in flight, if any
    pub fn voice_stage(&self) -> Option<VoiceStage> {
        self.pending
            .values()
            .filter(|p| p.kind == InteractionKind::Voice)
            .find_map(|p| p.stage)
    }

    pub fn awaiting_trigger(&self) -> bool {
        self.voice_stage() == Some(VoiceStage::WaitingForTrigger)
    }

    pub fn has_pending(&self, kind: InteractionKind) -> bool {
        self.pending.values().any(|p| p.kind == kind)
    }

    pub fn average_latency(&self) -> Option<Duration> {
        self.latency.average()
    }

    /// Returns true once after the transcript grew
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_bottom)
    }

    fn dispatch(&mut self, kind: InteractionKind, job: impl FnOnce(TaskContext) + Send + 'static) {
        let ctx = TaskContext::new(self.task_timeout);
        let id = ctx.id();
        let cancel = ctx.cancel_token().clone();

        match self.pool.try_submit(move || job(ctx)) {
            Ok(()) => {
                debug!("Dispatched {:?} interaction {}", kind, id);
                self.pending.insert(
                    id,
                    PendingInteraction {
                        kind,
                        cancel,
                        started: Instant::now(),
                        stage: None,
                    },
                );
            }
            Err(e) => {
                warn!("Could not dispatch {:?} interaction: {}", kind, e);
                self.render_turn(Speaker::System, BUSY_MESSAGE);
            }
        }
    }

    fn cancel_kind(&mut self, kind: InteractionKind) {
        let superseded: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|(_, p)| p.kind == kind)
            .map(|(id, _)| *id)
            .collect();
        for id in superseded {
            if let Some(pending) = self.pending.remove(&id) {
                info!("Superseding {:?} interaction {}", kind, id);
                pending.cancel.cancel();
            }
        }
    }

    fn handle_event(&mut self, event: ShellEvent) {
        match event {
            ShellEvent::Completed {
                interaction_id,
                text,
            } => {
                let Some(pending) = self.pending.remove(&interaction_id) else {
                    debug!("Dropping result of cancelled interaction {}", interaction_id);
                    return;
                };
                self.latency.record(pending.started.elapsed());
                let text = match pending.kind {
                    InteractionKind::Text => text,
                    InteractionKind::Voice => format!("{}{}", self.voice_reply_prefix, text),
                };
                self.render_turn(Speaker::Assistant, &text);
            }
            ShellEvent::Progress {
                interaction_id,
                stage,
            } => {
                if let Some(pending) = self.pending.get_mut(&interaction_id) {
                    pending.stage = Some(stage);
                }
            }
        }
    }
}

fn deliver(notifier: &NotificationSender, interaction_id: Uuid, text: String) {
    if let Err(e) = notifier.send(ShellEvent::Completed {
        interaction_id,
        text,
    }) {
        warn!("Reply for {} was not delivered: {}", interaction_id, e);
    }
}
