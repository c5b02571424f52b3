//! Scripted services shared by the integration tests

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use deskpal::audio::{AudioCapture, PlaybackSink};
use deskpal::integration::TriggerGate;
use deskpal::llm::{ChatCompletion, ChatRequest};
use deskpal::messages::{Role, Turn};
use deskpal::speech::{SpeechRecognizer, SpeechSynthesizer};
use deskpal::utils::TaskContext;
use deskpal::{DeskpalError, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Replies with the last user turn, optionally after a delay that depends on the text
#[derive(Default)]
pub struct EchoChat {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<Vec<Turn>>>,
    delays: Vec<(String, Duration)>,
}

impl EchoChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delays(delays: &[(&str, Duration)]) -> Arc<Self> {
        Arc::new(Self {
            delays: delays.iter().map(|(t, d)| (t.to_string(), *d)).collect(),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatCompletion for EchoChat {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.messages.to_vec());

        let last = request
            .messages
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.clone())
            .unwrap_or_default();

        if let Some((_, delay)) = self.delays.iter().find(|(t, _)| *t == last) {
            thread::sleep(*delay);
        }
        Ok(last)
    }
}

/// Always fails with a transport error
#[derive(Default)]
pub struct FailingChat {
    pub calls: AtomicUsize,
}

impl ChatCompletion for FailingChat {
    fn complete(&self, _request: &ChatRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DeskpalError::TransportFailure("connection refused".into()))
    }
}

/// Blocks every request until released; reports when a request starts
pub struct GatedChat {
    started_tx: Sender<String>,
    pub started: Receiver<String>,
    release_tx: Sender<()>,
    release_rx: Receiver<()>,
}

impl GatedChat {
    pub fn new() -> Arc<Self> {
        let (started_tx, started) = unbounded();
        let (release_tx, release_rx) = unbounded();
        Arc::new(Self {
            started_tx,
            started,
            release_tx,
            release_rx,
        })
    }

    pub fn release(&self, count: usize) {
        for _ in 0..count {
            let _ = self.release_tx.send(());
        }
    }
}

impl ChatCompletion for GatedChat {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        let text = request
            .messages
            .last()
            .map(|t| t.content.clone())
            .unwrap_or_default();
        let _ = self.started_tx.send(text.clone());
        self.release_rx
            .recv_timeout(Duration::from_secs(10))
            .map_err(|_| DeskpalError::TransportFailure("never released".into()))?;
        Ok(text)
    }
}

/// Returns a fixed transcript
pub struct FixedRecognizer {
    pub transcript: String,
    pub calls: AtomicUsize,
}

impl FixedRecognizer {
    pub fn new(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: transcript.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

impl SpeechRecognizer for FixedRecognizer {
    fn transcribe(&self, _samples: &[f32], _sample_rate: u32, _timeout: Duration) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcript.clone())
    }
}

/// Records the texts it was asked to speak
pub struct StubSynthesizer {
    pub texts: Mutex<Vec<String>>,
    result: std::result::Result<Vec<u8>, DeskpalError>,
}

impl StubSynthesizer {
    pub fn returning(audio: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            texts: Mutex::new(Vec::new()),
            result: Ok(audio.to_vec()),
        })
    }

    pub fn failing(error: DeskpalError) -> Arc<Self> {
        Arc::new(Self {
            texts: Mutex::new(Vec::new()),
            result: Err(error),
        })
    }
}

impl SpeechSynthesizer for StubSynthesizer {
    fn synthesize(&self, text: &str, _timeout: Duration) -> Result<Vec<u8>> {
        self.texts.lock().push(text.to_string());
        self.result.clone()
    }
}

/// Returns silence immediately
#[derive(Default)]
pub struct SilentCapture {
    pub calls: AtomicUsize,
}

impl AudioCapture for SilentCapture {
    fn record(&self, duration: Duration, sample_rate: u32, ctx: &TaskContext) -> Result<Vec<f32>> {
        ctx.checkpoint()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0.0; (duration.as_secs_f32() * sample_rate as f32) as usize])
    }
}

/// Remembers which files it played
#[derive(Default)]
pub struct RecordingPlayback {
    pub played: Mutex<Vec<PathBuf>>,
}

impl PlaybackSink for RecordingPlayback {
    fn play_file(&self, path: &Path, _ctx: &TaskContext) -> Result<()> {
        self.played.lock().push(path.to_path_buf());
        Ok(())
    }
}

/// Keep pressing the talk key until a waiter takes it
pub fn press_when_waiting(gate: Arc<TriggerGate>) -> JoinHandle<bool> {
    thread::spawn(move || {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if gate.fire() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    })
}
