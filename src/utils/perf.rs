//! Timing helpers for interaction stages
//!
//! Used to log how long each stage of a voice round-trip took and to show the
//! average reply latency in the window header.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tracks reply latencies over a sliding window
#[derive(Debug)]
pub struct LatencyTracker {
    samples: VecDeque<Duration>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(duration);
    }

    pub fn average(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    pub fn last(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(20)
    }
}

/// Stopwatch that records how long each named stage took
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    stage_start: Instant,
    stages: Vec<(&'static str, Duration)>,
}

impl StageTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            stage_start: now,
            stages: Vec::new(),
        }
    }

    /// Close the current stage under `label` and start the next one
    pub fn finish_stage(&mut self, label: &'static str) {
        let now = Instant::now();
        self.stages.push((label, now.duration_since(self.stage_start)));
        self.stage_start = now;
    }

    pub fn stages(&self) -> &[(&'static str, Duration)] {
        &self.stages
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// "capture: 5002ms | recognize: 310ms" style summary
    pub fn summary(&self) -> String {
        self.stages
            .iter()
            .map(|(label, d)| format!("{}: {}ms", label, d.as_millis()))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
