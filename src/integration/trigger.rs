//! Push-to-talk gate
//!
//! A voice interaction blocks in [`TriggerGate::wait`] until the user presses
//! the talk key. Presses made while nobody is waiting are dropped so that an
//! old key press cannot start a later recording.

use crate::utils::TaskContext;
use crate::{DeskpalError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct TriggerGate {
    tx: Sender<()>,
    rx: Receiver<()>,
    waiting: AtomicUsize,
}

impl TriggerGate {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            waiting: AtomicUsize::new(0),
        }
    }

    /// Signal a key press; returns false if nobody was waiting for it
    pub fn fire(&self) -> bool {
        if self.waiting.load(Ordering::SeqCst) == 0 {
            debug!("Trigger pressed with no interaction waiting, ignored");
            return false;
        }
        self.tx.send(()).is_ok()
    }

    /// Number of interactions currently blocked on the gate
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Block until a press arrives, the context is cancelled or `timeout` elapses
    pub fn wait(&self, ctx: &TaskContext, timeout: Duration) -> Result<()> {
        while self.rx.try_recv().is_ok() {}

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = WaitingGuard(&self.waiting);

        let started = Instant::now();
        loop {
            ctx.checkpoint()?;

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(DeskpalError::TimedOut(timeout.as_millis() as u64));
            }

            match self.rx.recv_timeout(POLL_INTERVAL.min(timeout - elapsed)) {
                Ok(()) => return self.accept_press(ctx),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DeskpalError::ChannelError("Trigger channel closed".into()))
                }
            }
        }
    }

    /// A press reached this waiter; a cancelled one passes it on only if
    /// another interaction is blocked on the gate
    fn accept_press(&self, ctx: &TaskContext) -> Result<()> {
        if ctx.is_cancelled() {
            if self.waiting() > 1 {
                let _ = self.tx.send(());
            }
            return Err(DeskpalError::Cancelled);
        }
        debug!("Trigger received for interaction {}", ctx.id());
        Ok(())
    }
}

impl Default for TriggerGate {
    fn default() -> Self {
        Self::new()
    }
}

struct WaitingGuard<'a>(&'a AtomicUsize);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn wait_for_waiter(gate: &TriggerGate) {
        let start = Instant::now();
        while gate.waiting() == 0 {
            assert!(start.elapsed() < Duration::from_secs(2), "waiter never registered");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_press_releases_waiter() {
        let gate = Arc::new(TriggerGate::new());
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait(&TaskContext::unbounded(), Duration::from_secs(5)))
        };

        wait_for_waiter(&gate);
        assert!(gate.fire());
        assert!(waiter.join().unwrap().is_ok());
        assert_eq!(gate.waiting(), 0);
    }

    #[test]
    fn test_stale_press_is_ignored() {
        let gate = TriggerGate::new();
        assert!(!gate.fire());

        let result = gate.wait(&TaskContext::unbounded(), Duration::from_millis(120));
        assert!(matches!(result, Err(DeskpalError::TimedOut(120))));
    }

    #[test]
    fn test_cancel_interrupts_wait() {
        let gate = Arc::new(TriggerGate::new());
        let ctx = TaskContext::unbounded();
        let token = ctx.cancel_token().clone();

        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait(&ctx, Duration::from_secs(30)))
        };

        wait_for_waiter(&gate);
        let start = Instant::now();
        token.cancel();
        assert!(matches!(waiter.join().unwrap(), Err(DeskpalError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_cancelled_waiter_drops_press_when_alone() {
        let gate = TriggerGate::new();
        let ctx = TaskContext::unbounded();
        ctx.cancel_token().cancel();

        gate.waiting.fetch_add(1, Ordering::SeqCst);
        assert!(matches!(gate.accept_press(&ctx), Err(DeskpalError::Cancelled)));
        assert!(gate.rx.is_empty());
    }

    #[test]
    fn test_cancelled_waiter_hands_press_on() {
        let gate = TriggerGate::new();
        let ctx = TaskContext::unbounded();
        ctx.cancel_token().cancel();

        gate.waiting.fetch_add(2, Ordering::SeqCst);
        assert!(matches!(gate.accept_press(&ctx), Err(DeskpalError::Cancelled)));
        assert_eq!(gate.rx.len(), 1);
    }

    #[test]
    fn test_task_deadline_bounds_wait() {
        let gate = TriggerGate::new();
        let ctx = TaskContext::new(Some(Duration::from_millis(80)));
        let result = gate.wait(&ctx, Duration::from_secs(30));
        assert!(matches!(result, Err(DeskpalError::TimedOut(80))));
    }
}
