//! Bounded background execution for user interactions
//!
//! Every interaction runs as one job on a fixed pool of worker threads. A job
//! carries a [`TaskContext`] with a cancel token and an optional deadline that
//! long-running stages check between steps.

use crate::{DeskpalError, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Cooperative cancellation flag shared between the UI and a job
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cancellation and deadline of one interaction
#[derive(Debug, Clone)]
pub struct TaskContext {
    id: Uuid,
    cancel: CancelToken,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl TaskContext {
    /// Context with a fresh cancel token and an optional overall timeout
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::with_cancel(CancelToken::new(), timeout)
    }

    /// Context without deadline, never cancelled unless asked to
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn with_cancel(cancel: CancelToken, timeout: Option<Duration>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel,
            timeout,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fail if the interaction was cancelled or ran past its deadline
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(DeskpalError::Cancelled);
        }
        if self.remaining() == Some(Duration::ZERO) {
            return Err(self.timed_out());
        }
        Ok(())
    }

    /// Timeout to hand to a blocking call: `limit` capped by the time left
    pub fn budget(&self, limit: Duration) -> Result<Duration> {
        self.checkpoint()?;
        Ok(match self.remaining() {
            Some(remaining) => remaining.min(limit),
            None => limit,
        })
    }

    pub(crate) fn timed_out(&self) -> DeskpalError {
        let ms = self.timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
        DeskpalError::TimedOut(ms)
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads fed by a bounded job queue
pub struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `workers` threads sharing a queue of `queue_capacity` jobs
    pub fn new(workers: usize, queue_capacity: usize) -> Result<Self> {
        if workers == 0 {
            return Err(DeskpalError::ConfigError(
                "Worker pool needs at least one worker".into(),
            ));
        }

        let (job_tx, job_rx) = bounded::<Job>(queue_capacity);
        let active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let job_rx = job_rx.clone();
            let active = Arc::clone(&active);
            let handle = thread::Builder::new()
                .name(format!("deskpal-worker-{}", index))
                .spawn(move || worker_loop(index, job_rx, active))?;
            handles.push(handle);
        }

        info!(
            "Worker pool started: {} workers, queue capacity {}",
            workers, queue_capacity
        );

        Ok(Self {
            job_tx: Some(job_tx),
            workers: handles,
            active,
        })
    }

    /// Queue a job without blocking the caller
    pub fn try_submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| DeskpalError::ChannelError("Worker pool is shut down".into()))?;

        tx.try_send(Box::new(job)).map_err(|e| match e {
            TrySendError::Full(_) => DeskpalError::ChannelError("Job queue is full".into()),
            TrySendError::Disconnected(_) => {
                DeskpalError::ChannelError("Worker pool is shut down".into())
            }
        })
    }

    /// Number of jobs currently running
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs; running jobs finish on their own
    pub fn close(&mut self) {
        if self.job_tx.take().is_some() {
            debug!("Worker pool closed");
        }
    }

    /// Close the queue and wait for running jobs to finish
    pub fn shutdown(&mut self) {
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread panicked during shutdown");
            }
        }
        debug!("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers exit after their current job, they are not joined here
        self.close();
    }
}

fn worker_loop(index: usize, job_rx: Receiver<Job>, active: Arc<AtomicUsize>) {
    debug!("Worker {} started", index);
    while let Ok(job) = job_rx.recv() {
        active.fetch_add(1, Ordering::SeqCst);
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("Job panicked on worker {}", index);
        }
        active.fetch_sub(1, Ordering::SeqCst);
    }
    debug!("Worker {} stopped", index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let ctx = TaskContext::with_cancel(token.clone(), None);
        assert!(ctx.checkpoint().is_ok());

        token.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.checkpoint(), Err(DeskpalError::Cancelled));
    }

    #[test]
    fn test_deadline_expires() {
        let ctx = TaskContext::new(Some(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ctx.checkpoint(), Err(DeskpalError::TimedOut(10)));
    }

    #[test]
    fn test_budget_capped_by_deadline() {
        let ctx = TaskContext::new(Some(Duration::from_secs(1)));
        let budget = ctx.budget(Duration::from_secs(30)).unwrap();
        assert!(budget <= Duration::from_secs(1));

        let ctx = TaskContext::unbounded();
        assert_eq!(ctx.budget(Duration::from_secs(30)).unwrap(), Duration::from_secs(30));
        assert_eq!(ctx.remaining(), None);
    }

    #[test]
    fn test_pool_runs_jobs() {
        let mut pool = WorkerPool::new(2, 8).unwrap();
        let (tx, rx) = unbounded();
        for i in 0..5 {
            let tx = tx.clone();
            pool.try_submit(move || {
                let _ = tx.send(i);
            })
            .unwrap();
        }

        let mut results: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        results.sort();
        assert_eq!(results, vec![0, 1, 2, 3, 4]);

        pool.shutdown();
        assert!(pool.try_submit(|| {}).is_err());
    }

    #[test]
    fn test_pool_rejects_when_full() {
        let pool = WorkerPool::new(1, 1).unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<()>(1);

        pool.try_submit(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        // One slot in the queue, then full
        pool.try_submit(|| {}).unwrap();
        let err = pool.try_submit(|| {}).unwrap_err();
        assert_eq!(err, DeskpalError::ChannelError("Job queue is full".into()));
        assert_eq!(pool.active(), 1);

        drop(release_tx);
    }

    #[test]
    fn test_pool_survives_panicking_job() {
        let pool = WorkerPool::new(1, 4).unwrap();
        let (tx, rx) = unbounded();
        pool.try_submit(|| panic!("boom")).unwrap();
        pool.try_submit(move || {
            let _ = tx.send("still alive");
        })
        .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "still alive");
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(WorkerPool::new(0, 4).is_err());
    }
}
