pub mod channels;
pub mod perf;
pub mod tasks;

pub use channels::{notification_channel, NotificationReceiver, NotificationSender, ShellEvent};
pub use perf::{LatencyTracker, StageTimer};
pub use tasks::{CancelToken, TaskContext, WorkerPool};
