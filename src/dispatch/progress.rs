/// Receives `(completed, total)` after every collected result.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, completed: u64, total: u64);
}

/// Discards progress notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _completed: u64, _total: u64) {}
}
