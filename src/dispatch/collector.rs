use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

use crate::domain::RequestResult;

use super::ProgressSink;

/// Upper bound on result slots reserved up front.
const MAX_PREALLOCATED_RESULTS: usize = 1 << 16;

/// Sole owner of a run's in-progress result set. Results are kept in the
/// order they arrive, which is completion order, not request id order.
pub struct ResultCollector {
    results: Vec<RequestResult>,
    completed: u64,
    total: u64,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl ResultCollector {
    #[must_use]
    pub fn new(total: u64, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            results: Vec::with_capacity(
                usize::try_from(total)
                    .unwrap_or(MAX_PREALLOCATED_RESULTS)
                    .min(MAX_PREALLOCATED_RESULTS),
            ),
            completed: 0,
            total,
            progress: Some(progress),
        }
    }

    pub fn append(&mut self, result: RequestResult) {
        self.results.push(result);
        self.completed = self.completed.saturating_add(1);
        self.notify_progress();
    }

    /// A sink that panics is dropped; the results it was told about are kept.
    fn notify_progress(&mut self) {
        let Some(progress) = self.progress.as_ref() else {
            return;
        };
        let (completed, total) = (self.completed, self.total);
        if catch_unwind(AssertUnwindSafe(|| progress.on_progress(completed, total))).is_err() {
            error!("Progress reporting panicked; continuing without it.");
            self.progress = None;
        }
    }

    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.completed
    }

    #[must_use]
    pub fn into_results(self) -> Vec<RequestResult> {
        self.results
    }
}

/// Drains `result_rx` until every sender is gone.
pub(super) fn spawn_collector(
    mut result_rx: mpsc::Receiver<RequestResult>,
    total: u64,
    progress: Arc<dyn ProgressSink>,
) -> JoinHandle<Vec<RequestResult>> {
    tokio::spawn(async move {
        let mut collector = ResultCollector::new(total, progress);
        while let Some(result) = result_rx.recv().await {
            collector.append(result);
        }
        collector.into_results()
    })
}
