use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use url::Url;

use super::{RequestResult, RunConfig, serialize_secs};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Created,
    Dispatching,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunState::Created => "created",
            RunState::Dispatching => "dispatching",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::Failed
        )
    }

    /// Failed is only reachable before dispatch begins.
    #[must_use]
    pub const fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Created, RunState::Dispatching | RunState::Failed)
                | (
                    RunState::Dispatching,
                    RunState::Completed | RunState::Cancelled
                )
        )
    }
}

/// One invocation of the dispatcher: its settings, timing, and results in
/// completion order.
#[derive(Debug, Clone, Serialize)]
pub struct TestRun {
    pub config: RunConfig,
    pub target_url: Option<Url>,
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub state: RunState,
    pub failure: Option<String>,
    pub results: Vec<RequestResult>,
}

impl TestRun {
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            target_url: None,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            state: RunState::Created,
            failure: None,
            results: Vec::new(),
        }
    }

    /// A run rejected before any request was sent.
    #[must_use]
    pub fn failed(config: RunConfig, error: &AppError) -> Self {
        let mut run = Self::new(config);
        run.transition(RunState::Failed);
        run.failure = Some(error.to_string());
        run
    }

    pub(crate) fn begin(&mut self, target_url: Url) {
        self.target_url = Some(target_url);
        self.started_at = Utc::now();
        self.transition(RunState::Dispatching);
    }

    /// Cancelled when a stop request cut submissions short, Completed
    /// otherwise.
    pub(crate) fn finish(&mut self, results: Vec<RequestResult>, elapsed: Duration, cancelled: bool) {
        self.results = results;
        self.elapsed = elapsed;
        let next = if cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        self.transition(next);
    }

    fn transition(&mut self, next: RunState) {
        if self.state.can_transition_to(next) {
            self.state = next;
        } else {
            warn!(
                "Ignoring run state change {} -> {}.",
                self.state.as_str(),
                next.as_str()
            );
        }
    }

    #[must_use]
    pub fn completed_requests(&self) -> usize {
        self.results.len()
    }
}
