//! Bounded fan-out of request executions and fan-in of their results.
mod collector;
mod progress;

#[cfg(test)]
mod tests;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tracing::{error, info, trace, warn};

use crate::domain::{FailureKind, RequestResult, RunConfig, RunPlan, TestRun};
use crate::error::AppResult;
use crate::http::{HttpExecutor, RequestExecutor};
use crate::shutdown::{ShutdownSender, wait_for_shutdown};

pub use collector::ResultCollector;
pub use progress::{NoopProgress, ProgressSink};

use collector::spawn_collector;

/// Runs `config` to completion and always returns a terminal `TestRun`:
/// `Failed` when the configuration is rejected, `Completed` or `Cancelled`
/// otherwise.
pub async fn run(
    config: RunConfig,
    progress: Arc<dyn ProgressSink>,
    shutdown_tx: &ShutdownSender,
) -> TestRun {
    match Dispatcher::new(config.clone()) {
        Ok(dispatcher) => dispatcher.run(progress, shutdown_tx).await,
        Err(err) => {
            error!("Run rejected before dispatch: {}", err);
            TestRun::failed(config, &err)
        }
    }
}

/// Submits `requests` executions with at most `concurrency` in flight.
pub struct Dispatcher {
    config: RunConfig,
    plan: RunPlan,
    executor: Arc<dyn RequestExecutor>,
}

impl Dispatcher {
    /// Validates `config` and prepares an HTTP executor for it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the settings are invalid or the
    /// HTTP client cannot be built. No request has been sent at that point.
    pub fn new(config: RunConfig) -> AppResult<Self> {
        let plan = config.validate()?;
        let executor = HttpExecutor::new(plan.spec.clone())?;
        Ok(Self {
            config,
            plan,
            executor: Arc::new(executor),
        })
    }

    /// Validates `config` but runs every request through `executor`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the settings are invalid.
    pub fn with_executor(config: RunConfig, executor: Arc<dyn RequestExecutor>) -> AppResult<Self> {
        let plan = config.validate()?;
        Ok(Self {
            config,
            plan,
            executor,
        })
    }

    /// Dispatches the whole run. A stop request, including one raised before
    /// the run started, prevents further submissions; requests already in
    /// flight finish on their own deadlines and their results are kept.
    pub async fn run(&self, progress: Arc<dyn ProgressSink>, shutdown_tx: &ShutdownSender) -> TestRun {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let total = self.plan.requests;
        let delay = self.plan.delay;

        let mut run = TestRun::new(self.config.clone());
        run.begin(self.plan.spec.url.clone());
        info!(
            "Starting run: {} {} ({} requests, concurrency {}, delay {}ms, {} mode)",
            self.plan.spec.method.as_str(),
            self.plan.spec.url,
            total,
            self.plan.concurrency,
            delay.as_millis(),
            self.plan.spec.mode.as_str()
        );

        let started = Instant::now();
        let (result_tx, result_rx) = mpsc::channel(self.plan.concurrency);
        let collector = spawn_collector(result_rx, total, progress);
        let permits = Arc::new(Semaphore::new(self.plan.concurrency));
        let mut in_flight = JoinSet::new();
        let mut submitted: u64 = 0;
        let mut cancelled = false;

        for request_id in 1..=total {
            let permit = tokio::select! {
                biased;
                () = wait_for_shutdown(&mut shutdown_rx) => {
                    warn!("Cancelled after submitting {} of {} requests.", submitted, total);
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(err) => {
                        error!("Concurrency limiter closed: {}", err);
                        break;
                    }
                },
            };

            let executor = Arc::clone(&self.executor);
            let result_tx = result_tx.clone();
            in_flight.spawn(async move {
                let submitted_at = Instant::now();
                let result = AssertUnwindSafe(executor.execute(request_id))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let detail = panic_detail(&*panic);
                        error!("Request {} panicked: {}", request_id, detail);
                        RequestResult::failed(
                            request_id,
                            FailureKind::Unexpected,
                            detail,
                            submitted_at.elapsed(),
                        )
                    });
                drop(permit);
                if result_tx.send(result).await.is_err() {
                    error!("Result collector stopped before request {} reported.", request_id);
                }
            });
            submitted = submitted.saturating_add(1);
            trace!("Submitted request {}/{}", request_id, total);

            if request_id < total && !delay.is_zero() {
                let stopped = tokio::select! {
                    biased;
                    () = wait_for_shutdown(&mut shutdown_rx) => true,
                    () = sleep(delay) => false,
                };
                if stopped {
                    warn!("Cancelled after submitting {} of {} requests.", submitted, total);
                    cancelled = true;
                    break;
                }
            }
        }
        drop(result_tx);

        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                error!("Request task failed: {}", err);
            }
        }
        let results = match collector.await {
            Ok(results) => results,
            Err(err) => {
                error!("Result collector failed: {}", err);
                Vec::new()
            }
        };

        run.finish(results, started.elapsed(), cancelled);
        info!(
            "Run {} after {:.3}s: {} of {} requests collected.",
            run.state.as_str(),
            run.elapsed.as_secs_f64(),
            run.completed_requests(),
            total
        );
        run
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map_or_else(
            || "request task panicked".to_owned(),
            |message| format!("request task panicked: {}", message),
        )
}
