use super::*;
use crate::args::HttpMethod;
use crate::domain::{FailureKind, RequestResult, RunState};
use crate::http::test_support::{OK_RESPONSE, refused_url, spawn_server};
use crate::metrics::aggregate;
use crate::shutdown::{request_shutdown, shutdown_channel};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

/// Executor that tracks how many calls overlap.
struct CountingExecutor {
    work: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    started: AtomicUsize,
}

impl CountingExecutor {
    fn new(work: Duration) -> Self {
        Self {
            work,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RequestExecutor for CountingExecutor {
    async fn execute(&self, request_id: u64) -> RequestResult {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        tokio::time::sleep(self.work).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        RequestResult::completed(request_id, 200, self.work, b"ok", None)
    }
}

#[derive(Default)]
struct RecordingProgress {
    seen: Mutex<Vec<(u64, u64)>>,
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&self, completed: u64, total: u64) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((completed, total));
        }
    }
}

fn config_for(target: &str, requests: u64, concurrency: usize) -> RunConfig {
    let mut config = RunConfig::new(target);
    config.requests = requests;
    config.concurrency = concurrency;
    config
}

fn ids_of(results: &[RequestResult]) -> BTreeSet<u64> {
    results.iter().map(|result| result.request_id).collect()
}

#[test]
fn completed_run_has_every_request_id() -> Result<(), String> {
    run_async_test(async {
        for (requests, concurrency) in [(1, 1), (7, 3), (25, 4), (40, 40), (12, 100)] {
            let executor = Arc::new(CountingExecutor::new(Duration::from_millis(5)));
            let dispatcher = Dispatcher::with_executor(
                config_for("http://127.0.0.1:9", requests, concurrency),
                executor,
            )
            .map_err(|err| err.to_string())?;
            let (shutdown_tx, _shutdown_rx) = shutdown_channel();

            let run = dispatcher.run(Arc::new(NoopProgress), &shutdown_tx).await;
            if run.state != RunState::Completed {
                return Err(format!("N={} W={}: state {:?}", requests, concurrency, run.state));
            }
            let expected: BTreeSet<u64> = (1..=requests).collect();
            if ids_of(&run.results) != expected || run.results.len() != expected.len() {
                return Err(format!("N={} W={}: wrong id set", requests, concurrency));
            }
        }
        Ok(())
    })
}

#[test]
fn concurrency_bound_is_never_exceeded() -> Result<(), String> {
    run_async_test(async {
        let executor = Arc::new(CountingExecutor::new(Duration::from_millis(30)));
        let dispatcher = Dispatcher::with_executor(
            config_for("http://127.0.0.1:9", 15, 3),
            Arc::clone(&executor) as Arc<dyn RequestExecutor>,
        )
        .map_err(|err| err.to_string())?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();

        let run = dispatcher.run(Arc::new(NoopProgress), &shutdown_tx).await;
        let max_active = executor.max_active.load(Ordering::SeqCst);
        if max_active > 3 {
            return Err(format!("Saw {} concurrent executions", max_active));
        }
        if max_active < 2 {
            return Err(format!("Expected overlapping executions, saw {}", max_active));
        }
        if run.results.len() != 15 {
            return Err(format!("Expected 15 results, got {}", run.results.len()));
        }
        Ok(())
    })
}

#[test]
fn healthy_endpoint_reports_full_success() -> Result<(), String> {
    run_async_test(async {
        let server = spawn_server(OK_RESPONSE, Duration::ZERO).await?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();

        let run = run(
            config_for(&server.url, 10, 5),
            Arc::new(NoopProgress),
            &shutdown_tx,
        )
        .await;
        if run.state != RunState::Completed {
            return Err(format!("Unexpected state: {:?} {:?}", run.state, run.failure));
        }
        let summary = aggregate(&run);
        if summary.total != 10 || (summary.success_rate - 100.0).abs() > 1e-9 {
            return Err(format!("Unexpected summary: {:?}", summary));
        }
        let statuses: Vec<(u16, u64)> = summary.status_codes.into_iter().collect();
        if statuses != vec![(200, 10)] {
            return Err(format!("Unexpected statuses: {:?}", statuses));
        }
        Ok(())
    })
}

#[test]
fn refused_connections_are_classified() -> Result<(), String> {
    run_async_test(async {
        let url = refused_url().await?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();

        let run = run(config_for(&url, 5, 5), Arc::new(NoopProgress), &shutdown_tx).await;
        if run.state != RunState::Completed {
            return Err(format!("Unexpected state: {:?}", run.state));
        }
        let summary = aggregate(&run);
        if summary.total != 5 || summary.success_rate.abs() > f64::EPSILON {
            return Err(format!("Unexpected summary: {:?}", summary));
        }
        if summary.status_codes.get(&0) != Some(&5) {
            return Err(format!("Expected five status-0 results: {:?}", summary.status_codes));
        }
        if summary.errors.get(FailureKind::ConnectionError.as_str()) != Some(&5) {
            return Err(format!("Unexpected errors: {:?}", summary.errors));
        }
        Ok(())
    })
}

#[test]
fn invalid_payload_fails_before_dispatch() -> Result<(), String> {
    run_async_test(async {
        let url = refused_url().await?;
        let mut config = config_for(&url, 5, 2);
        config.method = HttpMethod::Post;
        config.payload = Some("{\"name\": ".to_owned());
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();

        let run = run(config, Arc::new(NoopProgress), &shutdown_tx).await;
        if run.state != RunState::Failed {
            return Err(format!("Expected failed run, got {:?}", run.state));
        }
        if !run.results.is_empty() || run.target_url.is_some() {
            return Err("Failed run must not dispatch".to_owned());
        }
        if run.failure.is_none() {
            return Err("Expected failure message".to_owned());
        }
        Ok(())
    })
}

#[test]
fn delay_spaces_out_submissions() -> Result<(), String> {
    run_async_test(async {
        let executor = Arc::new(CountingExecutor::new(Duration::from_millis(1)));
        let mut config = config_for("http://127.0.0.1:9", 20, 4);
        config.delay_ms = 50;
        let dispatcher =
            Dispatcher::with_executor(config, executor).map_err(|err| err.to_string())?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();

        let run = dispatcher.run(Arc::new(NoopProgress), &shutdown_tx).await;
        if run.results.len() != 20 {
            return Err(format!("Expected 20 results, got {}", run.results.len()));
        }
        if run.elapsed < Duration::from_millis(950) {
            return Err(format!("Run finished too quickly: {:?}", run.elapsed));
        }
        Ok(())
    })
}

#[test]
fn shutdown_stops_submissions_and_keeps_results() -> Result<(), String> {
    run_async_test(async {
        let executor = Arc::new(CountingExecutor::new(Duration::from_millis(100)));
        let dispatcher = Dispatcher::with_executor(
            config_for("http://127.0.0.1:9", 50, 2),
            Arc::clone(&executor) as Arc<dyn RequestExecutor>,
        )
        .map_err(|err| err.to_string())?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();
        let signal_tx = shutdown_tx.clone();
        let signal = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            request_shutdown(&signal_tx);
        });

        let run = dispatcher.run(Arc::new(NoopProgress), &shutdown_tx).await;
        signal.await.map_err(|err| err.to_string())?;

        if run.state != RunState::Cancelled {
            return Err(format!("Expected cancelled run, got {:?}", run.state));
        }
        let started = executor.started.load(Ordering::SeqCst);
        if run.results.is_empty() || run.results.len() >= 50 {
            return Err(format!("Unexpected result count {}", run.results.len()));
        }
        if run.results.len() != started {
            return Err(format!(
                "Lost in-flight results: started {}, kept {}",
                started,
                run.results.len()
            ));
        }
        if ids_of(&run.results).len() != run.results.len() {
            return Err("Duplicate request ids".to_owned());
        }
        Ok(())
    })
}

#[test]
fn shutdown_during_delay_stops_submissions() -> Result<(), String> {
    run_async_test(async {
        let executor = Arc::new(CountingExecutor::new(Duration::from_millis(5)));
        let mut config = config_for("http://127.0.0.1:9", 10, 5);
        config.delay_ms = 200;
        let dispatcher = Dispatcher::with_executor(
            config,
            Arc::clone(&executor) as Arc<dyn RequestExecutor>,
        )
        .map_err(|err| err.to_string())?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();
        let signal_tx = shutdown_tx.clone();
        let signal = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            request_shutdown(&signal_tx);
        });

        let run = dispatcher.run(Arc::new(NoopProgress), &shutdown_tx).await;
        signal.await.map_err(|err| err.to_string())?;

        if run.state != RunState::Cancelled {
            return Err(format!("Expected cancelled run, got {:?}", run.state));
        }
        if run.results.len() != 2 || executor.started.load(Ordering::SeqCst) != 2 {
            return Err(format!("Expected two submissions, got {}", run.results.len()));
        }
        if run.elapsed >= Duration::from_millis(390) {
            return Err(format!("Delay was not interrupted: {:?}", run.elapsed));
        }
        Ok(())
    })
}

#[test]
fn shutdown_raised_before_run_submits_nothing() -> Result<(), String> {
    run_async_test(async {
        let executor = Arc::new(CountingExecutor::new(Duration::from_millis(5)));
        let dispatcher = Dispatcher::with_executor(
            config_for("http://127.0.0.1:9", 5, 2),
            Arc::clone(&executor) as Arc<dyn RequestExecutor>,
        )
        .map_err(|err| err.to_string())?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();
        request_shutdown(&shutdown_tx);

        let run = dispatcher.run(Arc::new(NoopProgress), &shutdown_tx).await;
        if run.state != RunState::Cancelled || !run.results.is_empty() {
            return Err(format!("Unexpected run: {:?}, {}", run.state, run.results.len()));
        }
        if executor.started.load(Ordering::SeqCst) != 0 {
            return Err("Executor was called after shutdown".to_owned());
        }
        Ok(())
    })
}

#[test]
fn shutdown_after_last_submission_completes_run() -> Result<(), String> {
    run_async_test(async {
        let executor = Arc::new(CountingExecutor::new(Duration::from_millis(200)));
        let dispatcher = Dispatcher::with_executor(config_for("http://127.0.0.1:9", 2, 2), executor)
            .map_err(|err| err.to_string())?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();
        let signal_tx = shutdown_tx.clone();
        let signal = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            request_shutdown(&signal_tx);
        });

        let run = dispatcher.run(Arc::new(NoopProgress), &shutdown_tx).await;
        signal.await.map_err(|err| err.to_string())?;
        if run.state != RunState::Completed || run.results.len() != 2 {
            return Err(format!("Unexpected run: {:?}, {}", run.state, run.results.len()));
        }
        Ok(())
    })
}

/// Executor whose call for one request id panics.
struct PanickingExecutor {
    panic_on: u64,
}

#[async_trait]
impl RequestExecutor for PanickingExecutor {
    async fn execute(&self, request_id: u64) -> RequestResult {
        if request_id == self.panic_on {
            std::panic::panic_any(format!("executor failed for request {}", request_id));
        }
        RequestResult::completed(request_id, 200, Duration::from_millis(1), b"ok", None)
    }
}

#[test]
fn panicking_executor_is_recorded_as_failure() -> Result<(), String> {
    run_async_test(async {
        let dispatcher = Dispatcher::with_executor(
            config_for("http://127.0.0.1:9", 4, 2),
            Arc::new(PanickingExecutor { panic_on: 2 }),
        )
        .map_err(|err| err.to_string())?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();

        let run = dispatcher.run(Arc::new(NoopProgress), &shutdown_tx).await;
        if run.state != RunState::Completed {
            return Err(format!("Expected completed run, got {:?}", run.state));
        }
        let expected: BTreeSet<u64> = (1..=4).collect();
        if ids_of(&run.results) != expected {
            return Err(format!("Unexpected ids: {:?}", ids_of(&run.results)));
        }
        let failed = run
            .results
            .iter()
            .find(|result| result.request_id == 2)
            .ok_or_else(|| "Missing result for request 2".to_owned())?;
        if failed.status_code != 0 || failed.error != Some(FailureKind::Unexpected) {
            return Err(format!("Unexpected failure record: {:?}", failed));
        }
        if !failed
            .error_detail
            .as_deref()
            .is_some_and(|detail| detail.contains("executor failed for request 2"))
        {
            return Err(format!("Missing panic detail: {:?}", failed.error_detail));
        }
        Ok(())
    })
}

struct PanickingProgress;

impl ProgressSink for PanickingProgress {
    fn on_progress(&self, _completed: u64, _total: u64) {
        std::panic::panic_any("progress sink failed");
    }
}

#[test]
fn panicking_progress_keeps_results() -> Result<(), String> {
    run_async_test(async {
        let executor = Arc::new(CountingExecutor::new(Duration::from_millis(2)));
        let dispatcher = Dispatcher::with_executor(config_for("http://127.0.0.1:9", 6, 3), executor)
            .map_err(|err| err.to_string())?;
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();

        let run = dispatcher.run(Arc::new(PanickingProgress), &shutdown_tx).await;
        if run.state != RunState::Completed || run.results.len() != 6 {
            return Err(format!("Unexpected run: {:?}, {}", run.state, run.results.len()));
        }
        Ok(())
    })
}

#[test]
fn unused_shutdown_receiver_does_not_cancel() -> Result<(), String> {
    run_async_test(async {
        let executor = Arc::new(CountingExecutor::new(Duration::from_millis(5)));
        let dispatcher = Dispatcher::with_executor(config_for("http://127.0.0.1:9", 6, 2), executor)
            .map_err(|err| err.to_string())?;
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        drop(shutdown_rx);

        let run = dispatcher.run(Arc::new(NoopProgress), &shutdown_tx).await;
        if run.state != RunState::Completed || run.results.len() != 6 {
            return Err(format!("Unexpected run: {:?}, {}", run.state, run.results.len()));
        }
        Ok(())
    })
}

#[test]
fn progress_sees_every_completion() -> Result<(), String> {
    run_async_test(async {
        let executor = Arc::new(CountingExecutor::new(Duration::from_millis(2)));
        let dispatcher = Dispatcher::with_executor(config_for("http://127.0.0.1:9", 8, 3), executor)
            .map_err(|err| err.to_string())?;
        let progress = Arc::new(RecordingProgress::default());
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();

        dispatcher
            .run(Arc::clone(&progress) as Arc<dyn ProgressSink>, &shutdown_tx)
            .await;
        let seen = progress
            .seen
            .lock()
            .map_err(|_err| "progress lock poisoned".to_owned())?
            .clone();
        let expected: Vec<(u64, u64)> = (1..=8).map(|completed| (completed, 8)).collect();
        if seen != expected {
            return Err(format!("Unexpected progress: {:?}", seen));
        }
        Ok(())
    })
}

#[test]
fn zero_concurrency_is_rejected() -> Result<(), String> {
    let executor = Arc::new(CountingExecutor::new(Duration::ZERO));
    match Dispatcher::with_executor(config_for("http://127.0.0.1:9", 3, 0), executor) {
        Err(err) if err.is_configuration() => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected rejection".to_owned()),
    }
}

#[test]
fn collector_counts_in_arrival_order() -> Result<(), String> {
    let progress = Arc::new(RecordingProgress::default());
    let mut collector = ResultCollector::new(3, Arc::clone(&progress) as Arc<dyn ProgressSink>);
    collector.append(RequestResult::completed(2, 200, Duration::ZERO, b"", None));
    collector.append(RequestResult::completed(1, 500, Duration::ZERO, b"", None));
    if collector.completed() != 2 {
        return Err(format!("Unexpected count {}", collector.completed()));
    }
    let ids: Vec<u64> = collector
        .into_results()
        .iter()
        .map(|result| result.request_id)
        .collect();
    if ids != vec![2, 1] {
        return Err(format!("Unexpected order: {:?}", ids));
    }
    Ok(())
}
