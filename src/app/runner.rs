use std::sync::Arc;

use tracing::{error, info, warn};

use crate::args::TesterArgs;
use crate::dispatch::{Dispatcher, ProgressSink};
use crate::domain::{RunConfig, RunState};
use crate::error::{AppError, AppResult, ValidationError};
use crate::history::RunHistory;
use crate::shutdown::{ShutdownSender, shutdown_requested};

use super::progress::TerminalProgress;

pub(crate) fn run_config_from_args(args: &TesterArgs) -> AppResult<RunConfig> {
    let Some(target) = args.target.clone() else {
        error!("Missing target (pass a URL or set it in the config file).");
        return Err(AppError::validation(ValidationError::MissingTarget));
    };
    Ok(RunConfig {
        target,
        path: args.path.clone(),
        method: args.method,
        payload: args.payload.clone(),
        bearer_token: args.bearer_token.clone(),
        mode: args.mode,
        requests: args.requests.get(),
        concurrency: args.concurrency.get(),
        delay_ms: args.delay_ms,
    })
}

/// Runs the configured test `--runs` times and records every run. A stop
/// request ends the series: a cancelled run is the last one recorded and no
/// further run starts once the request has been raised.
///
/// # Errors
///
/// Returns a configuration error before any request is sent when the
/// arguments do not describe a usable run.
pub(crate) async fn run_local(
    args: &TesterArgs,
    shutdown_tx: &ShutdownSender,
) -> AppResult<RunHistory> {
    let config = run_config_from_args(args)?;
    let dispatcher = Dispatcher::new(config)?;
    let total_runs = args.runs.get();
    let mut history = RunHistory::new();

    for index in 1..=total_runs {
        if shutdown_requested(shutdown_tx) {
            warn!("Stop requested; skipping runs {} to {}.", index, total_runs);
            break;
        }
        if total_runs > 1 {
            info!("Run {}/{}", index, total_runs);
        }
        let progress = Arc::new(TerminalProgress::new(args.no_progress, args.no_color));
        let run = dispatcher
            .run(Arc::clone(&progress) as Arc<dyn ProgressSink>, shutdown_tx)
            .await;
        progress.finish();

        let cancelled = run.state == RunState::Cancelled;
        history.push(run);
        if cancelled {
            if index < total_runs {
                warn!("Skipping remaining runs after cancellation.");
            }
            break;
        }
    }

    Ok(history)
}
