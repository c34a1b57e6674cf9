use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{PositiveU64, PositiveUsize, TesterArgs};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// Applies configuration values to CLI arguments. A value given on the
/// command line is never overridden.
///
/// # Errors
///
/// Returns an error when a config value is out of range.
pub fn apply_config(
    args: &mut TesterArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if !is_cli(matches, "target")
        && let Some(target) = config.target.clone()
    {
        args.target = Some(target);
    }

    if !is_cli(matches, "path")
        && let Some(path) = config.path.clone()
    {
        args.path = Some(path);
    }

    if !is_cli(matches, "method")
        && let Some(method) = config.method
    {
        args.method = method;
    }

    if !is_cli(matches, "payload")
        && let Some(data) = config.data.clone()
    {
        args.payload = Some(data);
    }

    if !is_cli(matches, "bearer_token")
        && let Some(token) = config.bearer_token.clone()
    {
        args.bearer_token = Some(token);
    }

    if !is_cli(matches, "mode")
        && let Some(mode) = config.mode
    {
        args.mode = mode;
    }

    if !is_cli(matches, "requests")
        && let Some(requests) = config.requests
    {
        args.requests = ensure_positive_u64(requests, "requests")?;
    }

    if !is_cli(matches, "concurrency")
        && let Some(concurrency) = config.concurrency
    {
        args.concurrency = ensure_positive_usize(concurrency, "concurrency")?;
    }

    if !is_cli(matches, "delay_ms")
        && let Some(delay_ms) = config.delay_ms
    {
        args.delay_ms = delay_ms;
    }

    if !is_cli(matches, "runs")
        && let Some(runs) = config.runs
    {
        args.runs = ensure_positive_usize(runs, "runs")?;
    }

    if !is_cli(matches, "format")
        && let Some(format) = config.format
    {
        args.format = format;
    }

    if !is_cli(matches, "no_progress")
        && let Some(no_progress) = config.no_progress
    {
        args.no_progress = no_progress;
    }

    if !is_cli(matches, "no_color")
        && let Some(no_color) = config.no_color
    {
        args.no_color = no_color;
    }

    if !is_cli(matches, "verbose")
        && let Some(verbose) = config.verbose
    {
        args.verbose = verbose;
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_u64(value: u64, field: &str) -> AppResult<PositiveU64> {
    PositiveU64::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn ensure_positive_usize(value: usize, field: &str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}
