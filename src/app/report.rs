use std::io::Write;
use std::time::Duration;

use serde::Serialize;

use crate::args::OutputFormat;
use crate::domain::TestRun;
use crate::error::AppResult;
use crate::history::RunHistory;
use crate::metrics::{Aggregate, aggregate};

/// Writes the report for every run in `history` to stdout.
///
/// # Errors
///
/// Returns an error when stdout cannot be written or JSON encoding fails.
pub(crate) fn print_report(history: &RunHistory, format: OutputFormat) -> AppResult<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Text => write_text_report(&mut out, history)?,
        OutputFormat::Json => write_json_report(&mut out, history)?,
    }
    out.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct RunReport<'run> {
    summary: Aggregate,
    run: &'run TestRun,
}

#[derive(Serialize)]
struct JsonReport<'run> {
    runs: Vec<RunReport<'run>>,
}

pub(super) fn write_json_report<W: Write>(out: &mut W, history: &RunHistory) -> AppResult<()> {
    let report = JsonReport {
        runs: history
            .iter()
            .map(|run| RunReport {
                summary: aggregate(run),
                run,
            })
            .collect(),
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub(super) fn write_text_report<W: Write>(out: &mut W, history: &RunHistory) -> AppResult<()> {
    let total_runs = history.len();
    if history.is_empty() {
        writeln!(out, "No runs executed.")?;
        return Ok(());
    }
    for (index, run) in history.iter().enumerate() {
        if total_runs > 1 {
            writeln!(out, "=== Run {}/{} ===", index.saturating_add(1), total_runs)?;
        }
        write_summary(out, run, &aggregate(run))?;
        writeln!(out)?;
    }
    if total_runs > 1 {
        write_comparison(out, history)?;
    }
    Ok(())
}

fn write_summary<W: Write>(out: &mut W, run: &TestRun, summary: &Aggregate) -> AppResult<()> {
    let target = run
        .target_url
        .as_ref()
        .map_or_else(|| run.config.target.clone(), ToString::to_string);
    let success_rate_x100 = ratio_x100(summary.successful, summary.total);

    writeln!(
        out,
        "Target: {} ({}, {} mode)",
        target,
        run.config.method.as_str(),
        run.config.mode.as_str()
    )?;
    writeln!(out, "Started: {}", run.started_at.to_rfc3339())?;
    writeln!(out, "State: {}", summary.state.as_str())?;
    if let Some(failure) = run.failure.as_deref() {
        writeln!(out, "Failure: {}", failure)?;
    }
    writeln!(out, "Requests: {}/{}", summary.total, summary.planned)?;
    writeln!(
        out,
        "Successful: {} ({})",
        summary.successful,
        format_x100(success_rate_x100, "%")
    )?;
    writeln!(out, "Failed: {}", summary.failed)?;
    writeln!(out, "Elapsed: {}", format_secs(summary.elapsed))?;
    writeln!(
        out,
        "Throughput: {}",
        format_x100(rps_x100(summary.total, summary.elapsed), " req/s")
    )?;
    writeln!(
        out,
        "Latency avg/median: {} / {}",
        format_ms(summary.latency.mean),
        format_ms(summary.latency.median)
    )?;
    writeln!(
        out,
        "Latency min/max: {} / {}",
        format_ms(summary.latency.min),
        format_ms(summary.latency.max)
    )?;
    writeln!(
        out,
        "Latency p90/p95/p99: {} / {} / {}",
        format_ms(summary.latency.p90),
        format_ms(summary.latency.p95),
        format_ms(summary.latency.p99)
    )?;

    if !summary.status_codes.is_empty() {
        writeln!(out, "Status codes:")?;
        for (code, count) in &summary.status_codes {
            if *code == 0 {
                writeln!(out, "  0 (no response): {}", count)?;
            } else {
                writeln!(out, "  {}: {}", code, count)?;
            }
        }
    }
    if !summary.errors.is_empty() {
        writeln!(out, "Errors:")?;
        for (label, count) in &summary.errors {
            writeln!(out, "  {}: {}", label, count)?;
        }
    }
    Ok(())
}

fn write_comparison<W: Write>(out: &mut W, history: &RunHistory) -> AppResult<()> {
    writeln!(out, "=== Run comparison ===")?;
    writeln!(
        out,
        "{:<5}{:<11}{:>12}{:>10}{:>12}{:>12}{:>12}",
        "Run", "State", "Requests", "Success", "Avg", "P95", "RPS"
    )?;
    for (index, run) in history.iter().enumerate() {
        let summary = aggregate(run);
        writeln!(
            out,
            "{:<5}{:<11}{:>12}{:>10}{:>12}{:>12}{:>12}",
            index.saturating_add(1),
            summary.state.as_str(),
            format!("{}/{}", summary.total, summary.planned),
            format_x100(ratio_x100(summary.successful, summary.total), "%"),
            format_ms(summary.latency.mean),
            format_ms(summary.latency.p95),
            format_x100(rps_x100(summary.total, summary.elapsed), ""),
        )?;
    }
    Ok(())
}

/// `part / whole` scaled by 10_000, so two decimals of a percentage.
pub(super) fn ratio_x100(part: u64, whole: u64) -> u64 {
    let scaled = u128::from(part)
        .saturating_mul(10_000)
        .checked_div(u128::from(whole))
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Requests per second scaled by 100.
pub(super) fn rps_x100(total: u64, elapsed: Duration) -> u64 {
    let scaled = u128::from(total)
        .saturating_mul(100_000_000)
        .checked_div(elapsed.as_micros())
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

pub(super) fn format_x100(value: u64, unit: &str) -> String {
    format!(
        "{}.{:02}{}",
        value.checked_div(100).unwrap_or(0),
        value.checked_rem(100).unwrap_or(0),
        unit
    )
}

pub(super) fn format_ms(value: Duration) -> String {
    let micros = value.as_micros();
    format!(
        "{}.{:02}ms",
        micros.checked_div(1000).unwrap_or(0),
        micros
            .checked_rem(1000)
            .and_then(|rem| rem.checked_div(10))
            .unwrap_or(0)
    )
}

fn format_secs(value: Duration) -> String {
    format!("{}.{:03}s", value.as_secs(), value.subsec_millis())
}
