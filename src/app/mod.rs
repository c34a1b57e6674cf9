//! Command-line orchestration: progress display, repeated runs, and reports.
mod progress;
mod report;
mod runner;


pub(crate) use report::print_report;
pub(crate) use runner::run_local;
