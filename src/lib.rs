//! Core library for the `loadprobe` CLI.
//!
//! Validates a run configuration, fans requests out over a bounded pool of
//! tokio tasks, collects one `RequestResult` per request, and derives summary
//! statistics from the finished `TestRun`. The binary is a thin front end over
//! these pieces.
pub mod args;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod history;
pub mod http;
pub mod metrics;
pub mod shutdown;
