use clap::Parser;

use super::parsers::{parse_bool_env, parse_positive_u64, parse_positive_usize};
use super::types::{HttpMethod, OutputFormat, PositiveU64, PositiveUsize, TestMode};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Concurrent HTTP load generator: fire N requests at an endpoint with bounded concurrency and report success rate, latency, and status/error breakdowns."
)]
pub struct TesterArgs {
    /// Target URL (full page URL, or base URL when --path is given)
    #[arg(env = "LOADPROBE_TARGET")]
    pub target: Option<String>,

    /// Endpoint path joined onto the target base URL
    #[arg(long)]
    pub path: Option<String>,

    /// HTTP method to use
    #[arg(long, short = 'X', default_value = "get", ignore_case = true)]
    pub method: HttpMethod,

    /// JSON payload sent with POST/PUT endpoint calls
    #[arg(long = "data", short = 'd')]
    pub payload: Option<String>,

    /// Bearer token sent as the Authorization header
    #[arg(long = "bearer", env = "LOADPROBE_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Single endpoint call or full-page fetch with redirect following
    #[arg(long, default_value = "endpoint", ignore_case = true)]
    pub mode: TestMode,

    /// Total number of requests to send
    #[arg(
        long,
        short = 'n',
        default_value = "10",
        value_parser = parse_positive_u64
    )]
    pub requests: PositiveU64,

    /// Maximum number of requests in flight at once
    #[arg(
        long,
        short = 'c',
        aliases = ["workers"],
        default_value = "5",
        value_parser = parse_positive_usize
    )]
    pub concurrency: PositiveUsize,

    /// Delay between successive request submissions, in milliseconds
    #[arg(long = "delay-ms", default_value_t = 0)]
    pub delay_ms: u64,

    /// Repeat the whole test this many times and compare the runs
    #[arg(long, default_value = "1", value_parser = parse_positive_usize)]
    pub runs: PositiveUsize,

    /// Report format
    #[arg(long, default_value = "text", ignore_case = true)]
    pub format: OutputFormat,

    /// Path to config file (TOML/JSON). Defaults to ./loadprobe.toml or ./loadprobe.json if present.
    #[arg(long)]
    pub config: Option<String>,

    /// Do not draw the progress line
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Enable verbose logging (sets log level to debug unless overridden by LOADPROBE_LOG/RUST_LOG)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable color output
    #[arg(long = "no-color", env = "NO_COLOR", value_parser = parse_bool_env)]
    pub no_color: bool,
}

