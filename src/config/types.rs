use serde::Deserialize;

use crate::args::{HttpMethod, OutputFormat, TestMode};

/// Settings read from `loadprobe.toml` / `loadprobe.json`. Every field is
/// optional; command-line values win.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub target: Option<String>,
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
    #[serde(alias = "payload")]
    pub data: Option<String>,
    pub bearer_token: Option<String>,
    pub mode: Option<TestMode>,
    pub requests: Option<u64>,
    #[serde(alias = "workers")]
    pub concurrency: Option<usize>,
    pub delay_ms: Option<u64>,
    pub runs: Option<usize>,
    pub format: Option<OutputFormat>,
    pub no_progress: Option<bool>,
    pub no_color: Option<bool>,
    pub verbose: Option<bool>,
}
