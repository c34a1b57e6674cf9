//! CLI argument types and parsing helpers.
mod cli;
mod defaults;
pub(crate) mod parsers;
mod types;


pub use cli::TesterArgs;
pub use types::{HttpMethod, OutputFormat, PositiveU64, PositiveUsize, TestMode};

pub(crate) use defaults::{BROWSER_USER_AGENT, DEFAULT_USER_AGENT};
