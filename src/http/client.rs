use std::time::Duration;

use reqwest::{Client, redirect};
use tracing::error;

use crate::args::{BROWSER_USER_AGENT, DEFAULT_USER_AGENT, TestMode};
use crate::error::{AppError, AppResult, HttpError};

/// Builds the one client shared by every request of a run.
///
/// # Errors
///
/// Returns an error when the TLS backend or client configuration cannot be
/// initialised.
pub(super) fn build_client(mode: TestMode, timeout: Duration) -> AppResult<Client> {
    let user_agent = match mode {
        TestMode::Endpoint => DEFAULT_USER_AGENT,
        TestMode::FullPage => BROWSER_USER_AGENT,
    };
    let redirect_policy = match mode.redirect_limit() {
        Some(limit) => redirect::Policy::limited(limit),
        None => redirect::Policy::none(),
    };

    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .redirect(redirect_policy)
        .build()
        .map_err(|err| {
            error!("Failed to build HTTP client: {}", err);
            AppError::http(HttpError::BuildClientFailed { source: err })
        })
}
