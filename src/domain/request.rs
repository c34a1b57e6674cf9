use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::args::{HttpMethod, PositiveU64, PositiveUsize, TestMode};
use crate::error::{AppError, AppResult, RunField, ValidationError};

/// Upper bound on in-flight requests for a single run.
pub const MAX_CONCURRENCY: usize = 1000;

/// Raw run settings as supplied by a caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub target: String,
    pub path: Option<String>,
    pub method: HttpMethod,
    pub payload: Option<String>,
    #[serde(skip_serializing, default)]
    pub bearer_token: Option<String>,
    pub mode: TestMode,
    pub requests: u64,
    pub concurrency: usize,
    pub delay_ms: u64,
}

impl RunConfig {
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            path: None,
            method: HttpMethod::Get,
            payload: None,
            bearer_token: None,
            mode: TestMode::Endpoint,
            requests: 1,
            concurrency: 1,
            delay_ms: 0,
        }
    }

    /// Checks every setting and resolves the request shape.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unusable target URL, a payload that
    /// is not JSON, or a zero request count or concurrency.
    pub fn validate(&self) -> AppResult<RunPlan> {
        let requests = PositiveU64::try_from(self.requests).map_err(|_err| {
            AppError::validation(ValidationError::MustBePositive {
                field: RunField::Requests,
            })
        })?;
        let concurrency = PositiveUsize::try_from(self.concurrency).map_err(|_err| {
            AppError::validation(ValidationError::MustBePositive {
                field: RunField::Concurrency,
            })
        })?;
        let concurrency = if concurrency.get() > MAX_CONCURRENCY {
            warn!(
                "Concurrency {} exceeds the maximum of {}; capping.",
                concurrency.get(),
                MAX_CONCURRENCY
            );
            MAX_CONCURRENCY
        } else {
            concurrency.get()
        };

        let url = resolve_url(&self.target, self.path.as_deref())?;
        let payload = parse_payload(self.payload.as_deref())?;
        if payload.is_some() && !(self.method.accepts_payload() && self.mode.sends_payload()) {
            warn!(
                "Payload is ignored for {} requests in {} mode.",
                self.method.as_str(),
                self.mode.as_str()
            );
        }
        let bearer_token = self
            .bearer_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_owned);

        Ok(RunPlan {
            spec: RequestSpec {
                url,
                method: self.method,
                payload,
                bearer_token,
                mode: self.mode,
            },
            requests: requests.get(),
            concurrency,
            delay: Duration::from_millis(self.delay_ms),
        })
    }
}

/// Validated, immutable description of the call every request makes.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub url: Url,
    pub method: HttpMethod,
    pub payload: Option<serde_json::Value>,
    pub bearer_token: Option<String>,
    pub mode: TestMode,
}

impl RequestSpec {
    /// Payload actually attached to the request, if any.
    #[must_use]
    pub fn outgoing_payload(&self) -> Option<&serde_json::Value> {
        if self.method.accepts_payload() && self.mode.sends_payload() {
            self.payload.as_ref()
        } else {
            None
        }
    }
}

/// Everything the dispatcher needs, with bounds already checked.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub spec: RequestSpec,
    pub requests: u64,
    pub concurrency: usize,
    pub delay: Duration,
}

fn resolve_url(target: &str, path: Option<&str>) -> AppResult<Url> {
    let target = target.trim();
    if target.is_empty() {
        return Err(AppError::validation(ValidationError::MissingTarget));
    }
    let raw = match path.map(str::trim).filter(|path| !path.is_empty()) {
        Some(path) => format!(
            "{}/{}",
            target.trim_end_matches('/'),
            path.trim_start_matches('/')
        ),
        None => target.to_owned(),
    };
    let url = Url::parse(&raw).map_err(|err| {
        AppError::validation(ValidationError::InvalidUrl {
            url: raw.clone(),
            source: err,
        })
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::validation(ValidationError::UnsupportedScheme {
                scheme: other.to_owned(),
            }));
        }
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::validation(ValidationError::UrlMissingHost {
            url: raw,
        }));
    }
    Ok(url)
}

fn parse_payload(payload: Option<&str>) -> AppResult<Option<serde_json::Value>> {
    let Some(text) = payload.filter(|text| !text.trim().is_empty()) else {
        return Ok(None);
    };
    serde_json::from_str(text)
        .map(Some)
        .map_err(|err| AppError::validation(ValidationError::InvalidJsonPayload { source: err }))
}
