use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::serialize_secs;

/// Bytes of response body kept on each result.
pub const RESPONSE_PREVIEW_BYTES: usize = 500;

/// Why a request never completed as an HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FailureKind {
    Timeout,
    ConnectionError,
    ProtocolError,
    Unexpected,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "Timeout",
            FailureKind::ConnectionError => "ConnectionError",
            FailureKind::ProtocolError => "ProtocolError",
            FailureKind::Unexpected => "Unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub const fn is_success_status(status_code: u16) -> bool {
    status_code > 0 && status_code < 400
}

/// Outcome of a single request. Built once when the call finishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestResult {
    pub request_id: u64,
    pub status_code: u16,
    #[serde(rename = "response_time", serialize_with = "serialize_secs")]
    pub latency: Duration,
    pub success: bool,
    pub error: Option<FailureKind>,
    pub error_detail: Option<String>,
    #[serde(rename = "response_text")]
    pub response_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
}

impl RequestResult {
    /// A call that produced a full HTTP response, whatever its status.
    #[must_use]
    pub fn completed(
        request_id: u64,
        status_code: u16,
        latency: Duration,
        body_prefix: &[u8],
        content_length: Option<u64>,
    ) -> Self {
        Self {
            request_id,
            status_code,
            latency,
            success: is_success_status(status_code),
            error: None,
            error_detail: None,
            response_preview: preview_text(body_prefix),
            content_length,
        }
    }

    /// A call that never produced a complete response.
    #[must_use]
    pub fn failed(
        request_id: u64,
        kind: FailureKind,
        detail: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            request_id,
            status_code: 0,
            latency,
            success: false,
            error: Some(kind),
            error_detail: Some(detail.into()),
            response_preview: String::new(),
            content_length: None,
        }
    }
}

/// Decodes at most `RESPONSE_PREVIEW_BYTES`, dropping a multi-byte character
/// split by the cut.
fn preview_text(body: &[u8]) -> String {
    let cut = body.get(..RESPONSE_PREVIEW_BYTES).unwrap_or(body);
    match std::str::from_utf8(cut) {
        Ok(text) => text.to_owned(),
        Err(err) if err.error_len().is_none() => {
            let valid = cut.get(..err.valid_up_to()).unwrap_or_default();
            String::from_utf8_lossy(valid).into_owned()
        }
        Err(_) => String::from_utf8_lossy(cut).into_owned(),
    }
}
