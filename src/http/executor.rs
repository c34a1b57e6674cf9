use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{RESPONSE_PREVIEW_BYTES, RequestResult, RequestSpec};
use crate::error::AppResult;

use super::classify::classify_error;
use super::client::build_client;

/// Performs exactly one call and reports how it went. Implementations never
/// fail: every problem is folded into the returned result.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request_id: u64) -> RequestResult;
}

/// Executes the run's `RequestSpec` over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    spec: RequestSpec,
}

impl HttpExecutor {
    /// Creates an executor using the per-call deadline of the request mode.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(spec: RequestSpec) -> AppResult<Self> {
        let timeout = spec.mode.timeout();
        Self::with_timeout(spec, timeout)
    }

    pub(crate) fn with_timeout(spec: RequestSpec, timeout: Duration) -> AppResult<Self> {
        let client = build_client(spec.mode, timeout)?;
        Ok(Self { client, spec })
    }

    fn build_request(&self) -> RequestBuilder {
        let mut builder = self
            .client
            .request(self.spec.method.into(), self.spec.url.clone());
        if let Some(token) = self.spec.bearer_token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(payload) = self.spec.outgoing_payload() {
            builder = builder.json(payload);
        }
        builder
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request_id: u64) -> RequestResult {
        let start = Instant::now();
        let response = match self.build_request().send().await {
            Ok(response) => response,
            Err(err) => {
                let kind = classify_error(&err);
                debug!("Request {} failed ({}): {}", request_id, kind, err);
                return RequestResult::failed(request_id, kind, err.to_string(), start.elapsed());
            }
        };

        let status = response.status().as_u16();
        match read_body(response).await {
            Ok(body) => {
                let content_length = self
                    .spec
                    .mode
                    .records_content_length()
                    .then_some(body.total_bytes);
                RequestResult::completed(
                    request_id,
                    status,
                    start.elapsed(),
                    &body.prefix,
                    content_length,
                )
            }
            Err(err) => {
                let kind = classify_error(&err);
                debug!(
                    "Request {} failed reading body after status {} ({}): {}",
                    request_id, status, kind, err
                );
                RequestResult::failed(request_id, kind, err.to_string(), start.elapsed())
            }
        }
    }
}

struct BodySummary {
    prefix: Vec<u8>,
    total_bytes: u64,
}

/// Drains the body, keeping only the preview prefix in memory.
async fn read_body(response: Response) -> Result<BodySummary, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut prefix = Vec::new();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
        let room = RESPONSE_PREVIEW_BYTES.saturating_sub(prefix.len());
        if room > 0 {
            let take = room.min(bytes.len());
            if let Some(head) = bytes.get(..take) {
                prefix.extend_from_slice(head);
            }
        }
    }
    Ok(BodySummary {
        prefix,
        total_bytes,
    })
}
