//! Run configuration, per-request outcomes, and the run record.
mod request;
mod result;
mod run;


pub use request::{MAX_CONCURRENCY, RequestSpec, RunConfig, RunPlan};
pub use result::{FailureKind, RESPONSE_PREVIEW_BYTES, RequestResult, is_success_status};
pub use run::{RunState, TestRun};

use std::time::Duration;

use serde::Serializer;

pub(crate) fn serialize_secs<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(value.as_secs_f64())
}
