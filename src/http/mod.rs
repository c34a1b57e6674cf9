//! HTTP request execution.
mod classify;
mod client;
mod executor;

#[cfg(test)]
pub(crate) mod test_support;

pub use executor::{HttpExecutor, RequestExecutor};
