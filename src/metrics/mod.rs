//! Summary statistics over finished (or partial) runs.
mod aggregate;
mod histogram;


pub use aggregate::{Aggregate, LatencyStats, aggregate};
pub use histogram::LatencyHistogram;
