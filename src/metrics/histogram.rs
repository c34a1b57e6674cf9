use std::time::Duration;

use hdrhistogram::Histogram;

/// Significant figures kept by the latency histogram.
const SIGNIFICANT_FIGURES: u8 = 3;

/// HDR histogram of request latencies at microsecond resolution.
#[derive(Debug)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new latency histogram.
    ///
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be created.
    pub fn new() -> Result<Self, String> {
        let hist = Histogram::<u64>::new(SIGNIFICANT_FIGURES)
            .map_err(|err| format!("Failed to create histogram: {}", err))?;
        Ok(Self { hist })
    }

    /// Record one latency.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be recorded.
    pub fn record(&mut self, latency: Duration) -> Result<(), String> {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX).max(1);
        self.hist
            .record(micros)
            .map_err(|err| format!("Failed to record latency: {}", err))
    }

    /// Latency at `quantile` (0.0..=1.0); zero when empty.
    #[must_use]
    pub fn value_at_quantile(&self, quantile: f64) -> Duration {
        if self.count() == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.hist.value_at_quantile(quantile))
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.hist.len()
    }
}
