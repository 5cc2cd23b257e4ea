//! Adaptive sampling interval.
//!
//! Every count interrupt reports how long the previous interval of
//! instructions took. The controller turns that into an
//! instructions-per-millisecond estimate, smooths it through a
//! [`MedianWindow`] and arms the next interrupt for roughly one millisecond
//! worth of instructions.

use crate::median::MedianWindow;

/// Mutable rate state for one profiling session.
#[derive(Debug, Clone)]
pub struct RateController {
    window: MedianWindow,
    last_interval: u64,
    last_timestamp_us: u64,
}

impl RateController {
    pub fn new(initial_interval: u64) -> Self {
        Self {
            window: MedianWindow::new(),
            last_interval: initial_interval.max(1),
            last_timestamp_us: 0,
        }
    }

    /// Fold one interrupt into the estimate and return the next interval in
    /// instructions. Never returns less than 1.
    pub fn on_interrupt(&mut self, now_us: u64, instructions_executed: u64) -> u64 {
        let elapsed = now_us.saturating_sub(self.last_timestamp_us).max(1);
        let ipms = instructions_executed.saturating_mul(1000) / elapsed;
        let median = self.window.observe(ipms).max(1);

        self.last_interval = median;
        self.last_timestamp_us = now_us;
        median
    }

    /// Reset the elapsed-time baseline, e.g. when sampling (re)starts or after
    /// a sample has been recorded.
    pub fn resume_at(&mut self, now_us: u64) {
        self.last_timestamp_us = now_us;
    }

    /// Microseconds since the baseline.
    pub fn elapsed_since_last(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.last_timestamp_us)
    }

    /// Interval most recently handed to the host.
    pub fn last_interval(&self) -> u64 {
        self.last_interval
    }

    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp_us
    }

    pub fn median_ipms(&self) -> u64 {
        self.window.median()
    }
}

impl Default for RateController {
    fn default() -> Self {
        Self::new(1)
    }
}
