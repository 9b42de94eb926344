//! Rolling throughput estimation.
//!
//! Samples are taken at most once per wall-clock second of transfer time,
//! not per chunk, so the estimate is stable regardless of chunk arrival rate.

use std::time::{Duration, Instant};

/// Number of one-second samples in the smoothing window.
pub(crate) const MAX_SPEED_SAMPLES: u64 = 10;

/// Minimum spacing between two speed samples.
pub(crate) const SPEED_CALCULATION_INTERVAL: Duration = Duration::from_millis(1000);

/// Smoothed bytes-per-second estimator over the last [`MAX_SPEED_SAMPLES`]
/// per-second samples.
///
/// Until the window fills, the estimate is the cumulative mean of all samples
/// so far. Once full, each new sample replaces the *current average* rather
/// than the true oldest sample, an approximation of a sliding window that
/// weights history more heavily under bursty throughput. Kept as-is rather
/// than replaced with an exact FIFO window.
#[derive(Debug)]
pub(crate) struct SpeedEstimator {
    last_sample_at: Instant,
    last_sampled_bytes: u64,
    speed_sum: u64,
    sample_count: u64,
}

impl SpeedEstimator {
    /// Starts estimating from `initial_bytes` already on disk at `now`.
    pub(crate) fn new(initial_bytes: u64, now: Instant) -> Self {
        Self {
            last_sample_at: now,
            last_sampled_bytes: initial_bytes,
            speed_sum: 0,
            sample_count: 0,
        }
    }

    /// Takes a sample if at least one interval elapsed since the last one.
    ///
    /// Returns the updated smoothed speed when a sample was taken, `None`
    /// otherwise (caller keeps the previous estimate).
    pub(crate) fn tick(&mut self, downloaded: u64, now: Instant) -> Option<u64> {
        let elapsed = now.duration_since(self.last_sample_at);
        if elapsed < SPEED_CALCULATION_INTERVAL {
            return None;
        }

        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX).max(1);
        let bytes_delta = downloaded.saturating_sub(self.last_sampled_bytes);
        let sample = bytes_delta.saturating_mul(1000) / millis;

        self.last_sampled_bytes = downloaded;
        self.last_sample_at = now;
        Some(self.push(sample))
    }

    /// Folds one per-second sample into the window, returning the new average.
    fn push(&mut self, sample: u64) -> u64 {
        if self.sample_count < MAX_SPEED_SAMPLES {
            self.speed_sum = self.speed_sum.saturating_add(sample);
            self.sample_count += 1;
            self.speed_sum / self.sample_count
        } else {
            let current_average = self.speed_sum / MAX_SPEED_SAMPLES;
            self.speed_sum = self
                .speed_sum
                .saturating_sub(current_average)
                .saturating_add(sample);
            self.speed_sum / MAX_SPEED_SAMPLES
        }
    }
}

/// Estimated seconds remaining, or `None` when it cannot be computed.
pub(crate) fn time_remaining_secs(total: u64, downloaded: u64, speed: u64) -> Option<u64> {
    if total == 0 || speed == 0 {
        return None;
    }
    Some(total.saturating_sub(downloaded) / speed)
}
