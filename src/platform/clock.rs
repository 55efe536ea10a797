//! Wall-clock and boot-relative time sources.

use std::time::{Duration, Instant};

/// Whole milliseconds in `duration`, clamped to `i64::MAX`.
pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Source of wall-clock time and time elapsed since device boot.
pub trait BootClock: Send + Sync {
    /// Current wall-clock time in epoch milliseconds.
    fn now_epoch_millis(&self) -> i64;

    /// Time elapsed since boot.
    fn elapsed_since_boot(&self) -> Duration;

    /// Wall-clock instant of boot in epoch milliseconds.
    fn boot_epoch_millis(&self) -> i64 {
        self.now_epoch_millis().saturating_sub(duration_millis(self.elapsed_since_boot()))
    }
}

/// Real clock. Boot is taken to be the moment the clock was created.
#[derive(Debug, Clone)]
pub struct SystemBootClock {
    booted_at: Instant,
}

impl Default for SystemBootClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBootClock {
    pub fn new() -> Self {
        Self {
            booted_at: Instant::now(),
        }
    }
}

impl BootClock for SystemBootClock {
    fn now_epoch_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn elapsed_since_boot(&self) -> Duration {
        self.booted_at.elapsed()
    }
}

/// Frozen clock for deterministic timestamps.
#[derive(Debug, Clone, Copy)]
pub struct FixedBootClock {
    pub boot_epoch_millis: i64,
    pub elapsed: Duration,
}

impl FixedBootClock {
    pub fn new(boot_epoch_millis: i64, elapsed: Duration) -> Self {
        Self {
            boot_epoch_millis,
            elapsed,
        }
    }
}

impl BootClock for FixedBootClock {
    fn now_epoch_millis(&self) -> i64 {
        self.boot_epoch_millis.saturating_add(duration_millis(self.elapsed))
    }

    fn elapsed_since_boot(&self) -> Duration {
        self.elapsed
    }

    fn boot_epoch_millis(&self) -> i64 {
        self.boot_epoch_millis
    }
}
