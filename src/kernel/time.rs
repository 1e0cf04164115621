use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Host tick cadence used by the demo driver.
pub const TICK_MS: u64 = 16;

/// Source of time for the engine.
///
/// `monotonic` drives durations and per-tick deltas, `epoch_seconds` is only
/// used to stamp records.
pub trait Clock: Send {
    fn monotonic(&self) -> Duration;
    fn epoch_seconds(&self) -> f64;
}

/// Real clock: `Instant` for elapsed time, `chrono::Utc` for wall time.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn epoch_seconds(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Hand-driven clock. Clones share the same timeline, so a test can keep one
/// copy and hand the other to the engine.
#[derive(Debug, Clone)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
    epoch_base: f64,
}

impl ManualClock {
    pub fn new(epoch_base: f64) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(0)),
            epoch_base,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn epoch_seconds(&self) -> f64 {
        self.epoch_base + self.monotonic().as_secs_f64()
    }
}
