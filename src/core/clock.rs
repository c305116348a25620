use std::cell::Cell;
use std::time::Instant;

/// A single monotonic time source for one play-through.
///
/// Readings are seconds since an arbitrary origin owned by the clock. The
/// gameplay loop reads it exactly once per tick; every judgment in that
/// tick uses the same reading.
pub trait Clock {
    fn now_seconds(&self) -> f64;
}

/// Wall clock backed by `Instant`, which the OS guarantees not to go
/// backward.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Seconds since this clock was created, for stamping input edges.
    #[inline(always)]
    pub fn stamp(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now_seconds(&self) -> f64 {
        self.stamp()
    }
}

/// Hand-driven clock for simulation and tests. Can be set to any value,
/// including backward or non-finite ones, to exercise the clock-fault paths.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl Clock for ManualClock {
    #[inline(always)]
    fn now_seconds(&self) -> f64 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline(always)]
    fn now_seconds(&self) -> f64 {
        (**self).now_seconds()
    }
}
