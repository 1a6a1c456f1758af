use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Convert seconds to whole nanoseconds, rounding to the nearest nanosecond.
///
/// Negative inputs saturate to zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn secs_to_nanos(secs: f64) -> u64 {
    (secs * 1e9).round().max(0.0) as u64
}

/// Convert nanoseconds to seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn nanos_to_secs(nanos: u64) -> f64 {
    nanos as f64 / 1e9
}

// ---------------------------------------------------------------------------
// ControlClock
// ---------------------------------------------------------------------------

/// Integer tick clock for the fixed-rate control loop.
///
/// Elapsed time is `tick * dt` computed in integer nanoseconds so that gait
/// phases computed from it repeat exactly after a whole number of periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlClock {
    tick: u64,
    dt_nanos: u64,
}

impl ControlClock {
    /// Clock at tick zero with tick interval `dt_secs`.
    #[must_use]
    pub fn new(dt_secs: f64) -> Self {
        Self::from_nanos(secs_to_nanos(dt_secs))
    }

    /// Clock at tick zero with a tick interval given in nanoseconds.
    #[must_use]
    pub const fn from_nanos(dt_nanos: u64) -> Self {
        Self { tick: 0, dt_nanos }
    }

    /// Number of completed ticks.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Tick interval in nanoseconds.
    #[must_use]
    pub const fn dt_nanos(&self) -> u64 {
        self.dt_nanos
    }

    /// Tick interval in seconds.
    #[must_use]
    pub fn dt_secs(&self) -> f64 {
        nanos_to_secs(self.dt_nanos)
    }

    /// Tick interval as a [`Duration`].
    #[must_use]
    pub const fn dt(&self) -> Duration {
        Duration::from_nanos(self.dt_nanos)
    }

    /// Elapsed control time in nanoseconds.
    #[must_use]
    pub const fn elapsed_nanos(&self) -> u64 {
        self.tick.saturating_mul(self.dt_nanos)
    }

    /// Elapsed control time in seconds.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        nanos_to_secs(self.elapsed_nanos())
    }

    /// Move to the next tick.
    pub const fn advance(&mut self) {
        self.tick = self.tick.saturating_add(1);
    }

    /// Return to tick zero.
    pub const fn reset(&mut self) {
        self.tick = 0;
    }
}

impl fmt::Display for ControlClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {} ({:.3}s)", self.tick, self.elapsed_secs())
    }
}
