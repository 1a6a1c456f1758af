//! Gait scheduler for the two-leg anti-phase gait.
//!
//! A leg's gait phase is `frac((t - t0) / T)`; the leg is scheduled in stance
//! while the phase is at most the switch fraction and in swing afterwards.
//! The right leg's phase start lags the left leg's by exactly `T / 2`.
//!
//! Phases are computed from integer nanoseconds so a leg's schedule repeats
//! bit-for-bit after every whole period.

use stride_core::config::GaitConfig;
use stride_core::types::{ContactPhase, LEG_COUNT, LegSide};

/// Scheduled contact for a phase: stance while `phase <= switch_fraction`.
pub fn scheduled_contact(phase: f64, switch_fraction: f64) -> ContactPhase {
    ContactPhase::from_stance(phase <= switch_fraction)
}

#[allow(clippy::cast_possible_truncation)]
fn signed_nanos(secs: f64) -> i128 {
    (secs * 1e9).round() as i128
}

/// Stateless schedule for both legs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaitScheduler {
    period_nanos: i128,
    switch_fraction: f64,
    offsets: [i128; LEG_COUNT],
}

impl GaitScheduler {
    /// `period` and `left_offset` in seconds. Non-positive periods clamp to 1 ns.
    pub fn new(period: f64, switch_fraction: f64, left_offset: f64) -> Self {
        let period_nanos = signed_nanos(period).max(1);
        let left = signed_nanos(left_offset);
        Self {
            period_nanos,
            switch_fraction,
            offsets: [left, left + period_nanos / 2],
        }
    }

    pub fn from_config(config: &GaitConfig) -> Self {
        Self::new(config.period, config.switch_fraction, config.left_offset)
    }

    /// Gait period in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn period(&self) -> f64 {
        self.period_nanos as f64 / 1e9
    }

    pub const fn switch_fraction(&self) -> f64 {
        self.switch_fraction
    }

    /// Phase start of `side` in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn offset(&self, side: LegSide) -> f64 {
        self.offsets[side.index()] as f64 / 1e9
    }

    /// Gait phase of `side` at `elapsed_nanos` since the loop started.
    #[allow(clippy::cast_precision_loss)]
    pub fn phase(&self, side: LegSide, elapsed_nanos: u64) -> f64 {
        let since = i128::from(elapsed_nanos) - self.offsets[side.index()];
        since.rem_euclid(self.period_nanos) as f64 / self.period_nanos as f64
    }

    /// Scheduled contact of `side` at `elapsed_nanos`.
    pub fn contact(&self, side: LegSide, elapsed_nanos: u64) -> ContactPhase {
        scheduled_contact(self.phase(side, elapsed_nanos), self.switch_fraction)
    }
}
