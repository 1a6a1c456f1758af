//! Binary contact estimate from the sensed normal load.
//!
//! There is no hysteresis or filtering: a load hovering around the threshold
//! toggles the estimate every cycle.

use stride_core::config::ContactConfig;
use stride_core::types::ContactPhase;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEstimator {
    threshold: f64,
}

impl ContactEstimator {
    pub const fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub const fn from_config(config: &ContactConfig) -> Self {
        Self::new(config.force_threshold)
    }

    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Stance if `normal_load >= threshold`. NaN loads read as swing.
    pub fn estimate(&self, normal_load: f64) -> ContactPhase {
        ContactPhase::from_stance(normal_load >= self.threshold)
    }
}
