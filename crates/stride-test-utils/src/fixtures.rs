//! Reference data shared by the model and control test suites.

use stride_core::config::StrideConfig;
use stride_core::types::{JointReading, JointVector};

/// The reference biped's inertial table (`config/biped.toml`).
pub const BIPED_TABLE_TOML: &str = include_str!("../../../config/biped.toml");

/// Knee-bent standing configuration. The foot sits roughly 0.71 m below and
/// 0.14 m ahead of the hip.
pub fn standing_pose() -> JointVector {
    JointVector::new(0.0, 0.5, -1.0, 0.5)
}

/// Motionless reading at [`standing_pose`].
pub fn standing_reading() -> JointReading {
    JointReading::new(standing_pose(), JointVector::zeros())
}

/// Default configuration with the realtime sleep disabled.
pub fn stepped_config() -> StrideConfig {
    let mut config = StrideConfig::default();
    config.control.realtime = false;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_fixture_is_not_empty() {
        assert!(BIPED_TABLE_TOML.contains("[[link]]"));
        assert_eq!(BIPED_TABLE_TOML.matches("[[link]]").count(), 8);
    }

    #[test]
    fn stepped_config_is_valid() {
        let config = stepped_config();
        assert!(!config.control.realtime);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn standing_reading_is_at_rest() {
        let reading = standing_reading();
        assert!(reading.is_finite());
        assert_eq!(reading.velocity, JointVector::zeros());
    }
}
