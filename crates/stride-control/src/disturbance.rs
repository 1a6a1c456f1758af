//! Contact force estimate from the torque the model cannot explain.
//!
//! With no external contact the leg obeys `Mq q_dd + g = tau`. The gap
//! `tau_cmd - (Mq q_dd + g)` is attributed to a force at the foot and mapped
//! back through the pseudo-inverse of `J^T`. The estimate is the force the
//! foot exerts on the ground, so a loaded foot yields a downward force and
//! the normal load is its negated world-frame z component.

use nalgebra::{UnitQuaternion, Vector3};

use stride_core::error::NumericalError;
use stride_core::types::{JointReading, JointVector};
use stride_model::LegDynamics;

/// Singular-value cutoff for the `J^T` pseudo-inverse.
const PINV_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisturbanceEstimate {
    /// Unexplained joint torque.
    pub torque: JointVector,
    /// Foot force on the ground, hip frame.
    pub force: Vector3<f64>,
}

impl DisturbanceEstimate {
    /// Vertical load carried by the foot, world frame (positive when pressing down).
    pub fn normal_load(&self, orientation: &UnitQuaternion<f64>) -> f64 {
        -(orientation * self.force).z
    }
}

/// Tracks the last command and joint velocity between cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactDisturbanceEstimator {
    dt: f64,
    last_command: JointVector,
    last_velocity: Option<JointVector>,
}

impl ContactDisturbanceEstimator {
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            last_command: JointVector::zeros(),
            last_velocity: None,
        }
    }

    /// Record the torque actually sent this cycle; used by the next estimate.
    pub fn record_command(&mut self, torque: &JointVector) {
        self.last_command = *torque;
    }

    pub const fn last_command(&self) -> &JointVector {
        &self.last_command
    }

    /// Joint acceleration by finite difference of velocity; zero on the first call.
    fn acceleration(&mut self, velocity: &JointVector) -> JointVector {
        let accel = self
            .last_velocity
            .map_or_else(JointVector::zeros, |prev| (velocity - prev) / self.dt);
        self.last_velocity = Some(*velocity);
        accel
    }

    pub fn estimate(
        &mut self,
        reading: &JointReading,
        dynamics: &LegDynamics,
    ) -> Result<DisturbanceEstimate, NumericalError> {
        let accel = self.acceleration(&reading.velocity);
        let predicted = dynamics.mass_matrix * accel + dynamics.gravity;
        let torque = self.last_command - predicted;

        let jt_pinv = dynamics
            .jacobian
            .transpose()
            .pseudo_inverse(PINV_EPS)
            .map_err(|_| NumericalError::Singular("jacobian pseudo-inverse"))?;
        let force = jt_pinv * torque;

        if force.iter().all(|v| v.is_finite()) {
            Ok(DisturbanceEstimate { torque, force })
        } else {
            Err(NumericalError::NonFinite("disturbance force"))
        }
    }

    pub fn reset(&mut self) {
        self.last_command = JointVector::zeros();
        self.last_velocity = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stride_core::types::LegSide;
    use stride_model::{InertialTable, RobotModel};
    use stride_test_utils::{BIPED_TABLE_TOML, standing_reading};

    fn dynamics(reading: &JointReading) -> LegDynamics {
        RobotModel::new(InertialTable::from_toml_str(BIPED_TABLE_TOML).unwrap(), 9.807)
            .dynamics(LegSide::Left, reading, &UnitQuaternion::identity())
            .unwrap()
    }

    #[test]
    fn holding_gravity_reads_no_contact() {
        let reading = standing_reading();
        let d = dynamics(&reading);
        let mut est = ContactDisturbanceEstimator::new(0.001);
        est.record_command(&d.gravity);
        let e = est.estimate(&reading, &d).unwrap();
        assert_relative_eq!(e.torque, JointVector::zeros(), epsilon = 1e-12);
        assert_relative_eq!(e.force, Vector3::zeros(), epsilon = 1e-9);
    }

    #[test]
    fn pushing_down_reads_as_load() {
        let reading = standing_reading();
        let d = dynamics(&reading);
        let push = Vector3::new(0.0, 0.0, -80.0);
        let mut est = ContactDisturbanceEstimator::new(0.001);
        est.record_command(&(d.gravity + d.jacobian.transpose() * push));
        let e = est.estimate(&reading, &d).unwrap();
        assert_relative_eq!(e.force, push, epsilon = 1e-8);
        assert_relative_eq!(e.normal_load(&UnitQuaternion::identity()), 80.0, epsilon = 1e-8);
    }

    #[test]
    fn normal_load_uses_world_vertical() {
        let e = DisturbanceEstimate {
            torque: JointVector::zeros(),
            force: Vector3::new(-60.0, 0.0, 0.0),
        };
        // Pitched 90 deg: body x maps to world -z.
        let pitch = UnitQuaternion::from_euler_angles(0.0, std::f64::consts::FRAC_PI_2, 0.0);
        assert_relative_eq!(e.normal_load(&pitch), -60.0, epsilon = 1e-9);
    }

    #[test]
    fn acceleration_is_finite_differenced() {
        let mut est = ContactDisturbanceEstimator::new(0.01);
        let first = est.acceleration(&JointVector::repeat(1.0));
        assert_relative_eq!(first, JointVector::zeros());
        let second = est.acceleration(&JointVector::repeat(1.5));
        assert_relative_eq!(second, JointVector::repeat(50.0), epsilon = 1e-9);
    }

    #[test]
    fn reset_clears_history() {
        let mut est = ContactDisturbanceEstimator::new(0.001);
        est.record_command(&JointVector::repeat(3.0));
        est.acceleration(&JointVector::repeat(1.0));
        est.reset();
        assert_eq!(est.last_command(), &JointVector::zeros());
        assert_relative_eq!(est.acceleration(&JointVector::repeat(9.0)), JointVector::zeros());
    }
}
