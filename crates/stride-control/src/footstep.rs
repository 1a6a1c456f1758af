//! Raibert-heuristic foot placement.
//!
//! ```text
//! target = Rz(yaw) [0, l, 0] + (T_st / 2) v + k (v - v_d) + 0.5 sqrt(h / g) (v x w_d)
//! ```
//!
//! `l` is the signed hip offset (left positive), `T_st` the stance duration,
//! `h` the stance height. Targets are relative to the body centre in a
//! world-aligned frame.

use nalgebra::{Rotation3, Vector3};

use stride_core::config::StrideConfig;
use stride_core::types::LegSide;

#[derive(Debug, Clone, PartialEq)]
pub struct FootstepPlanner {
    hip_offset: f64,
    stance_duration: f64,
    gain: f64,
    stance_height: f64,
    gravity: f64,
    desired_velocity: Vector3<f64>,
    desired_angular_rate: Vector3<f64>,
}

impl FootstepPlanner {
    pub fn from_config(config: &StrideConfig) -> Self {
        Self {
            hip_offset: config.body.hip_offset,
            stance_duration: config.stance_duration(),
            gain: config.footstep.raibert_gain,
            stance_height: config.body.stance_height,
            gravity: config.body.gravity,
            desired_velocity: config.footstep.desired_velocity(),
            desired_angular_rate: config.footstep.desired_angular_rate(),
        }
    }

    pub fn set_desired_velocity(&mut self, velocity: Vector3<f64>) {
        self.desired_velocity = velocity;
    }

    pub fn set_desired_angular_rate(&mut self, rate: Vector3<f64>) {
        self.desired_angular_rate = rate;
    }

    pub const fn desired_velocity(&self) -> &Vector3<f64> {
        &self.desired_velocity
    }

    /// Hip position under `yaw`, the zero-velocity footstep.
    pub fn hip(&self, side: LegSide, yaw: f64) -> Vector3<f64> {
        Rotation3::from_axis_angle(&Vector3::z_axis(), yaw)
            * Vector3::new(0.0, side.lateral_sign() * self.hip_offset, 0.0)
    }

    /// Footstep for `side` given body yaw and measured body velocity `v`.
    pub fn plan(&self, side: LegSide, yaw: f64, v: &Vector3<f64>) -> Vector3<f64> {
        let symmetry = v * (self.stance_duration / 2.0);
        let feedback = (v - self.desired_velocity) * self.gain;
        let centrifugal =
            v.cross(&self.desired_angular_rate) * (0.5 * (self.stance_height / self.gravity).sqrt());
        self.hip(side, yaw) + symmetry + feedback + centrifugal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn planner() -> FootstepPlanner {
        FootstepPlanner::from_config(&StrideConfig::default())
    }

    #[test]
    fn at_rest_target_is_rotated_hip() {
        let p = planner();
        let zero = Vector3::zeros();
        assert_eq!(p.plan(LegSide::Left, 0.0, &zero), Vector3::new(0.0, 0.144, 0.0));
        assert_eq!(p.plan(LegSide::Right, 0.0, &zero), Vector3::new(0.0, -0.144, 0.0));
        assert_eq!(p.plan(LegSide::Left, 0.4, &zero), p.hip(LegSide::Left, 0.4));
    }

    #[test]
    fn yaw_rotates_hip_offset() {
        let p = planner();
        // Yawed 90 deg left: the left hip points backwards (-x).
        let hip = p.hip(LegSide::Left, FRAC_PI_2);
        assert_relative_eq!(hip, Vector3::new(-0.144, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn forward_velocity_places_foot_ahead() {
        let p = planner();
        let v = Vector3::new(0.4, 0.0, 0.0);
        let target = p.plan(LegSide::Left, 0.0, &v);
        // (0.375 / 2) * 0.4 + 0.5 * 0.4
        assert_relative_eq!(target.x, 0.075 + 0.2, epsilon = 1e-12);
        assert_relative_eq!(target.y, 0.144, epsilon = 1e-12);
    }

    #[test]
    fn tracking_desired_velocity_cancels_feedback() {
        let mut p = planner();
        let v = Vector3::new(0.4, 0.1, 0.0);
        p.set_desired_velocity(v);
        let target = p.plan(LegSide::Right, 0.0, &v);
        assert_relative_eq!(target, Vector3::new(0.075, -0.144 + 0.01875, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn turning_adds_centrifugal_term() {
        let mut p = planner();
        p.set_desired_velocity(Vector3::new(0.4, 0.0, 0.0));
        p.set_desired_angular_rate(Vector3::new(0.0, 0.0, 1.0));
        let v = Vector3::new(0.4, 0.0, 0.0);
        let target = p.plan(LegSide::Left, 0.0, &v);
        // v x w = (0, -0.4, 0)
        let expected_y = 0.144 - 0.4 * 0.5 * (0.7_f64 / 9.807).sqrt();
        assert_relative_eq!(target.y, expected_y, epsilon = 1e-12);
    }
}
