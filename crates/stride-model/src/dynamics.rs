//! Joint-space and task-space dynamics of one leg.
//!
//! Mass matrix from the link COM Jacobians:
//! `Mq = sum_k (Jv_k^T m_k Jv_k + Jw_k^T I_k Jw_k)`,
//! gravity torque `g = -sum_k Jv_k^T m_k a_g`, and the foot task-space mass
//! `Mx = (J Mq^-1 J^T)^-1`.

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Vector3};

use stride_core::error::NumericalError;
use stride_core::types::{JOINTS_PER_LEG, JointVector};

use crate::leg::{LegModel, angular_jacobian, point_jacobian};

/// Relative determinant threshold below which `J Mq^-1 J^T` counts as singular.
const TASK_SINGULARITY_EPS: f64 = 1e-10;

/// Per-cycle dynamics of one leg, expressed in the hip frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LegDynamics {
    /// Joint-space mass matrix Mq.
    pub mass_matrix: Matrix4<f64>,
    /// Mq^-1.
    pub mass_matrix_inv: Matrix4<f64>,
    /// Translational foot Jacobian J.
    pub jacobian: Matrix3x4<f64>,
    /// Task-space (foot) mass matrix Mx.
    pub task_mass: Matrix3<f64>,
    /// Gravity torque g.
    pub gravity: JointVector,
    /// Foot position relative to the hip.
    pub foot_position: Vector3<f64>,
    /// Foot velocity `J q_dot`.
    pub foot_velocity: Vector3<f64>,
}

impl LegModel {
    /// Evaluate the leg dynamics at `(q, q_dot)`.
    ///
    /// `gravity` is the gravitational acceleration expressed in the hip frame,
    /// e.g. `[0, 0, -9.807]` for a level body.
    pub fn dynamics(
        &self,
        q: &JointVector,
        qd: &JointVector,
        gravity: &Vector3<f64>,
    ) -> Result<LegDynamics, NumericalError> {
        let frames = self.frames(q);

        let mut mass_matrix = Matrix4::zeros();
        let mut gravity_torque = JointVector::zeros();
        for (k, link) in self.links().iter().enumerate() {
            let jv = point_jacobian(&frames, &frames.coms[k], k + 1);
            let jw = angular_jacobian(&frames, k + 1);
            let r = frames.rotations[k].to_rotation_matrix().into_inner();
            let inertia = r * link.inertia * r.transpose();

            mass_matrix += jv.transpose() * jv * link.mass + jw.transpose() * inertia * jw;
            gravity_torque -= jv.transpose() * (gravity * link.mass);
        }

        let mass_matrix_inv = mass_matrix
            .cholesky()
            .ok_or(NumericalError::Singular("joint-space mass matrix"))?
            .inverse();

        let jacobian = point_jacobian(&frames, &frames.foot, JOINTS_PER_LEG);
        let task_mass = task_space_mass(&jacobian, &mass_matrix_inv)?;

        let dynamics = LegDynamics {
            mass_matrix,
            mass_matrix_inv,
            jacobian,
            task_mass,
            gravity: gravity_torque,
            foot_position: frames.foot,
            foot_velocity: jacobian * qd,
        };
        if dynamics.is_finite() {
            Ok(dynamics)
        } else {
            Err(NumericalError::NonFinite("leg dynamics"))
        }
    }
}

/// `Mx = (J Mq^-1 J^T)^-1`, rejecting near-singular configurations.
pub fn task_space_mass(
    jacobian: &Matrix3x4<f64>,
    mass_matrix_inv: &Matrix4<f64>,
) -> Result<Matrix3<f64>, NumericalError> {
    let lambda_inv = jacobian * mass_matrix_inv * jacobian.transpose();
    let scale = (lambda_inv.trace() / 3.0).abs().powi(3);
    if lambda_inv.determinant().abs() <= TASK_SINGULARITY_EPS * scale {
        return Err(NumericalError::Singular("task-space mass matrix"));
    }
    lambda_inv
        .try_inverse()
        .ok_or(NumericalError::Singular("task-space mass matrix"))
}

impl LegDynamics {
    pub fn is_finite(&self) -> bool {
        self.mass_matrix.iter().all(|v| v.is_finite())
            && self.mass_matrix_inv.iter().all(|v| v.is_finite())
            && self.jacobian.iter().all(|v| v.is_finite())
            && self.task_mass.iter().all(|v| v.is_finite())
            && self.gravity.iter().all(|v| v.is_finite())
            && self.foot_position.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inertia::InertialTable;
    use approx::assert_relative_eq;
    use stride_core::types::LegSide;
    use stride_test_utils::{BIPED_TABLE_TOML, standing_pose};

    fn g() -> Vector3<f64> {
        Vector3::new(0.0, 0.0, -9.807)
    }

    fn left_leg() -> LegModel {
        let table = InertialTable::from_toml_str(BIPED_TABLE_TOML).unwrap();
        LegModel::from_table(&table, LegSide::Left)
    }

    fn potential_energy(leg: &LegModel, q: &JointVector) -> f64 {
        let frames = leg.frames(q);
        leg.links()
            .iter()
            .zip(frames.coms.iter())
            .map(|(link, com)| -link.mass * g().dot(com))
            .sum()
    }

    #[test]
    fn mass_matrix_symmetric_positive_definite() {
        let leg = left_leg();
        let dyn_ = leg
            .dynamics(&standing_pose(), &JointVector::zeros(), &g())
            .unwrap();
        assert_relative_eq!(dyn_.mass_matrix, dyn_.mass_matrix.transpose(), epsilon = 1e-12);
        assert!(dyn_.mass_matrix.cholesky().is_some());
        assert_relative_eq!(
            dyn_.mass_matrix * dyn_.mass_matrix_inv,
            Matrix4::identity(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn task_mass_inverts_projected_inertia() {
        let leg = left_leg();
        let dyn_ = leg
            .dynamics(&standing_pose(), &JointVector::zeros(), &g())
            .unwrap();
        let lambda_inv = dyn_.jacobian * dyn_.mass_matrix_inv * dyn_.jacobian.transpose();
        assert_relative_eq!(dyn_.task_mass * lambda_inv, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn gravity_matches_potential_gradient() {
        let leg = left_leg();
        let q = JointVector::new(0.2, 0.5, -1.0, 0.4);
        let dyn_ = leg.dynamics(&q, &JointVector::zeros(), &g()).unwrap();
        let h = 1e-6;
        for i in 0..JOINTS_PER_LEG {
            let mut qp = q;
            let mut qm = q;
            qp[i] += h;
            qm[i] -= h;
            let grad = (potential_energy(&leg, &qp) - potential_energy(&leg, &qm)) / (2.0 * h);
            assert_relative_eq!(dyn_.gravity[i], grad, epsilon = 1e-6);
        }
    }

    #[test]
    fn hanging_leg_has_no_gravity_torque() {
        let leg = left_leg();
        let dyn_ = leg
            .dynamics(&JointVector::zeros(), &JointVector::zeros(), &g())
            .err();
        // Fully extended: the task-space mass is singular.
        assert_eq!(dyn_, Some(NumericalError::Singular("task-space mass matrix")));

        let frames = leg.frames(&JointVector::zeros());
        let mut torque = JointVector::zeros();
        for (k, link) in leg.links().iter().enumerate() {
            torque -= point_jacobian(&frames, &frames.coms[k], k + 1).transpose() * (g() * link.mass);
        }
        assert_relative_eq!(torque, JointVector::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn foot_velocity_is_jacobian_times_qdot() {
        let leg = left_leg();
        let qd = JointVector::new(0.1, -0.2, 0.3, 0.0);
        let dyn_ = leg.dynamics(&standing_pose(), &qd, &g()).unwrap();
        assert_relative_eq!(dyn_.foot_velocity, dyn_.jacobian * qd);
    }

    #[test]
    fn zero_gravity_gives_zero_gravity_torque() {
        let leg = left_leg();
        let dyn_ = leg
            .dynamics(&standing_pose(), &JointVector::zeros(), &Vector3::zeros())
            .unwrap();
        assert_relative_eq!(dyn_.gravity, JointVector::zeros());
    }
}
