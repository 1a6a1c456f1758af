//! Force QP: minimal correction of a reference reaction force.
//!
//! Decision variables `z = [d_fr (3), d_f (4)]`:
//!
//! ```text
//! minimize    |d_fr|^2 + |d_f|^2
//! subject to  Mq (q_dd_des + d_f) - g = J^T (fr0 + d_fr)    (dynamics)
//!             fr0 + d_fr >= 0                               (unilateral)
//! ```
//!
//! Solved with Clarabel. The dynamics rows are rearranged to
//! `Mq d_f - J^T d_fr = J^T fr0 - Mq q_dd_des + g` (zero cone) and the
//! unilateral rows to `-d_fr <= fr0` (nonnegative cone). Since `Mq` is
//! invertible the problem is always feasible; any non-converged status is
//! still reported as a failure rather than replaced by a default.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, Matrix3x4, Matrix4, Vector3};

use stride_core::config::QpConfig;
use stride_core::error::NumericalError;
use stride_core::types::JointVector;

const N_FORCE: usize = 3;
const N_ACCEL: usize = 4;
const N_VARS: usize = N_FORCE + N_ACCEL;

/// Inputs of one force QP. `jacobian` and `reference_force` must share a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceQpProblem {
    /// Reference reaction force fr0.
    pub reference_force: Vector3<f64>,
    /// Translational foot Jacobian J.
    pub jacobian: Matrix3x4<f64>,
    /// Joint-space mass matrix Mq.
    pub mass_matrix: Matrix4<f64>,
    /// Gravity torque g.
    pub gravity: JointVector,
    /// Desired joint acceleration, typically `J^T x_dd_des`.
    pub joint_acceleration: JointVector,
}

impl ForceQpProblem {
    /// Dynamics residual `Mq (q_dd + d_f) - g - J^T (fr0 + d_fr)` of a candidate.
    pub fn residual(&self, correction: &ForceCorrection) -> JointVector {
        self.mass_matrix * (self.joint_acceleration + correction.accel_delta)
            - self.gravity
            - self.jacobian.transpose() * (self.reference_force + correction.force_delta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceCorrection {
    /// d_fr.
    pub force_delta: Vector3<f64>,
    /// d_f.
    pub accel_delta: JointVector,
    /// `|d_fr|^2 + |d_f|^2`.
    pub objective: f64,
}

impl ForceCorrection {
    /// `fr0 + d_fr`.
    pub fn corrected_force(&self, reference: &Vector3<f64>) -> Vector3<f64> {
        reference + self.force_delta
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceQp {
    max_iter: u32,
    tolerance: f64,
}

impl ForceQp {
    pub const fn new(max_iter: u32, tolerance: f64) -> Self {
        Self {
            max_iter,
            tolerance,
        }
    }

    pub const fn from_config(config: &QpConfig) -> Self {
        Self::new(config.max_iter, config.tolerance)
    }

    pub fn solve(&self, problem: &ForceQpProblem) -> Result<ForceCorrection, NumericalError> {
        let jt = problem.jacobian.transpose();

        // Cost: 0.5 z^T P z with P = 2 I.
        let p_mat = DMatrix::<f64>::identity(N_VARS, N_VARS) * 2.0;
        let q_vec = vec![0.0; N_VARS];

        let mut a_mat = DMatrix::<f64>::zeros(N_ACCEL + N_FORCE, N_VARS);
        a_mat
            .view_mut((0, 0), (N_ACCEL, N_FORCE))
            .copy_from(&(-jt));
        a_mat
            .view_mut((0, N_FORCE), (N_ACCEL, N_ACCEL))
            .copy_from(&problem.mass_matrix);
        for i in 0..N_FORCE {
            a_mat[(N_ACCEL + i, i)] = -1.0;
        }

        let rhs = jt * problem.reference_force - problem.mass_matrix * problem.joint_acceleration
            + problem.gravity;
        let b_vec: Vec<f64> = rhs
            .iter()
            .chain(problem.reference_force.iter())
            .copied()
            .collect();

        if a_mat.iter().chain(b_vec.iter()).any(|v| !v.is_finite()) {
            return Err(NumericalError::NonFinite("force QP data"));
        }

        let p_csc = dmatrix_to_csc(&p_mat, true);
        let a_csc = dmatrix_to_csc(&a_mat, false);
        let cones = [ZeroConeT(N_ACCEL), NonnegativeConeT(N_FORCE)];

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.max_iter)
            .verbose(false)
            .tol_gap_abs(self.tolerance)
            .tol_gap_rel(self.tolerance)
            .tol_feas(self.tolerance)
            .build()
            .map_err(|_| NumericalError::QpFailed("invalid solver settings"))?;

        let mut solver = DefaultSolver::new(&p_csc, &q_vec, &a_csc, &b_vec, &cones, settings)
            .map_err(|_| NumericalError::QpFailed("solver setup rejected the problem"))?;
        solver.solve();

        let sol = &solver.solution;
        match sol.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {}
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                return Err(NumericalError::QpFailed("primal infeasible"));
            }
            SolverStatus::MaxIterations => {
                return Err(NumericalError::QpFailed("iteration limit reached"));
            }
            _ => return Err(NumericalError::QpFailed("solver did not converge")),
        }
        if sol.x.len() != N_VARS || sol.x.iter().any(|v| !v.is_finite()) {
            return Err(NumericalError::NonFinite("force QP solution"));
        }

        let force_delta = Vector3::from_column_slice(&sol.x[..N_FORCE]);
        let accel_delta = JointVector::from_column_slice(&sol.x[N_FORCE..]);
        Ok(ForceCorrection {
            force_delta,
            accel_delta,
            objective: force_delta.norm_squared() + accel_delta.norm_squared(),
        })
    }
}

/// Dense `DMatrix` to Clarabel CSC, dropping exact zeros. With `upper` set,
/// only entries on or above the diagonal are kept (Clarabel's `P` format).
fn dmatrix_to_csc(m: &DMatrix<f64>, upper: bool) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = Vec::with_capacity(ncols + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    colptr.push(0);
    for (j, column) in m.column_iter().enumerate() {
        let rows = if upper { (j + 1).min(nrows) } else { nrows };
        for (i, &v) in column.iter().take(rows).enumerate() {
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr.push(rowval.len());
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use stride_core::types::{JointReading, LegSide};
    use stride_model::{InertialTable, LegDynamics, RobotModel};
    use stride_test_utils::{BIPED_TABLE_TOML, standing_reading};

    fn dynamics() -> LegDynamics {
        RobotModel::new(InertialTable::from_toml_str(BIPED_TABLE_TOML).unwrap(), 9.807)
            .dynamics(LegSide::Left, &standing_reading(), &UnitQuaternion::identity())
            .unwrap()
    }

    fn qp() -> ForceQp {
        ForceQp::from_config(&QpConfig::default())
    }

    /// A problem whose reference force already satisfies the dynamics.
    fn consistent_problem(force: Vector3<f64>) -> ForceQpProblem {
        let d = dynamics();
        let q_dd = d.mass_matrix_inv * (d.jacobian.transpose() * force + d.gravity);
        ForceQpProblem {
            reference_force: force,
            jacobian: d.jacobian,
            mass_matrix: d.mass_matrix,
            gravity: d.gravity,
            joint_acceleration: q_dd,
        }
    }

    fn problem(force: Vector3<f64>, q_dd: JointVector) -> ForceQpProblem {
        let d = dynamics();
        ForceQpProblem {
            reference_force: force,
            jacobian: d.jacobian,
            mass_matrix: d.mass_matrix,
            gravity: d.gravity,
            joint_acceleration: q_dd,
        }
    }

    #[test]
    fn consistent_nonnegative_reference_needs_no_correction() {
        let problem = consistent_problem(Vector3::new(2.0, 1.0, 49.0));
        let sol = qp().solve(&problem).unwrap();
        assert_relative_eq!(sol.force_delta, Vector3::zeros(), epsilon = 1e-6);
        assert_relative_eq!(sol.accel_delta, JointVector::zeros(), epsilon = 1e-6);
        assert!(sol.objective < 1e-10);
    }

    #[test]
    fn correction_satisfies_dynamics() {
        let problem = problem(Vector3::new(0.0, 0.0, 49.0), JointVector::new(0.5, -2.0, 1.0, 3.0));
        let sol = qp().solve(&problem).unwrap();
        assert_relative_eq!(problem.residual(&sol), JointVector::zeros(), epsilon = 1e-6);
        let fr = sol.corrected_force(&problem.reference_force);
        assert!(fr.iter().all(|&f| f >= -1e-7), "fr = {fr}");
        assert!(sol.objective > 0.0);
    }

    #[test]
    fn negative_reference_is_pushed_to_nonnegative() {
        let problem = consistent_problem(Vector3::new(-5.0, 0.0, 30.0));
        let sol = qp().solve(&problem).unwrap();
        let fr = sol.corrected_force(&problem.reference_force);
        assert!(fr.x >= -1e-7, "fr = {fr}");
        assert!(fr.z >= -1e-7, "fr = {fr}");
        assert_relative_eq!(problem.residual(&sol), JointVector::zeros(), epsilon = 1e-6);
    }

    #[test]
    fn correction_is_minimal() {
        // Any other feasible point costs at least as much as the optimum.
        let problem = problem(Vector3::new(0.0, 0.0, 20.0), JointVector::new(0.0, 1.0, -1.0, 0.0));
        let sol = qp().solve(&problem).unwrap();

        // Feasible alternative: keep d_fr = 0 and absorb everything into d_f.
        let d = dynamics();
        let accel_only = d.mass_matrix_inv
            * (d.jacobian.transpose() * problem.reference_force + d.gravity)
            - problem.joint_acceleration;
        assert!(sol.objective <= accel_only.norm_squared() + 1e-6);
    }

    #[test]
    fn non_finite_input_is_reported() {
        let mut problem = consistent_problem(Vector3::new(0.0, 0.0, 40.0));
        problem.gravity[1] = f64::NAN;
        let err = qp().solve(&problem).unwrap_err();
        assert_eq!(err, NumericalError::NonFinite("force QP data"));
    }

    #[test]
    fn moving_leg_problem_solves() {
        let reading = JointReading::new(
            stride_test_utils::standing_pose(),
            JointVector::new(0.1, -0.3, 0.2, 0.0),
        );
        let d = RobotModel::new(InertialTable::from_toml_str(BIPED_TABLE_TOML).unwrap(), 9.807)
            .dynamics(LegSide::Right, &reading, &UnitQuaternion::identity())
            .unwrap();
        let problem = ForceQpProblem {
            reference_force: Vector3::new(0.0, 0.0, 98.0),
            jacobian: d.jacobian,
            mass_matrix: d.mass_matrix,
            gravity: d.gravity,
            joint_acceleration: d.jacobian.transpose() * Vector3::new(1.0, 0.0, -3.0),
        };
        let sol = qp().solve(&problem).unwrap();
        assert_relative_eq!(problem.residual(&sol), JointVector::zeros(), epsilon = 1e-6);
    }

    #[test]
    fn csc_conversion_keeps_nonzeros() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let csc = dmatrix_to_csc(&m, false);
        assert_eq!(csc.colptr, vec![0, 1, 2, 3]);
        assert_eq!(csc.rowval, vec![0, 1, 0]);
        assert_eq!(csc.nzval, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn upper_csc_drops_lower_triangle() {
        let m = DMatrix::from_row_slice(3, 3, &[2.0, 1.0, 0.0, 1.0, 3.0, 4.0, 0.0, 4.0, 5.0]);
        let full = dmatrix_to_csc(&m, false);
        assert_eq!(full.colptr, vec![0, 2, 5, 7]);
        assert_eq!(full.rowval, vec![0, 1, 0, 1, 2, 1, 2]);
        assert_eq!(full.nzval, vec![2.0, 1.0, 1.0, 3.0, 4.0, 4.0, 5.0]);

        let upper = dmatrix_to_csc(&m, true);
        assert_eq!(upper.colptr, vec![0, 1, 3, 5]);
        assert_eq!(upper.rowval, vec![0, 0, 1, 1, 2]);
        assert_eq!(upper.nzval, vec![2.0, 1.0, 3.0, 4.0, 5.0]);
    }
}
