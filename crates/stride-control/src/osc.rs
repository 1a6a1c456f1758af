//! Operational-space control of the foot position.
//!
//! ```text
//! x_dd_des = kp (target - x)            (unless supplied)
//! F        = Mx x_dd_des
//! tau      = J^T F - Mq kv q_dot
//! ```
//!
//! Gravity is not compensated on this path. An optional posture term acts in
//! the task null space, and any registered [`SignalContributor`]s are folded
//! into the torque in registration order, each seeing the torque accumulated
//! so far.

use std::f64::consts::{PI, TAU};

use nalgebra::{Matrix4, Vector3};

use stride_core::config::OscConfig;
use stride_core::error::NumericalError;
use stride_core::types::{JointReading, JointVector, LegSide};
use stride_model::LegDynamics;

// ---------------------------------------------------------------------------
// Contributors
// ---------------------------------------------------------------------------

/// Everything a contributor may read about the current cycle.
#[derive(Debug, Clone, Copy)]
pub struct OscContext<'a> {
    pub side: LegSide,
    pub reading: &'a JointReading,
    pub dynamics: &'a LegDynamics,
}

/// Additive torque term applied after the primary task.
///
/// Contributors run in registration order; later ones see the increments of
/// earlier ones, so reordering them can change the result.
pub trait SignalContributor: Send {
    fn contribute(&self, torque: &JointVector, ctx: &OscContext<'_>) -> JointVector;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adds the model gravity torque `g`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GravityCompensation;

impl SignalContributor for GravityCompensation {
    fn contribute(&self, _torque: &JointVector, ctx: &OscContext<'_>) -> JointVector {
        ctx.dynamics.gravity
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "GravityCompensation"
    }
}

// ---------------------------------------------------------------------------
// Null-space posture
// ---------------------------------------------------------------------------

/// Posture regulation toward a rest configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NullSpacePosture {
    pub rest: JointVector,
    pub kp: f64,
    pub kv: f64,
}

impl NullSpacePosture {
    /// `Mq (kp wrap(rest - q) - kv q_dot)`, before filtering.
    pub fn torque(&self, reading: &JointReading, dynamics: &LegDynamics) -> JointVector {
        let error = (self.rest - reading.position).map(wrap_angle);
        dynamics.mass_matrix * (error * self.kp - reading.velocity * self.kv)
    }
}

/// Wrap an angle into `[-pi, pi)`.
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// `I - J^T (Mx J Mq^-1)`: removes the part of a torque that would
/// accelerate the foot.
pub fn null_space_filter(dynamics: &LegDynamics) -> Matrix4<f64> {
    let dyn_inv = dynamics.task_mass * dynamics.jacobian * dynamics.mass_matrix_inv;
    Matrix4::identity() - dynamics.jacobian.transpose() * dyn_inv
}

// ---------------------------------------------------------------------------
// OperationalSpaceController
// ---------------------------------------------------------------------------

/// Torque and the task acceleration it was built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscOutput {
    pub torque: JointVector,
    pub acceleration: Vector3<f64>,
}

pub struct OperationalSpaceController {
    kp: f64,
    kv: f64,
    null_space: Option<NullSpacePosture>,
    contributors: Vec<Box<dyn SignalContributor>>,
}

impl OperationalSpaceController {
    pub const fn new(kp: f64, kv: f64) -> Self {
        Self {
            kp,
            kv,
            null_space: None,
            contributors: Vec::new(),
        }
    }

    /// Gains and null-space term from config; registers
    /// [`GravityCompensation`] when enabled.
    pub fn from_config(config: &OscConfig) -> Self {
        let mut osc = Self::new(config.kp, config.kv);
        if config.null_space {
            osc.null_space = Some(NullSpacePosture {
                rest: config.rest_posture(),
                kp: config.null_kp,
                kv: config.null_kv,
            });
        }
        if config.gravity_compensation {
            osc.register(Box::new(GravityCompensation));
        }
        osc
    }

    #[must_use]
    pub const fn with_null_space(mut self, posture: NullSpacePosture) -> Self {
        self.null_space = Some(posture);
        self
    }

    /// Append a contributor; it runs after every earlier registration.
    pub fn register(&mut self, contributor: Box<dyn SignalContributor>) {
        self.contributors.push(contributor);
    }

    pub fn contributor_names(&self) -> Vec<&str> {
        self.contributors.iter().map(|c| c.name()).collect()
    }

    pub const fn kp(&self) -> f64 {
        self.kp
    }

    /// `kp (target - position)`.
    pub fn desired_acceleration(&self, target: &Vector3<f64>, position: &Vector3<f64>) -> Vector3<f64> {
        (target - position) * self.kp
    }

    /// Joint torque driving the foot toward `target` (hip frame).
    ///
    /// `acceleration` overrides the proportional law when given.
    pub fn control(
        &self,
        side: LegSide,
        reading: &JointReading,
        dynamics: &LegDynamics,
        target: &Vector3<f64>,
        acceleration: Option<Vector3<f64>>,
    ) -> Result<OscOutput, NumericalError> {
        let acceleration =
            acceleration.unwrap_or_else(|| self.desired_acceleration(target, &dynamics.foot_position));
        let force = dynamics.task_mass * acceleration;
        let mut torque = dynamics.jacobian.transpose() * force
            - dynamics.mass_matrix * (reading.velocity * self.kv);

        if let Some(posture) = &self.null_space {
            torque += null_space_filter(dynamics) * posture.torque(reading, dynamics);
        }

        let ctx = OscContext {
            side,
            reading,
            dynamics,
        };
        for contributor in &self.contributors {
            torque += contributor.contribute(&torque, &ctx);
        }

        if torque.iter().all(|v| v.is_finite()) {
            Ok(OscOutput {
                torque,
                acceleration,
            })
        } else {
            Err(NumericalError::NonFinite("osc torque"))
        }
    }
}

impl std::fmt::Debug for OperationalSpaceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationalSpaceController")
            .field("kp", &self.kp)
            .field("kv", &self.kv)
            .field("null_space", &self.null_space)
            .field("contributors", &self.contributor_names())
            .finish()
    }
}
