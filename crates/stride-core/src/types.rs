use std::fmt;

use nalgebra::{UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Number of actuated joints per leg.
pub const JOINTS_PER_LEG: usize = 4;

/// Number of legs driven by the controller.
pub const LEG_COUNT: usize = 2;

/// Joint-space vector for one leg (positions, velocities or torques).
pub type JointVector = Vector4<f64>;

// ---------------------------------------------------------------------------
// LegSide
// ---------------------------------------------------------------------------

/// Which leg of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegSide {
    Left,
    Right,
}

impl LegSide {
    /// Both legs in processing order.
    pub const ALL: [Self; LEG_COUNT] = [Self::Left, Self::Right];

    /// Index into per-leg arrays.
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    /// Lateral sign: +1 for the left leg, -1 for the right.
    pub const fn lateral_sign(self) -> f64 {
        match self {
            Self::Left => 1.0,
            Self::Right => -1.0,
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for LegSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

// ---------------------------------------------------------------------------
// ContactPhase
// ---------------------------------------------------------------------------

/// Binary contact phase, used for both the schedule and the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactPhase {
    Swing,
    Stance,
}

impl ContactPhase {
    pub const fn is_stance(self) -> bool {
        matches!(self, Self::Stance)
    }

    pub const fn from_stance(stance: bool) -> Self {
        if stance { Self::Stance } else { Self::Swing }
    }
}

/// Scheduled and estimated contact for one leg in the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactFlags {
    pub scheduled: ContactPhase,
    pub estimated: ContactPhase,
}

// ---------------------------------------------------------------------------
// Sensor / actuator values
// ---------------------------------------------------------------------------

/// Encoder reading for one leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointReading {
    pub position: JointVector,
    pub velocity: JointVector,
}

impl JointReading {
    pub fn new(position: JointVector, velocity: JointVector) -> Self {
        Self { position, velocity }
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.position.iter().chain(self.velocity.iter()).all(|v| v.is_finite())
    }

    /// Apply per-joint direction signs (encoder convention to controller convention).
    pub fn with_directions(&self, directions: &JointVector) -> Self {
        Self {
            position: self.position.component_mul(directions),
            velocity: self.velocity.component_mul(directions),
        }
    }
}

/// One tick worth of sensor data from the hardware boundary.
///
/// A leg reading of `None` marks a dropout for that leg this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    pub legs: [Option<JointReading>; LEG_COUNT],
    /// Body orientation, body frame to world frame.
    pub orientation: UnitQuaternion<f64>,
    /// Body linear velocity in the world frame.
    pub linear_velocity: Vector3<f64>,
}

impl SensorFrame {
    pub fn leg(&self, side: LegSide) -> Option<&JointReading> {
        self.legs[side.index()].as_ref()
    }
}

/// Per-leg joint torque command. Consumed only by the actuator boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegCommand {
    pub torque: JointVector,
}

impl LegCommand {
    pub fn zero() -> Self {
        Self {
            torque: JointVector::zeros(),
        }
    }

    pub fn new(torque: JointVector) -> Self {
        Self { torque }
    }
}

impl Default for LegCommand {
    fn default() -> Self {
        Self::zero()
    }
}

// ---------------------------------------------------------------------------
// RobotState
// ---------------------------------------------------------------------------

/// Latest known robot state, refreshed from the sensor boundary every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    pub legs: [JointReading; LEG_COUNT],
    pub orientation: UnitQuaternion<f64>,
    pub linear_velocity: Vector3<f64>,
}

impl RobotState {
    /// All joints at zero with the body level and at rest.
    pub fn at_rest() -> Self {
        let zero = JointReading::new(JointVector::zeros(), JointVector::zeros());
        Self {
            legs: [zero; LEG_COUNT],
            orientation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
        }
    }

    pub fn leg(&self, side: LegSide) -> &JointReading {
        &self.legs[side.index()]
    }

    /// Body yaw angle (rotation about world z).
    pub fn yaw(&self) -> f64 {
        self.orientation.euler_angles().2
    }
}
