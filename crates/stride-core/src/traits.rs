use nalgebra::{UnitQuaternion, Vector3};

use crate::types::{LEG_COUNT, LegCommand, SensorFrame};

// ---------------------------------------------------------------------------
// Hardware
// ---------------------------------------------------------------------------

/// Sensor/actuator boundary of the robot.
///
/// Readings and commands use the hardware's own joint sign conventions; the
/// runner converts to and from controller conventions.
pub trait Hardware: Send {
    /// Read encoders, orientation and body velocity for the current tick.
    fn read(&mut self) -> SensorFrame;

    /// Send one torque command per leg, in [`LegSide`](crate::types::LegSide) order.
    fn command(&mut self, commands: &[LegCommand; LEG_COUNT]);

    /// Human-readable name for this hardware backend.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

// ---------------------------------------------------------------------------
// ForcePlanner
// ---------------------------------------------------------------------------

/// Input to a force-plan refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcePlanRequest {
    /// Body orientation, body frame to world frame.
    pub orientation: UnitQuaternion<f64>,
    /// Latest planned footstep per leg, relative to the body centre (world-aligned).
    pub footsteps: [Vector3<f64>; LEG_COUNT],
    /// Legs currently treated as load-bearing.
    pub in_contact: [bool; LEG_COUNT],
}

/// Slower-rate reference ground-reaction-force provider.
///
/// Returns one world-frame reaction force per leg (force exerted by the
/// ground on the foot).
pub trait ForcePlanner: Send {
    fn plan(&mut self, request: &ForcePlanRequest) -> [Vector3<f64>; LEG_COUNT];

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
