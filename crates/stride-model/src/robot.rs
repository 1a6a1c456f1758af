//! The robot model handed to every controller stage.

use nalgebra::{UnitQuaternion, Vector3};
use tracing::info;

use stride_core::error::NumericalError;
use stride_core::types::{JointReading, LEG_COUNT, LegSide};

use crate::dynamics::LegDynamics;
use crate::inertia::InertialTable;
use crate::leg::LegModel;

/// Immutable model of both legs, built once at startup from an [`InertialTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct RobotModel {
    table: InertialTable,
    legs: [LegModel; LEG_COUNT],
    gravity: f64,
}

impl RobotModel {
    /// `gravity` is the magnitude of gravitational acceleration (m/s^2).
    pub fn new(table: InertialTable, gravity: f64) -> Self {
        let legs = LegSide::ALL.map(|side| LegModel::from_table(&table, side));
        info!(
            total_mass = table.total_mass(),
            leg_length = table.leg_length(LegSide::Left),
            gravity,
            "robot model built"
        );
        Self {
            table,
            legs,
            gravity,
        }
    }

    pub fn leg(&self, side: LegSide) -> &LegModel {
        &self.legs[side.index()]
    }

    pub const fn table(&self) -> &InertialTable {
        &self.table
    }

    pub const fn gravity(&self) -> f64 {
        self.gravity
    }

    /// Gravitational acceleration in the hip frame for a body `orientation`.
    pub fn gravity_in_body(&self, orientation: &UnitQuaternion<f64>) -> Vector3<f64> {
        orientation.inverse_transform_vector(&Vector3::new(0.0, 0.0, -self.gravity))
    }

    /// Dynamics of one leg at the sensed joint state.
    pub fn dynamics(
        &self,
        side: LegSide,
        reading: &JointReading,
        orientation: &UnitQuaternion<f64>,
    ) -> Result<LegDynamics, NumericalError> {
        let gravity = self.gravity_in_body(orientation);
        self.leg(side)
            .dynamics(&reading.position, &reading.velocity, &gravity)
    }
}
