//! Stand-in hardware for running the controller without a robot.

use nalgebra::{UnitQuaternion, Vector3};

use stride_core::traits::Hardware;
use stride_core::types::{JointReading, JointVector, LEG_COUNT, LegCommand, SensorFrame};

/// A biped clamped on a test stand: both legs hold a knee-bent pose and the
/// body is level and still. Commands are tallied, never applied.
#[derive(Debug, Clone)]
pub struct BenchHardware {
    reading: JointReading,
    commands: u64,
    peak_torque: f64,
}

impl BenchHardware {
    pub fn new() -> Self {
        Self {
            reading: JointReading::new(
                JointVector::new(0.0, 0.5, -1.0, 0.5),
                JointVector::zeros(),
            ),
            commands: 0,
            peak_torque: 0.0,
        }
    }

    pub const fn commands(&self) -> u64 {
        self.commands
    }

    /// Largest absolute joint torque commanded so far (N m).
    pub const fn peak_torque(&self) -> f64 {
        self.peak_torque
    }
}

impl Default for BenchHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl Hardware for BenchHardware {
    fn read(&mut self) -> SensorFrame {
        SensorFrame {
            legs: [Some(self.reading); LEG_COUNT],
            orientation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
        }
    }

    fn command(&mut self, commands: &[LegCommand; LEG_COUNT]) {
        self.commands += 1;
        let peak = commands
            .iter()
            .flat_map(|c| c.torque.iter())
            .fold(0.0_f64, |acc, t| acc.max(t.abs()));
        self.peak_torque = self.peak_torque.max(peak);
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "BenchHardware"
    }
}
