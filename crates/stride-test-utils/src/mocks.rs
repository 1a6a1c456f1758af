//! Hardware stand-ins for controller tests.

use std::ops::Range;

use nalgebra::{UnitQuaternion, Vector3};
use stride_core::traits::Hardware;
use stride_core::types::{JointReading, LEG_COUNT, LegCommand, LegSide, SensorFrame};

use crate::fixtures::standing_reading;

// ---------------------------------------------------------------------------
// StaticHardware
// ---------------------------------------------------------------------------

/// Hardware that reports a fixed pose and records every command it receives.
///
/// Individual legs can be made to drop out for a range of reads, which
/// exercises the per-leg fault path.
pub struct StaticHardware {
    readings: [JointReading; LEG_COUNT],
    orientation: UnitQuaternion<f64>,
    linear_velocity: Vector3<f64>,
    dropouts: Vec<(LegSide, Range<u64>)>,
    reads: u64,
    commands: Vec<[LegCommand; LEG_COUNT]>,
}

impl StaticHardware {
    /// Both legs motionless at [`crate::standing_pose`], body level and still.
    pub fn standing() -> Self {
        Self::new(standing_reading(), standing_reading())
    }

    pub fn new(left: JointReading, right: JointReading) -> Self {
        Self {
            readings: [left, right],
            orientation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            dropouts: Vec::new(),
            reads: 0,
            commands: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_orientation(mut self, orientation: UnitQuaternion<f64>) -> Self {
        self.orientation = orientation;
        self
    }

    #[must_use]
    pub fn with_linear_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Report no reading for `side` on reads whose index falls in `reads`.
    #[must_use]
    pub fn with_dropout(mut self, side: LegSide, reads: Range<u64>) -> Self {
        self.dropouts.push((side, reads));
        self
    }

    pub fn set_reading(&mut self, side: LegSide, reading: JointReading) {
        self.readings[side.index()] = reading;
    }

    /// Number of `read` calls so far.
    pub const fn reads(&self) -> u64 {
        self.reads
    }

    /// Every command batch received, oldest first.
    pub fn commands(&self) -> &[[LegCommand; LEG_COUNT]] {
        &self.commands
    }

    pub fn last_command(&self) -> Option<&[LegCommand; LEG_COUNT]> {
        self.commands.last()
    }

    fn dropped(&self, side: LegSide) -> bool {
        self.dropouts
            .iter()
            .any(|(s, reads)| *s == side && reads.contains(&self.reads))
    }
}

impl Hardware for StaticHardware {
    fn read(&mut self) -> SensorFrame {
        let legs = LegSide::ALL.map(|side| {
            if self.dropped(side) {
                None
            } else {
                Some(self.readings[side.index()])
            }
        });
        self.reads += 1;
        SensorFrame {
            legs,
            orientation: self.orientation,
            linear_velocity: self.linear_velocity,
        }
    }

    fn command(&mut self, commands: &[LegCommand; LEG_COUNT]) {
        self.commands.push(*commands);
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "StaticHardware"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
