//! One leg's pass through the control pipeline.
//!
//! Per cycle: dynamics -> disturbance estimate -> contact estimate -> FSM ->
//! edge actions (footstep replan on touchdown, trajectory on swing entry) ->
//! target by state -> OSC, plus the force-QP feedforward while the schedule
//! has the foot down.
//!
//! Positions handled here live in two frames. Footsteps and swing samples are
//! relative to the body centre in a world-aligned frame; OSC targets are in
//! the hip frame. `p_hip = R^T p_world - hip`.

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, warn};

use stride_core::config::StrideConfig;
use stride_core::error::{ConfigError, ControlError, NumericalError};
use stride_core::types::{ContactFlags, ContactPhase, JointReading, JointVector, LegSide};
use stride_model::{LegDynamics, RobotModel};

use crate::contact::ContactEstimator;
use crate::disturbance::{ContactDisturbanceEstimator, DisturbanceEstimate};
use crate::footstep::FootstepPlanner;
use crate::fsm::{LegFsm, LegState, Transition};
use crate::osc::OperationalSpaceController;
use crate::qp::{ForceCorrection, ForceQp, ForceQpProblem};
use crate::swing::SwingTrajectory;

/// What the runner hands a leg each cycle. `reading` is already in the
/// controller's joint sign convention.
#[derive(Debug, Clone, Copy)]
pub struct LegInput<'a> {
    pub reading: &'a JointReading,
    pub orientation: &'a UnitQuaternion<f64>,
    pub linear_velocity: &'a Vector3<f64>,
    pub scheduled: ContactPhase,
    /// Reference ground reaction force, world frame.
    pub reference_force: &'a Vector3<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegOutput {
    pub torque: JointVector,
    pub transition: Transition,
    pub flags: ContactFlags,
    pub normal_load: f64,
    /// OSC target, hip frame.
    pub target: Vector3<f64>,
    pub force_correction: Option<ForceCorrection>,
}

/// Event counters for one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LegStats {
    pub swing_entries: u64,
    pub replans: u64,
    pub faults: u64,
    pub dropouts: u64,
}

#[derive(Debug)]
pub struct LegController {
    side: LegSide,
    hip: Vector3<f64>,
    stance_target: Vector3<f64>,
    ground_height: f64,
    apex_height: f64,
    swing_samples: usize,
    contact: ContactEstimator,
    fsm: LegFsm,
    disturbance: ContactDisturbanceEstimator,
    osc: OperationalSpaceController,
    qp: Option<ForceQp>,
    footstep: Vector3<f64>,
    trajectory: Option<SwingTrajectory>,
    hold_reported: bool,
    stats: LegStats,
}

impl LegController {
    pub fn new(side: LegSide, config: &StrideConfig) -> Result<Self, ConfigError> {
        let h = config.body.stance_height;
        let hip = config.body.hip_position(side);
        Ok(Self {
            side,
            hip,
            stance_target: Vector3::new(0.0, 0.0, -h),
            ground_height: -h,
            apex_height: -h + config.swing.step_height,
            swing_samples: config.swing_samples()?,
            contact: ContactEstimator::from_config(&config.contact),
            fsm: LegFsm::new(),
            disturbance: ContactDisturbanceEstimator::new(config.control.dt),
            osc: OperationalSpaceController::from_config(&config.osc),
            qp: config.qp.enabled.then(|| ForceQp::from_config(&config.qp)),
            footstep: hip,
            trajectory: None,
            hold_reported: false,
            stats: LegStats::default(),
        })
    }

    pub const fn side(&self) -> LegSide {
        self.side
    }

    pub const fn state(&self) -> Option<LegState> {
        self.fsm.state()
    }

    /// Current footstep target (body-centred, world-aligned).
    pub const fn footstep(&self) -> &Vector3<f64> {
        &self.footstep
    }

    pub const fn trajectory(&self) -> Option<&SwingTrajectory> {
        self.trajectory.as_ref()
    }

    pub const fn stats(&self) -> &LegStats {
        &self.stats
    }

    pub const fn osc_mut(&mut self) -> &mut OperationalSpaceController {
        &mut self.osc
    }

    /// Torque last sent to the actuators, controller convention.
    pub const fn last_command(&self) -> &JointVector {
        self.disturbance.last_command()
    }

    /// Record the torque actually commanded this cycle.
    pub fn record_command(&mut self, torque: &JointVector) {
        self.disturbance.record_command(torque);
    }

    pub fn record_fault(&mut self, dropout: bool) {
        self.stats.faults += 1;
        if dropout {
            self.stats.dropouts += 1;
        }
    }

    pub fn step(
        &mut self,
        model: &RobotModel,
        planner: &FootstepPlanner,
        input: &LegInput<'_>,
    ) -> Result<LegOutput, ControlError> {
        let rot = input.orientation;
        let (dynamics, disturbance) = match self.sense(model, input) {
            Ok(sensed) => sensed,
            Err(e) => {
                self.skip_cycle(input.scheduled)?;
                return Err(e.into());
            }
        };
        let normal_load = disturbance.normal_load(rot);
        let flags = ContactFlags {
            scheduled: input.scheduled,
            estimated: self.contact.estimate(normal_load),
        };
        let transition = self.fsm.update(flags);

        if transition.touchdown {
            let yaw = rot.euler_angles().2;
            self.footstep = planner.plan(self.side, yaw, input.linear_velocity);
            self.stats.replans += 1;
            debug!(side = %self.side, footstep = ?self.footstep, "footstep replanned");
        }

        if transition.swing_entry {
            let foot = rot * (self.hip + dynamics.foot_position);
            self.trajectory = Some(SwingTrajectory::generate(
                &foot,
                &self.footstep,
                self.swing_samples,
                self.ground_height,
                self.apex_height,
            ));
            self.hold_reported = false;
            self.stats.swing_entries += 1;
            debug!(side = %self.side, from = ?transition.previous, "swing entered");
        }

        let target = match transition.state {
            LegState::Swing => {
                let sample = self.next_swing_sample()?;
                rot.inverse_transform_vector(&sample) - self.hip
            }
            LegState::Stance | LegState::Early | LegState::Late => self.stance_target,
        };

        let osc = self
            .osc
            .control(self.side, input.reading, &dynamics, &target, None)?;
        let mut torque = osc.torque;

        let mut force_correction = None;
        if let (Some(qp), true) = (&self.qp, transition.state.is_ground_phase()) {
            // World-aligned Jacobian so fr >= 0 is componentwise in the world frame.
            let jacobian = rot.to_rotation_matrix().into_inner() * dynamics.jacobian;
            let problem = ForceQpProblem {
                reference_force: *input.reference_force,
                jacobian,
                mass_matrix: dynamics.mass_matrix,
                gravity: dynamics.gravity,
                joint_acceleration: dynamics.jacobian.transpose() * osc.acceleration,
            };
            let correction = qp.solve(&problem)?;
            let reaction = correction.corrected_force(input.reference_force);
            torque -= jacobian.transpose() * reaction;
            force_correction = Some(correction);
        }

        if !torque.iter().all(|v| v.is_finite()) {
            return Err(NumericalError::NonFinite("leg torque").into());
        }

        Ok(LegOutput {
            torque,
            transition,
            flags,
            normal_load,
            target,
            force_correction,
        })
    }

    /// Keep the leg's timeline in step on a cycle that produced no torque.
    ///
    /// The FSM holds its state. A leg swinging on schedule consumes the
    /// sample this cycle would have used, so the swing stays aligned with
    /// the gait clock.
    pub fn skip_cycle(&mut self, scheduled: ContactPhase) -> Result<(), ControlError> {
        if self.fsm.state() == Some(LegState::Swing) && !scheduled.is_stance() {
            self.next_swing_sample()?;
        }
        Ok(())
    }

    fn sense(
        &mut self,
        model: &RobotModel,
        input: &LegInput<'_>,
    ) -> Result<(LegDynamics, DisturbanceEstimate), NumericalError> {
        let dynamics = model.dynamics(self.side, input.reading, input.orientation)?;
        let disturbance = self.disturbance.estimate(input.reading, &dynamics)?;
        Ok((dynamics, disturbance))
    }

    fn next_swing_sample(&mut self) -> Result<Vector3<f64>, ControlError> {
        let side = self.side;
        let trajectory = self
            .trajectory
            .as_mut()
            .ok_or_else(|| ControlError::LogicDefect {
                side,
                message: "in swing without a swing trajectory".into(),
            })?;
        if trajectory.is_exhausted() && !self.hold_reported {
            warn!(
                side = %side,
                samples = trajectory.len(),
                "swing trajectory exhausted; holding last sample"
            );
            self.hold_reported = true;
        }
        trajectory.advance().ok_or_else(|| ControlError::LogicDefect {
            side,
            message: "swing trajectory has no samples".into(),
        })
    }
}
