//! Fixed-rate control loop for both legs.
//!
//! Each tick reads the hardware once, refreshes the (held) force plan, runs
//! the left then the right leg through [`LegController::step`], and sends one
//! command batch. A leg whose pipeline cannot produce a torque this tick
//! (sensor dropout, non-finite reading, numerical failure) falls back to the
//! configured [`FaultPolicy`]; the other leg is unaffected. Logic defects stop
//! the loop.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use nalgebra::Vector3;
use tracing::{error, info, warn};

use stride_core::config::{FaultPolicy, StrideConfig};
use stride_core::error::{ControlError, NumericalError, StrideError};
use stride_core::time::ControlClock;
use stride_core::traits::{ForcePlanRequest, ForcePlanner, Hardware};
use stride_core::types::{
    ContactPhase, JointVector, LEG_COUNT, LegCommand, LegSide, RobotState, SensorFrame,
};
use stride_model::RobotModel;

use crate::footstep::FootstepPlanner;
use crate::force_plan::{HeldForcePlan, StaticWeightPlan};
use crate::fsm::LegState;
use crate::gait::GaitScheduler;
use crate::leg::{LegController, LegInput, LegStats};
use crate::osc::SignalContributor;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Why a leg fell back to the fault policy this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegFault {
    Dropout,
    NonFiniteReading,
    Numerical(NumericalError),
}

impl fmt::Display for LegFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dropout => f.write_str("sensor dropout"),
            Self::NonFiniteReading => f.write_str("non-finite joint reading"),
            Self::Numerical(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegReport {
    /// FSM state after this tick (`None` until the leg's first good cycle).
    pub state: Option<LegState>,
    pub scheduled: ContactPhase,
    /// Torque sent, controller convention.
    pub torque: JointVector,
    pub fault: Option<LegFault>,
    /// Index of the next swing sample, once a trajectory exists.
    pub swing_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Control time at the start of the tick (s).
    pub time: f64,
    pub legs: [LegReport; LEG_COUNT],
    pub duration: Duration,
}

impl TickReport {
    pub fn leg(&self, side: LegSide) -> &LegReport {
        &self.legs[side.index()]
    }
}

/// Loop statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub ticks: u64,
    pub overruns: u64,
    pub max_tick: Duration,
    pub legs: [LegStats; LEG_COUNT],
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ticks={} overruns={} max_tick={:?}",
            self.ticks, self.overruns, self.max_tick
        )?;
        for side in LegSide::ALL {
            let leg = &self.legs[side.index()];
            writeln!(
                f,
                "  {side:<5}: swing_entries={} replans={} faults={} dropouts={}",
                leg.swing_entries, leg.replans, leg.faults, leg.dropouts
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct Runner<'m, H: Hardware> {
    model: &'m RobotModel,
    hardware: H,
    clock: ControlClock,
    gait: GaitScheduler,
    footsteps: FootstepPlanner,
    force_plan: HeldForcePlan,
    legs: [LegController; LEG_COUNT],
    directions: [JointVector; LEG_COUNT],
    fault_policy: FaultPolicy,
    realtime: bool,
    overrun_warn_every: u64,
    state: RobotState,
    deadline: Option<Instant>,
    overruns: u64,
    max_tick: Duration,
    shut_down: bool,
}

impl<'m, H: Hardware> Runner<'m, H> {
    /// Validate `config` and assemble the loop. Nothing is commanded yet.
    pub fn new(
        config: &StrideConfig,
        model: &'m RobotModel,
        hardware: H,
    ) -> Result<Self, StrideError> {
        config.validate()?;
        let legs = [
            LegController::new(LegSide::Left, config)?,
            LegController::new(LegSide::Right, config)?,
        ];
        let planner = StaticWeightPlan::new(config.body.mass, config.body.gravity);

        info!(
            hardware = hardware.name(),
            dt = config.control.dt,
            period = config.gait.period,
            switch_fraction = config.gait.switch_fraction,
            swing_samples = config.swing_samples()?,
            realtime = config.control.realtime,
            "runner initialized"
        );

        Ok(Self {
            model,
            hardware,
            clock: ControlClock::new(config.control.dt),
            gait: GaitScheduler::from_config(&config.gait),
            footsteps: FootstepPlanner::from_config(config),
            force_plan: HeldForcePlan::new(Box::new(planner), config.force_plan.update_interval),
            legs,
            directions: LegSide::ALL.map(|side| config.legs.side(side).joint_direction()),
            fault_policy: config.fault.policy,
            realtime: config.control.realtime,
            overrun_warn_every: config.control.overrun_warn_every.max(1),
            state: RobotState::at_rest(),
            deadline: None,
            overruns: 0,
            max_tick: Duration::ZERO,
            shut_down: false,
        })
    }

    /// Replace the built-in weight-split plan.
    pub fn set_force_planner(&mut self, planner: Box<dyn ForcePlanner>, interval: u32) {
        self.force_plan = HeldForcePlan::new(planner, interval);
    }

    /// Append an OSC contributor to one leg.
    pub fn register_contributor(&mut self, side: LegSide, contributor: Box<dyn SignalContributor>) {
        self.legs[side.index()].osc_mut().register(contributor);
    }

    pub const fn footstep_planner_mut(&mut self) -> &mut FootstepPlanner {
        &mut self.footsteps
    }

    pub const fn clock(&self) -> &ControlClock {
        &self.clock
    }

    pub const fn hardware(&self) -> &H {
        &self.hardware
    }

    pub const fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn leg(&self, side: LegSide) -> &LegController {
        &self.legs[side.index()]
    }

    /// Last sensed state (legs in controller convention).
    pub const fn state(&self) -> &RobotState {
        &self.state
    }

    pub const fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            ticks: self.clock.tick(),
            overruns: self.overruns,
            max_tick: self.max_tick,
            legs: [*self.legs[0].stats(), *self.legs[1].stats()],
        }
    }

    /// Run one control tick.
    pub fn step(&mut self) -> Result<TickReport, ControlError> {
        if self.shut_down {
            return Err(ControlError::ShutDown);
        }
        let started = Instant::now();
        let tick = self.clock.tick();
        let elapsed = self.clock.elapsed_nanos();
        let frame = self.hardware.read();
        self.refresh_state(&frame);

        let scheduled = LegSide::ALL.map(|side| self.gait.contact(side, elapsed));
        let request = ForcePlanRequest {
            orientation: frame.orientation,
            footsteps: [*self.legs[0].footstep(), *self.legs[1].footstep()],
            in_contact: scheduled.map(ContactPhase::is_stance),
        };
        let forces = *self.force_plan.update(tick, &request);

        let mut commands = [LegCommand::zero(); LEG_COUNT];
        let mut reports = [LegReport {
            state: None,
            scheduled: ContactPhase::Stance,
            torque: JointVector::zeros(),
            fault: None,
            swing_index: None,
        }; LEG_COUNT];

        for side in LegSide::ALL {
            let i = side.index();
            let (torque, fault) = match self.run_leg(side, &frame, scheduled[i], &forces[i]) {
                Ok(torque) => (torque, None),
                Err(LegOutcome::Fault(fault)) => {
                    (self.apply_fault(side, tick, fault), Some(fault))
                }
                Err(LegOutcome::Fatal(err)) => {
                    error!(side = %side, tick, error = %err, "control logic defect; stopping");
                    self.shutdown();
                    return Err(err);
                }
            };

            let leg = &mut self.legs[i];
            leg.record_command(&torque);
            commands[i] = LegCommand::new(torque.component_mul(&self.directions[i]));
            reports[i] = LegReport {
                state: leg.state(),
                scheduled: scheduled[i],
                torque,
                fault,
                swing_index: leg.trajectory().map(|t| t.index()),
            };
        }

        self.hardware.command(&commands);
        let time = self.clock.elapsed_secs();
        self.clock.advance();

        let duration = started.elapsed();
        self.track_timing(tick, duration);
        if self.realtime {
            self.wait_for_deadline(started);
        }

        Ok(TickReport {
            tick,
            time,
            legs: reports,
            duration,
        })
    }

    /// Run `ticks` ticks, stopping at the first fatal error.
    pub fn run_for(&mut self, ticks: u64) -> Result<RunStats, ControlError> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(self.stats())
    }

    /// Command zero torque once and refuse further ticks. Repeat calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.hardware.command(&[LegCommand::zero(); LEG_COUNT]);
        self.shut_down = true;
        info!(tick = self.clock.tick(), "runner shut down");
    }

    fn refresh_state(&mut self, frame: &SensorFrame) {
        self.state.orientation = frame.orientation;
        self.state.linear_velocity = frame.linear_velocity;
        for side in LegSide::ALL {
            if let Some(reading) = frame.leg(side).filter(|r| r.is_finite()) {
                self.state.legs[side.index()] = reading.with_directions(&self.directions[side.index()]);
            }
        }
    }

    fn run_leg(
        &mut self,
        side: LegSide,
        frame: &SensorFrame,
        scheduled: ContactPhase,
        reference_force: &Vector3<f64>,
    ) -> Result<JointVector, LegOutcome> {
        let raw = match frame.leg(side) {
            Some(raw) if raw.is_finite() => raw,
            unusable => {
                let fault = if unusable.is_some() {
                    LegFault::NonFiniteReading
                } else {
                    LegFault::Dropout
                };
                // The swing keeps time even though this leg produces no torque.
                self.legs[side.index()]
                    .skip_cycle(scheduled)
                    .map_err(LegOutcome::Fatal)?;
                return Err(LegOutcome::Fault(fault));
            }
        };
        let reading = raw.with_directions(&self.directions[side.index()]);
        let input = LegInput {
            reading: &reading,
            orientation: &frame.orientation,
            linear_velocity: &frame.linear_velocity,
            scheduled,
            reference_force,
        };
        match self.legs[side.index()].step(self.model, &self.footsteps, &input) {
            Ok(out) => Ok(out.torque),
            Err(ControlError::Numerical(e)) => Err(LegOutcome::Fault(LegFault::Numerical(e))),
            Err(e) => Err(LegOutcome::Fatal(e)),
        }
    }

    fn apply_fault(&mut self, side: LegSide, tick: u64, fault: LegFault) -> JointVector {
        let leg = &mut self.legs[side.index()];
        leg.record_fault(fault == LegFault::Dropout);
        let torque = match self.fault_policy {
            FaultPolicy::HoldLast => *leg.last_command(),
            FaultPolicy::Zero => JointVector::zeros(),
        };
        warn!(side = %side, tick, fault = %fault, policy = ?self.fault_policy, "leg fault");
        torque
    }

    fn track_timing(&mut self, tick: u64, duration: Duration) {
        self.max_tick = self.max_tick.max(duration);
        if duration > self.clock.dt() {
            self.overruns += 1;
            if (self.overruns - 1) % self.overrun_warn_every == 0 {
                warn!(
                    tick,
                    duration_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
                    budget_us = self.clock.dt_nanos() / 1_000,
                    overruns = self.overruns,
                    "tick overran its budget"
                );
            }
        }
    }

    fn wait_for_deadline(&mut self, started: Instant) {
        let deadline = self.deadline.unwrap_or(started) + self.clock.dt();
        let now = Instant::now();
        if now < deadline {
            thread::sleep(deadline - now);
            self.deadline = Some(deadline);
        } else {
            // Behind schedule: restart the cadence from now instead of bursting.
            self.deadline = Some(now);
        }
    }
}

/// Per-leg pipeline outcome other than a torque.
enum LegOutcome {
    Fault(LegFault),
    Fatal(ControlError),
}

impl<H: Hardware> fmt::Debug for Runner<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("hardware", &self.hardware.name())
            .field("clock", &self.clock)
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}
