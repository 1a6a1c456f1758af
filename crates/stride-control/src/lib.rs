//! Locomotion controller for a two-leg robot with four joints per leg.
//!
//! One [`Runner`] tick moves both legs through the same pipeline:
//!
//! 1. **Gait scheduler**: periodic phase per leg, right leg half a period
//!    behind the left. Phase at or below the switch fraction is stance.
//! 2. **Disturbance + contact estimate**: the torque not explained by the
//!    model, mapped to a foot force and thresholded on its normal component.
//! 3. **Leg FSM**: reconciles scheduled and sensed contact into
//!    `Swing | Stance | Early | Late`.
//! 4. **Footstep planner**: Raibert heuristic, replanned on touchdown.
//! 5. **Swing trajectory**: precomputed foot path, consumed one sample per
//!    swing tick.
//! 6. **Operational-space control**: task-space PD on the foot, plus
//!    registered contributors.
//! 7. **Force QP**: minimal correction of the reference ground reaction
//!    force, consistent with the leg dynamics, added while the foot is
//!    scheduled down.
//!
//! Legs never share state; the force plan is refreshed at a slower rate and
//! held in between.

pub mod contact;
pub mod disturbance;
pub mod footstep;
pub mod force_plan;
pub mod fsm;
pub mod gait;
pub mod leg;
pub mod osc;
pub mod qp;
pub mod runner;
pub mod swing;

pub use contact::ContactEstimator;
pub use disturbance::{ContactDisturbanceEstimator, DisturbanceEstimate};
pub use footstep::FootstepPlanner;
pub use force_plan::{HeldForcePlan, StaticWeightPlan};
pub use fsm::{LegFsm, LegState, Transition};
pub use gait::{GaitScheduler, scheduled_contact};
pub use leg::{LegController, LegInput, LegOutput, LegStats};
pub use osc::{
    GravityCompensation, NullSpacePosture, OperationalSpaceController, OscContext, OscOutput,
    SignalContributor,
};
pub use qp::{ForceCorrection, ForceQp, ForceQpProblem};
pub use runner::{LegFault, LegReport, RunStats, Runner, TickReport};
pub use swing::{SwingTrajectory, ThreeKnotSpline};

/// Commonly used types for wiring a controller.
pub mod prelude {
    pub use crate::footstep::FootstepPlanner;
    pub use crate::fsm::LegState;
    pub use crate::osc::{OscContext, SignalContributor};
    pub use crate::runner::{LegFault, RunStats, Runner, TickReport};
    pub use stride_core::config::{FaultPolicy, StrideConfig};
    pub use stride_core::traits::{ForcePlanRequest, ForcePlanner, Hardware};
    pub use stride_core::types::{
        ContactPhase, JointReading, JointVector, LegCommand, LegSide, SensorFrame,
    };
    pub use stride_model::{InertialTable, RobotModel};
}
