// stride-core: Config, errors, clock, shared types and boundary traits for the stride controller.

pub mod config;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use config::{FaultPolicy, StrideConfig};
pub use error::{ConfigError, ControlError, ModelError, NumericalError, StrideError};
pub use time::ControlClock;
pub use traits::{ForcePlanRequest, ForcePlanner, Hardware};
pub use types::{
    ContactFlags, ContactPhase, JOINTS_PER_LEG, JointReading, JointVector, LEG_COUNT, LegCommand,
    LegSide, RobotState, SensorFrame,
};
