//! Inertial table and rigid-body model of the stride biped's legs.
//!
//! The [`RobotModel`] is built once at startup from an [`InertialTable`]
//! (TOML or URDF) and passed by reference to the controller. Every per-cycle
//! quantity it produces lives in [`LegDynamics`]:
//!
//! - joint-space mass matrix `Mq`
//! - translational foot Jacobian `J`
//! - task-space mass matrix `Mx`
//! - gravity torque `g`

pub mod dynamics;
pub mod inertia;
pub mod leg;
pub mod robot;
pub mod urdf;

pub use dynamics::{LegDynamics, task_space_mass};
pub use inertia::{InertialTable, LinkInertia};
pub use leg::{LegFrames, LegLink, LegModel};
pub use robot::RobotModel;
pub use urdf::UrdfLegMap;
