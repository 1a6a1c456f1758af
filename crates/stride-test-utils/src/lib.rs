//! Shared test fixtures and mock hardware for stride crates.
//!
//! Provides the reference inertial table, a bent standing pose away from the
//! straight-leg singularity, a stepped (non-realtime) configuration, and
//! hardware stand-ins that record what the controller commands.

pub mod fixtures;
pub mod mocks;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{BIPED_TABLE_TOML, standing_pose, standing_reading, stepped_config};
pub use mocks::StaticHardware;
