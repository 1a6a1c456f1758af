use thiserror::Error;

use crate::types::LegSide;

/// Top-level error type for stride.
#[derive(Debug, Error)]
pub enum StrideError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),
}

/// Configuration errors. Detected at startup, before the loop runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid tick interval: {0} (must be > 0)")]
    InvalidDt(f64),

    #[error("Invalid gait period: {0} (must be > 0)")]
    InvalidPeriod(f64),

    #[error("Invalid switch fraction: {0} (must be in (0, 1))")]
    InvalidSwitchFraction(f64),

    #[error("Swing sample count {samples} is not an integer (period * (1 - switch) / dt)")]
    NonIntegralSwingSamples { samples: f64 },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Inertial table and kinematic model errors.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Inertial table parse error: {0}")]
    Parse(String),

    #[error("URDF parse error: {0}")]
    Urdf(String),

    #[error("Malformed link '{link}': {message}")]
    MalformedLink { link: String, message: String },

    #[error("Missing {side} link for segment {segment}")]
    MissingSegment { side: LegSide, segment: usize },

    #[error("Duplicate {side} link for segment {segment}")]
    DuplicateSegment { side: LegSide, segment: usize },

    #[error("Left/right mass mismatch at segment {segment}: left={left} kg, right={right} kg")]
    AsymmetricMass {
        segment: usize,
        left: f64,
        right: f64,
    },

    #[error("URDF link not found: {0}")]
    MissingLink(String),
}

/// Per-cycle numerical failures.
///
/// Copy + static messages for cheap propagation in the control loop. These
/// are recoverable: the runner applies its fault policy and keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NumericalError {
    #[error("Singular matrix: {0}")]
    Singular(&'static str),

    #[error("Force QP failed: {0}")]
    QpFailed(&'static str),

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Errors surfaced from a control cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("Numerical error: {0}")]
    Numerical(#[from] NumericalError),

    /// Internal inconsistency. Fatal: the runner stops.
    #[error("Logic defect on {side} leg: {message}")]
    LogicDefect { side: LegSide, message: String },

    #[error("Runner already shut down")]
    ShutDown,
}
