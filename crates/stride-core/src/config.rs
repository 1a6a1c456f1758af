use serde::{Deserialize, Serialize};

use nalgebra::Vector3;

use crate::error::ConfigError;
use crate::types::{JointVector, LegSide};

/// Relative tolerance when checking that the swing sample count is integral.
const SWING_SAMPLE_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_dt() -> f64 {
    0.001
}
const fn default_true() -> bool {
    true
}
const fn default_period() -> f64 {
    0.5
}
const fn default_switch_fraction() -> f64 {
    0.75
}
const fn default_force_threshold() -> f64 {
    50.0
}
const fn default_stance_height() -> f64 {
    0.7
}
const fn default_hip_offset() -> f64 {
    0.144
}
const fn default_body_mass() -> f64 {
    10.0
}
const fn default_gravity() -> f64 {
    9.807
}
const fn default_raibert_gain() -> f64 {
    0.5
}
const fn default_step_height() -> f64 {
    0.12
}
const fn default_kp() -> f64 {
    100.0
}
const fn default_kv() -> f64 {
    10.0
}
const fn default_null_kp() -> f64 {
    10.0
}
const fn default_null_kv() -> f64 {
    1.0
}
const fn default_rest_posture() -> [f64; 4] {
    [0.0, 0.6, -1.2, 0.6]
}
const fn default_qp_max_iter() -> u32 {
    50
}
const fn default_qp_tolerance() -> f64 {
    1e-8
}
const fn default_update_interval() -> u32 {
    10
}
const fn default_joint_direction() -> [f64; 4] {
    [1.0; 4]
}
const fn default_overrun_warn_every() -> u64 {
    100
}

// ---------------------------------------------------------------------------
// StrideConfig
// ---------------------------------------------------------------------------

/// Complete controller configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StrideConfig {
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub gait: GaitConfig,
    #[serde(default)]
    pub contact: ContactConfig,
    #[serde(default)]
    pub body: BodyConfig,
    #[serde(default)]
    pub footstep: FootstepConfig,
    #[serde(default)]
    pub swing: SwingConfig,
    #[serde(default)]
    pub osc: OscConfig,
    #[serde(default)]
    pub qp: QpConfig,
    #[serde(default)]
    pub force_plan: ForcePlanConfig,
    #[serde(default)]
    pub legs: LegsConfig,
    #[serde(default)]
    pub fault: FaultConfig,
}

impl StrideConfig {
    /// Validate every section. Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.control.dt > 0.0 && self.control.dt.is_finite()) {
            return Err(ConfigError::InvalidDt(self.control.dt));
        }
        if !(self.gait.period > 0.0 && self.gait.period.is_finite()) {
            return Err(ConfigError::InvalidPeriod(self.gait.period));
        }
        let phi = self.gait.switch_fraction;
        if !(phi > 0.0 && phi < 1.0) {
            return Err(ConfigError::InvalidSwitchFraction(phi));
        }
        self.swing_samples()?;

        positive("contact.force_threshold", self.contact.force_threshold)?;
        positive("body.stance_height", self.body.stance_height)?;
        positive("body.hip_offset", self.body.hip_offset)?;
        positive("body.mass", self.body.mass)?;
        positive("body.gravity", self.body.gravity)?;
        non_negative("footstep.raibert_gain", self.footstep.raibert_gain)?;
        finite3("footstep.desired_velocity", &self.footstep.desired_velocity)?;
        finite3("footstep.desired_angular_rate", &self.footstep.desired_angular_rate)?;
        positive("swing.step_height", self.swing.step_height)?;
        positive("osc.kp", self.osc.kp)?;
        non_negative("osc.kv", self.osc.kv)?;
        non_negative("osc.null_kp", self.osc.null_kp)?;
        non_negative("osc.null_kv", self.osc.null_kv)?;
        if self.osc.rest_posture.iter().any(|v| !v.is_finite()) {
            return Err(invalid("osc.rest_posture", "must be finite"));
        }
        if self.qp.max_iter == 0 {
            return Err(invalid("qp.max_iter", "must be > 0"));
        }
        positive("qp.tolerance", self.qp.tolerance)?;
        if self.force_plan.update_interval == 0 {
            return Err(invalid("force_plan.update_interval", "must be > 0"));
        }
        for side in LegSide::ALL {
            let dirs = &self.legs.side(side).joint_direction;
            if dirs.iter().any(|d| (d.abs() - 1.0).abs() > f64::EPSILON) {
                return Err(invalid(
                    &format!("legs.{side}.joint_direction"),
                    "entries must be +1 or -1",
                ));
            }
        }
        let links: Vec<&String> = LegSide::ALL
            .iter()
            .flat_map(|&side| self.legs.side(side).urdf_links.iter())
            .collect();
        for (i, name) in links.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(invalid("legs.urdf_links", "link names must be non-empty"));
            }
            if links[..i].contains(name) {
                return Err(invalid(
                    "legs.urdf_links",
                    &format!("link `{name}` is named twice"),
                ));
            }
        }
        Ok(())
    }

    /// Number of samples in one swing trajectory: `period * (1 - switch) / dt`.
    ///
    /// Errors when the count is not an integer (within a relative tolerance
    /// for floating-point representation) or is smaller than two.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn swing_samples(&self) -> Result<usize, ConfigError> {
        let samples = self.gait.period * (1.0 - self.gait.switch_fraction) / self.control.dt;
        let rounded = samples.round();
        if !samples.is_finite()
            || (samples - rounded).abs() > SWING_SAMPLE_TOLERANCE * rounded.max(1.0)
        {
            return Err(ConfigError::NonIntegralSwingSamples { samples });
        }
        if rounded < 2.0 {
            return Err(invalid("gait", "swing phase must span at least two ticks"));
        }
        Ok(rounded as usize)
    }

    /// Stance duration `T * switch_fraction` in seconds.
    pub fn stance_duration(&self) -> f64 {
        self.gait.period * self.gait.switch_fraction
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, &format!("{value} must be > 0")))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, &format!("{value} must be >= 0")))
    }
}

fn finite3(field: &str, value: &[f64; 3]) -> Result<(), ConfigError> {
    if value.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(invalid(field, "must be finite"))
    }
}

// ---------------------------------------------------------------------------
// ControlConfig
// ---------------------------------------------------------------------------

/// Loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Tick interval in seconds (default: 0.001 = 1000 Hz).
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Sleep until the next tick deadline. Disable for stepped/offline runs.
    #[serde(default = "default_true")]
    pub realtime: bool,

    /// Emit a tick-overrun warning at most once per this many overruns.
    #[serde(default = "default_overrun_warn_every")]
    pub overrun_warn_every: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            realtime: true,
            overrun_warn_every: default_overrun_warn_every(),
        }
    }
}

// ---------------------------------------------------------------------------
// GaitConfig
// ---------------------------------------------------------------------------

/// Periodic gait timing. The right leg always runs half a period behind the left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaitConfig {
    /// Gait period T in seconds.
    #[serde(default = "default_period")]
    pub period: f64,

    /// Fraction of the period spent in scheduled stance, in (0, 1).
    #[serde(default = "default_switch_fraction")]
    pub switch_fraction: f64,

    /// Phase start time of the left leg in seconds.
    #[serde(default)]
    pub left_offset: f64,
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
            switch_fraction: default_switch_fraction(),
            left_offset: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ContactConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Vertical load (N) at or above which the foot counts as in contact.
    #[serde(default = "default_force_threshold")]
    pub force_threshold: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            force_threshold: default_force_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// BodyConfig
// ---------------------------------------------------------------------------

/// Body geometry and mass shared by several controller stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    /// Nominal hip height above the feet during stance (m).
    #[serde(default = "default_stance_height")]
    pub stance_height: f64,

    /// Lateral distance from body centre to each hip (m). Left is +y.
    #[serde(default = "default_hip_offset")]
    pub hip_offset: f64,

    /// Total supported mass used by the built-in force plan (kg).
    #[serde(default = "default_body_mass")]
    pub mass: f64,

    /// Gravitational acceleration magnitude (m/s^2).
    #[serde(default = "default_gravity")]
    pub gravity: f64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            stance_height: default_stance_height(),
            hip_offset: default_hip_offset(),
            mass: default_body_mass(),
            gravity: default_gravity(),
        }
    }
}

impl BodyConfig {
    /// Hip position relative to the body centre, body frame.
    pub fn hip_position(&self, side: LegSide) -> Vector3<f64> {
        Vector3::new(0.0, side.lateral_sign() * self.hip_offset, 0.0)
    }
}

// ---------------------------------------------------------------------------
// FootstepConfig
// ---------------------------------------------------------------------------

/// Raibert foot placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootstepConfig {
    /// Velocity feedback gain k.
    #[serde(default = "default_raibert_gain")]
    pub raibert_gain: f64,

    /// Desired body velocity v_d (world frame, m/s).
    #[serde(default)]
    pub desired_velocity: [f64; 3],

    /// Desired body angular rate omega_d (world frame, rad/s).
    #[serde(default)]
    pub desired_angular_rate: [f64; 3],
}

impl Default for FootstepConfig {
    fn default() -> Self {
        Self {
            raibert_gain: default_raibert_gain(),
            desired_velocity: [0.0; 3],
            desired_angular_rate: [0.0; 3],
        }
    }
}

impl FootstepConfig {
    pub fn desired_velocity(&self) -> Vector3<f64> {
        Vector3::from(self.desired_velocity)
    }

    pub fn desired_angular_rate(&self) -> Vector3<f64> {
        Vector3::from(self.desired_angular_rate)
    }
}

// ---------------------------------------------------------------------------
// SwingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingConfig {
    /// Apex clearance above the liftoff/touchdown height (m).
    #[serde(default = "default_step_height")]
    pub step_height: f64,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            step_height: default_step_height(),
        }
    }
}

// ---------------------------------------------------------------------------
// OscConfig
// ---------------------------------------------------------------------------

/// Operational-space controller gains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscConfig {
    /// Task-space proportional gain.
    #[serde(default = "default_kp")]
    pub kp: f64,

    /// Joint-space velocity damping gain.
    #[serde(default = "default_kv")]
    pub kv: f64,

    /// Add a posture-regulation term in the task null space.
    #[serde(default)]
    pub null_space: bool,

    #[serde(default = "default_null_kp")]
    pub null_kp: f64,

    #[serde(default = "default_null_kv")]
    pub null_kv: f64,

    /// Resting joint configuration targeted by the null-space term (rad).
    #[serde(default = "default_rest_posture")]
    pub rest_posture: [f64; 4],

    /// Register the gravity-compensation contributor.
    #[serde(default)]
    pub gravity_compensation: bool,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            kp: default_kp(),
            kv: default_kv(),
            null_space: false,
            null_kp: default_null_kp(),
            null_kv: default_null_kv(),
            rest_posture: default_rest_posture(),
            gravity_compensation: false,
        }
    }
}

impl OscConfig {
    pub fn rest_posture(&self) -> JointVector {
        JointVector::from(self.rest_posture)
    }
}

// ---------------------------------------------------------------------------
// QpConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QpConfig {
    /// Apply the force QP correction and reaction-force feedforward in stance.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_qp_max_iter")]
    pub max_iter: u32,

    /// Feasibility and duality-gap tolerance passed to the solver.
    #[serde(default = "default_qp_tolerance")]
    pub tolerance: f64,
}

impl Default for QpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iter: default_qp_max_iter(),
            tolerance: default_qp_tolerance(),
        }
    }
}

// ---------------------------------------------------------------------------
// ForcePlanConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcePlanConfig {
    /// Ticks between force-plan refreshes; the plan is held in between.
    #[serde(default = "default_update_interval")]
    pub update_interval: u32,
}

impl Default for ForcePlanConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// LegsConfig
// ---------------------------------------------------------------------------

fn default_urdf_links(side: LegSide) -> [String; 4] {
    let suffix = match side {
        LegSide::Left => "l",
        LegSide::Right => "r",
    };
    ["hip", "femur", "shank", "toe"].map(|segment| format!("{segment}_{suffix}"))
}

/// Hardware sign conventions and URDF link names for one leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegSideConfig {
    /// Multiplier applied to encoder readings and torque commands (+1 / -1).
    #[serde(default = "default_joint_direction")]
    pub joint_direction: [f64; 4],
    /// URDF link names, hip first. Used when the inertial table is a URDF.
    pub urdf_links: [String; 4],
}

impl LegSideConfig {
    pub fn for_side(side: LegSide) -> Self {
        Self {
            joint_direction: default_joint_direction(),
            urdf_links: default_urdf_links(side),
        }
    }

    pub fn joint_direction(&self) -> JointVector {
        JointVector::from(self.joint_direction)
    }
}

/// Per-leg settings. A partially written side keeps that side's defaults
/// for the keys it omits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegsConfig {
    #[serde(default = "left_leg", deserialize_with = "left_leg_partial")]
    pub left: LegSideConfig,
    #[serde(default = "right_leg", deserialize_with = "right_leg_partial")]
    pub right: LegSideConfig,
}

impl Default for LegsConfig {
    fn default() -> Self {
        Self {
            left: left_leg(),
            right: right_leg(),
        }
    }
}

fn left_leg() -> LegSideConfig {
    LegSideConfig::for_side(LegSide::Left)
}

fn right_leg() -> LegSideConfig {
    LegSideConfig::for_side(LegSide::Right)
}

/// On-disk form of a leg section: every key optional.
#[derive(Deserialize)]
struct PartialLegSide {
    joint_direction: Option<[f64; 4]>,
    urdf_links: Option<[String; 4]>,
}

impl PartialLegSide {
    fn fill(self, side: LegSide) -> LegSideConfig {
        let defaults = LegSideConfig::for_side(side);
        LegSideConfig {
            joint_direction: self.joint_direction.unwrap_or(defaults.joint_direction),
            urdf_links: self.urdf_links.unwrap_or(defaults.urdf_links),
        }
    }
}

fn left_leg_partial<'de, D: serde::Deserializer<'de>>(d: D) -> Result<LegSideConfig, D::Error> {
    PartialLegSide::deserialize(d).map(|p| p.fill(LegSide::Left))
}

fn right_leg_partial<'de, D: serde::Deserializer<'de>>(d: D) -> Result<LegSideConfig, D::Error> {
    PartialLegSide::deserialize(d).map(|p| p.fill(LegSide::Right))
}

impl LegsConfig {
    pub const fn side(&self, side: LegSide) -> &LegSideConfig {
        match side {
            LegSide::Left => &self.left,
            LegSide::Right => &self.right,
        }
    }
}

// ---------------------------------------------------------------------------
// FaultConfig
// ---------------------------------------------------------------------------

/// What a leg commands on a cycle where its pipeline could not produce a torque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Repeat the last good command.
    #[default]
    HoldLast,
    /// Command zero torque.
    Zero,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaultConfig {
    #[serde(default)]
    pub policy: FaultPolicy,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
