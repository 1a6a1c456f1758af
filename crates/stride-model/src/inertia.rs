//! Per-link inertial table.
//!
//! The table is the single source of geometry and mass for both legs. It is
//! loaded once at startup from a TOML file of `[[link]]` entries (or from a
//! URDF, see [`crate::urdf`]) and validated before any controller is built:
//! every leg needs exactly one link per segment, masses and lengths must be
//! positive, and left/right masses must agree segment by segment.

use std::path::Path;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stride_core::error::ModelError;
use stride_core::types::{JOINTS_PER_LEG, LEG_COUNT, LegSide};

/// Relative tolerance for the left/right mass comparison.
pub const MASS_SYMMETRY_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// LinkInertia
// ---------------------------------------------------------------------------

/// Inertial and geometric parameters of one leg link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkInertia {
    pub name: String,
    pub side: LegSide,
    /// Position along the leg, 0 at the hip.
    pub segment: usize,
    /// Mass in kg.
    pub mass: f64,
    /// Distance from this link's joint to the next joint (or the foot), along -z.
    pub length: f64,
    /// Centre of mass in the link frame.
    #[serde(default)]
    pub com: [f64; 3],
    /// `[ixx, ixy, ixz, iyy, iyz, izz]` about the COM, link frame.
    #[serde(default)]
    pub inertia: [f64; 6],
    /// Joint axis in the link frame. Defaults to x for segment 0, y otherwise.
    #[serde(default)]
    pub axis: Option<[f64; 3]>,
}

impl LinkInertia {
    /// Symmetric 3x3 rotational inertia about the COM.
    pub fn inertia_matrix(&self) -> Matrix3<f64> {
        let [ixx, ixy, ixz, iyy, iyz, izz] = self.inertia;
        Matrix3::new(ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz)
    }

    pub fn com(&self) -> Vector3<f64> {
        Vector3::from(self.com)
    }

    /// Unit joint axis, falling back to the segment default.
    pub fn joint_axis(&self) -> Vector3<f64> {
        match self.axis {
            Some(axis) => Vector3::from(axis).normalize(),
            None if self.segment == 0 => Vector3::x(),
            None => Vector3::y(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        let malformed = |message: &str| ModelError::MalformedLink {
            link: self.name.clone(),
            message: message.into(),
        };
        if self.segment >= JOINTS_PER_LEG {
            return Err(malformed(&format!(
                "segment {} out of range 0..{JOINTS_PER_LEG}",
                self.segment
            )));
        }
        if !(self.mass > 0.0 && self.mass.is_finite()) {
            return Err(malformed("mass must be > 0"));
        }
        if !(self.length > 0.0 && self.length.is_finite()) {
            return Err(malformed("length must be > 0"));
        }
        if self.com.iter().chain(self.inertia.iter()).any(|v| !v.is_finite()) {
            return Err(malformed("com and inertia must be finite"));
        }
        let [ixx, _, _, iyy, _, izz] = self.inertia;
        if ixx < 0.0 || iyy < 0.0 || izz < 0.0 {
            return Err(malformed("principal inertia terms must be >= 0"));
        }
        if let Some(axis) = self.axis {
            let norm = Vector3::from(axis).norm();
            if !(norm > 1e-9 && norm.is_finite()) {
                return Err(malformed("joint axis must be non-zero"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InertialTable
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TableFile {
    #[serde(rename = "link", default)]
    links: Vec<LinkInertia>,
}

/// Validated inertial table: four links per leg, ordered hip to foot.
#[derive(Debug, Clone, PartialEq)]
pub struct InertialTable {
    legs: [[LinkInertia; JOINTS_PER_LEG]; LEG_COUNT],
}

impl InertialTable {
    /// Validate and arrange an unordered list of link entries.
    pub fn from_links(links: Vec<LinkInertia>) -> Result<Self, ModelError> {
        let mut slots: [[Option<LinkInertia>; JOINTS_PER_LEG]; LEG_COUNT] = Default::default();

        for link in links {
            link.validate()?;
            let slot = &mut slots[link.side.index()][link.segment];
            if slot.is_some() {
                return Err(ModelError::DuplicateSegment {
                    side: link.side,
                    segment: link.segment,
                });
            }
            debug!(link = %link.name, side = %link.side, segment = link.segment, mass = link.mass, "inertial entry");
            *slot = Some(link);
        }

        let mut legs = Vec::with_capacity(LEG_COUNT);
        for (side, side_slots) in LegSide::ALL.into_iter().zip(slots) {
            let mut leg = Vec::with_capacity(JOINTS_PER_LEG);
            for (segment, slot) in side_slots.into_iter().enumerate() {
                leg.push(slot.ok_or(ModelError::MissingSegment { side, segment })?);
            }
            legs.push(
                <[LinkInertia; JOINTS_PER_LEG]>::try_from(leg)
                    .map_err(|_| ModelError::Parse(format!("{side} leg is incomplete")))?,
            );
        }
        let legs = <[_; LEG_COUNT]>::try_from(legs)
            .map_err(|_| ModelError::Parse("expected exactly two legs".into()))?;

        let table = Self { legs };
        table.check_symmetry()?;
        info!(total_mass = table.total_mass(), "inertial table loaded");
        Ok(table)
    }

    /// Parse a TOML document of `[[link]]` entries.
    pub fn from_toml_str(content: &str) -> Result<Self, ModelError> {
        let file: TableFile =
            toml::from_str(content).map_err(|e| ModelError::Parse(e.to_string()))?;
        Self::from_links(file.links)
    }

    /// Load a TOML table from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Links of one leg, hip first.
    pub fn leg(&self, side: LegSide) -> &[LinkInertia; JOINTS_PER_LEG] {
        &self.legs[side.index()]
    }

    pub fn link(&self, side: LegSide, segment: usize) -> Option<&LinkInertia> {
        self.legs[side.index()].get(segment)
    }

    /// Sum of all link masses (both legs).
    pub fn total_mass(&self) -> f64 {
        self.legs.iter().flatten().map(|l| l.mass).sum()
    }

    /// Sum of link lengths of one leg (fully extended reach).
    pub fn leg_length(&self, side: LegSide) -> f64 {
        self.leg(side).iter().map(|l| l.length).sum()
    }

    fn check_symmetry(&self) -> Result<(), ModelError> {
        let left = self.leg(LegSide::Left);
        let right = self.leg(LegSide::Right);
        for (segment, (l, r)) in left.iter().zip(right).enumerate() {
            let scale = l.mass.abs().max(r.mass.abs());
            if (l.mass - r.mass).abs() > MASS_SYMMETRY_TOLERANCE * scale {
                return Err(ModelError::AsymmetricMass {
                    segment,
                    left: l.mass,
                    right: r.mass,
                });
            }
        }
        Ok(())
    }
}
