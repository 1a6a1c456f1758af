//! Inertial table import from URDF using `urdf-rs`.
//!
//! Each leg is named by its four link names, hip first. Mass, COM and inertia
//! come from the link's `<inertial>`; the joint axis from the joint whose child
//! is the link; the segment length from the offset of the distal joint (the
//! joint to the next segment, or any joint hanging off the last link, usually a
//! fixed foot frame). Joint `rpy` is not used: links are assumed to hang along
//! -z in the zero configuration.

use std::path::Path;

use nalgebra::Vector3;

use stride_core::config::LegsConfig;
use stride_core::error::ModelError;
use stride_core::types::{JOINTS_PER_LEG, LegSide};

use crate::inertia::{InertialTable, LinkInertia};

/// Link names per leg, hip first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrdfLegMap {
    pub left: [String; JOINTS_PER_LEG],
    pub right: [String; JOINTS_PER_LEG],
}

impl UrdfLegMap {
    pub const fn side(&self, side: LegSide) -> &[String; JOINTS_PER_LEG] {
        match side {
            LegSide::Left => &self.left,
            LegSide::Right => &self.right,
        }
    }
}

impl From<&LegsConfig> for UrdfLegMap {
    fn from(legs: &LegsConfig) -> Self {
        Self {
            left: legs.left.urdf_links.clone(),
            right: legs.right.urdf_links.clone(),
        }
    }
}

impl InertialTable {
    /// Build a table from a URDF file on disk.
    pub fn from_urdf_file(path: impl AsRef<Path>, map: &UrdfLegMap) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_urdf_str(&content, map)
    }

    /// Build a table from URDF XML.
    pub fn from_urdf_str(xml: &str, map: &UrdfLegMap) -> Result<Self, ModelError> {
        let robot = urdf_rs::read_from_string(xml).map_err(|e| ModelError::Urdf(e.to_string()))?;
        let mut links = Vec::with_capacity(2 * JOINTS_PER_LEG);
        for side in LegSide::ALL {
            let names = map.side(side);
            for (segment, name) in names.iter().enumerate() {
                let next = names.get(segment + 1).map(String::as_str);
                links.push(convert_link(&robot, side, segment, name, next)?);
            }
        }
        Self::from_links(links)
    }
}

fn convert_link(
    robot: &urdf_rs::Robot,
    side: LegSide,
    segment: usize,
    name: &str,
    next: Option<&str>,
) -> Result<LinkInertia, ModelError> {
    let link = robot
        .links
        .iter()
        .find(|l| l.name == name)
        .ok_or_else(|| ModelError::MissingLink(name.into()))?;
    let malformed = |message: &str| ModelError::MalformedLink {
        link: name.into(),
        message: message.into(),
    };

    let driving = robot
        .joints
        .iter()
        .find(|j| j.child.link == name)
        .ok_or_else(|| malformed("no joint drives this link"))?;

    let distal = robot
        .joints
        .iter()
        .find(|j| j.parent.link == name && next.is_none_or(|n| j.child.link == n))
        .ok_or_else(|| malformed("no distal joint to derive the segment length"))?;

    let inertial = &link.inertial;
    let i = &inertial.inertia;
    let com: &[f64; 3] = &inertial.origin.xyz;
    let axis: &[f64; 3] = &driving.axis.xyz;
    let offset: &[f64; 3] = &distal.origin.xyz;

    Ok(LinkInertia {
        name: name.into(),
        side,
        segment,
        mass: inertial.mass.value,
        length: Vector3::from(*offset).norm(),
        com: *com,
        inertia: [i.ixx, i.ixy, i.ixz, i.iyy, i.iyz, i.izz],
        axis: Some(*axis),
    })
}
