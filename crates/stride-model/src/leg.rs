//! Serial kinematics of one four-joint leg.
//!
//! Frames follow the hip: x forward, y left, z up. Joint 0 sits at the hip
//! origin; each link hangs along its local -z by `length` to the next joint,
//! and the foot point is the end of the last link.

use nalgebra::{
    Isometry3, Matrix3, Matrix3x4, Point3, Translation3, UnitQuaternion, UnitVector3, Vector3,
};

use stride_core::types::{JOINTS_PER_LEG, JointVector, LegSide};

use crate::inertia::{InertialTable, LinkInertia};

/// Static description of one link: joint axis, distal offset and inertia.
#[derive(Debug, Clone, PartialEq)]
pub struct LegLink {
    pub name: String,
    /// Joint axis in the link frame.
    pub axis: UnitVector3<f64>,
    /// Offset from this joint to the next joint (or foot), link frame.
    pub distal: Vector3<f64>,
    pub mass: f64,
    /// COM in the link frame.
    pub com: Vector3<f64>,
    /// Rotational inertia about the COM, link frame.
    pub inertia: Matrix3<f64>,
}

impl LegLink {
    fn from_inertia(link: &LinkInertia) -> Self {
        Self {
            name: link.name.clone(),
            axis: UnitVector3::new_normalize(link.joint_axis()),
            distal: Vector3::new(0.0, 0.0, -link.length),
            mass: link.mass,
            com: link.com(),
            inertia: link.inertia_matrix(),
        }
    }
}

/// World-aligned joint frames for one configuration, expressed in the hip frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LegFrames {
    /// Joint origins.
    pub origins: [Vector3<f64>; JOINTS_PER_LEG],
    /// Joint axes (unit).
    pub axes: [Vector3<f64>; JOINTS_PER_LEG],
    /// Link orientations (after applying each joint).
    pub rotations: [UnitQuaternion<f64>; JOINTS_PER_LEG],
    /// Link COM positions.
    pub coms: [Vector3<f64>; JOINTS_PER_LEG],
    /// Foot point.
    pub foot: Vector3<f64>,
}

/// Kinematic model of one leg.
#[derive(Debug, Clone, PartialEq)]
pub struct LegModel {
    side: LegSide,
    links: [LegLink; JOINTS_PER_LEG],
}

impl LegModel {
    pub fn from_table(table: &InertialTable, side: LegSide) -> Self {
        Self {
            side,
            links: table.leg(side).each_ref().map(LegLink::from_inertia),
        }
    }

    pub const fn side(&self) -> LegSide {
        self.side
    }

    pub const fn links(&self) -> &[LegLink; JOINTS_PER_LEG] {
        &self.links
    }

    /// Forward kinematics: every joint frame plus the foot point.
    pub fn frames(&self, q: &JointVector) -> LegFrames {
        let mut pose = Isometry3::identity();
        let mut origins = [Vector3::zeros(); JOINTS_PER_LEG];
        let mut axes = [Vector3::zeros(); JOINTS_PER_LEG];
        let mut rotations = [UnitQuaternion::identity(); JOINTS_PER_LEG];
        let mut coms = [Vector3::zeros(); JOINTS_PER_LEG];

        for (i, link) in self.links.iter().enumerate() {
            origins[i] = pose.translation.vector;
            axes[i] = pose.rotation * link.axis.into_inner();
            pose *= UnitQuaternion::from_axis_angle(&link.axis, q[i]);
            rotations[i] = pose.rotation;
            coms[i] = (pose * Point3::from(link.com)).coords;
            pose *= Translation3::from(link.distal);
        }

        LegFrames {
            origins,
            axes,
            rotations,
            coms,
            foot: pose.translation.vector,
        }
    }

    /// Foot position relative to the hip.
    pub fn foot_position(&self, q: &JointVector) -> Vector3<f64> {
        self.frames(q).foot
    }

    /// Translational foot Jacobian (3x4).
    pub fn foot_jacobian(&self, q: &JointVector) -> Matrix3x4<f64> {
        let frames = self.frames(q);
        point_jacobian(&frames, &frames.foot, JOINTS_PER_LEG)
    }
}

/// Translational Jacobian of `point`, moved by joints `0..n_joints`.
///
/// Revolute column: `axis x (point - joint_origin)`.
pub(crate) fn point_jacobian(
    frames: &LegFrames,
    point: &Vector3<f64>,
    n_joints: usize,
) -> Matrix3x4<f64> {
    let mut j = Matrix3x4::zeros();
    for i in 0..n_joints.min(JOINTS_PER_LEG) {
        let col = frames.axes[i].cross(&(point - frames.origins[i]));
        j.set_column(i, &col);
    }
    j
}

/// Rotational Jacobian of a link moved by joints `0..n_joints`.
pub(crate) fn angular_jacobian(frames: &LegFrames, n_joints: usize) -> Matrix3x4<f64> {
    let mut j = Matrix3x4::zeros();
    for i in 0..n_joints.min(JOINTS_PER_LEG) {
        j.set_column(i, &frames.axes[i]);
    }
    j
}
