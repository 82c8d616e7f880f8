//! # World frame convention
//!
//! The world frame defines which direction is "forward" for an unrotated
//! vehicle, which direction is vertical, and so how 3D vectors are projected
//! onto the ground plane. Two conventions are provided: the ISO frame (Z up,
//! the default) and a Y up frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A world frame convention.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WorldFrameKind", into = "WorldFrameKind")]
pub struct WorldFrame {
    kind: WorldFrameKind,
    forward: Unit<Vector3<f64>>,
    vertical: Unit<Vector3<f64>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The supported world frame conventions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldFrameKind {
    /// Z up, X forward, Y left.
    Iso,

    /// Y up, X forward, -Z left.
    YUp,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WorldFrame {
    /// The ISO frame: Z up, X forward.
    pub fn iso() -> Self {
        Self {
            kind: WorldFrameKind::Iso,
            forward: Vector3::x_axis(),
            vertical: Vector3::z_axis(),
        }
    }

    /// A Y up frame, X forward.
    pub fn y_up() -> Self {
        Self {
            kind: WorldFrameKind::YUp,
            forward: Vector3::x_axis(),
            vertical: Vector3::y_axis(),
        }
    }

    pub fn kind(&self) -> WorldFrameKind {
        self.kind
    }

    /// Unit vector pointing forward for an unrotated vehicle.
    pub fn forward(&self) -> Vector3<f64> {
        self.forward.into_inner()
    }

    /// Unit vector pointing up.
    pub fn vertical(&self) -> Vector3<f64> {
        self.vertical.into_inner()
    }

    /// Unit vector pointing to the left of an unrotated vehicle.
    pub fn left(&self) -> Vector3<f64> {
        self.vertical().cross(&self.forward())
    }

    /// Height of the vector, i.e. its component along the vertical.
    pub fn height(&self, v: &Vector3<f64>) -> f64 {
        v.dot(&self.vertical())
    }

    /// Project the vector onto the ground plane.
    pub fn project(&self, v: &Vector3<f64>) -> Vector3<f64> {
        v - self.height(v) * self.vertical()
    }

    /// Rotation by `angle_rad` about the vertical axis (positive turns left).
    pub fn rotation_about_vertical(&self, angle_rad: f64) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&self.vertical, angle_rad)
    }
}

impl Default for WorldFrame {
    fn default() -> Self {
        Self::iso()
    }
}

impl From<WorldFrameKind> for WorldFrame {
    fn from(kind: WorldFrameKind) -> Self {
        match kind {
            WorldFrameKind::Iso => Self::iso(),
            WorldFrameKind::YUp => Self::y_up(),
        }
    }
}

impl From<WorldFrame> for WorldFrameKind {
    fn from(frame: WorldFrame) -> Self {
        frame.kind
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Normalise a vector, returning the zero vector if it has no length.
pub fn safe_normalize(v: &Vector3<f64>) -> Vector3<f64> {
    v.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros)
}
