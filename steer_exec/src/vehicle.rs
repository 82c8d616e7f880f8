//! # Vehicle state
//!
//! The read-only snapshot of the vehicle supplied by the host on every step.
//! Controllers never modify it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// Internal
use crate::world::WorldFrame;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current state of the vehicle's reference frame in the world frame.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct VehicleState {
    /// Simulated time.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Position of the vehicle reference point.
    ///
    /// Units: meters
    pub position_m: Vector3<f64>,

    /// Attitude of the vehicle, rotating vehicle frame vectors into the world
    /// frame.
    pub attitude_q: UnitQuaternion<f64>,

    /// Velocity of the vehicle reference point.
    ///
    /// Units: meters/second
    pub velocity_ms: Vector3<f64>,

    /// Scalar speed of the vehicle.
    ///
    /// Units: meters/second
    pub speed_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleState {
    /// A ground level state with the given heading about the vertical axis and
    /// velocity along the vehicle's forward direction.
    pub fn planar(
        position_m: Vector3<f64>,
        heading_rad: f64,
        speed_ms: f64,
        time_s: f64,
        world: &WorldFrame,
    ) -> Self {
        let attitude_q = UnitQuaternion::from_rotation_matrix(
            &world.rotation_about_vertical(heading_rad)
        );
        let velocity_ms = speed_ms * (attitude_q * world.forward());

        Self {
            time_s,
            position_m,
            attitude_q,
            velocity_ms,
            speed_ms,
        }
    }

    /// Forward direction of the vehicle in the world frame.
    pub fn forward(&self, world: &WorldFrame) -> Vector3<f64> {
        self.attitude_q * world.forward()
    }

    /// Left direction of the vehicle in the world frame.
    pub fn left(&self, world: &WorldFrame) -> Vector3<f64> {
        self.attitude_q * world.left()
    }

    /// Up direction of the vehicle in the world frame.
    pub fn up(&self, world: &WorldFrame) -> Vector3<f64> {
        self.attitude_q * world.vertical()
    }

    /// Transform a point given in the vehicle frame into the world frame.
    pub fn to_world(&self, point_m: &Vector3<f64>) -> Vector3<f64> {
        self.position_m + self.attitude_q * point_m
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_planar_basis() {
        let world = WorldFrame::iso();
        let state = VehicleState::planar(Vector3::zeros(), FRAC_PI_2, 2.0, 0.0, &world);

        assert!((state.forward(&world) - Vector3::y()).norm() < 1e-12);
        assert!((state.left(&world) - -Vector3::x()).norm() < 1e-12);
        assert!((state.up(&world) - Vector3::z()).norm() < 1e-12);
        assert!((state.velocity_ms - Vector3::new(0.0, 2.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_planar_basis_y_up() {
        let world = WorldFrame::y_up();
        let state = VehicleState::planar(Vector3::zeros(), 0.0, 1.0, 0.0, &world);

        assert!((state.forward(&world) - Vector3::x()).norm() < 1e-12);
        assert!((state.left(&world) - -Vector3::z()).norm() < 1e-12);
        assert!((state.to_world(&Vector3::new(2.0, 0.0, 0.0)) - Vector3::new(2.0, 0.0, 0.0)).norm() < 1e-12);
    }
}
