//! # Kinematic host
//!
//! A single track kinematic vehicle running at constant speed on flat
//! ground. It stands in for the host simulation when running the controllers
//! on their own. It is not a vehicle dynamics model: there is no slip, no
//! load transfer and the steering angle follows the demand instantly.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector3;

// Internal
use crate::vehicle::VehicleState;
use crate::world::WorldFrame;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the kinematic vehicle
#[derive(Debug, Copy, Clone)]
pub struct VehicleParams {
    /// Units: meters
    pub wheelbase_m: f64,

    /// Road wheel angle for a steering demand of 1.
    ///
    /// Units: radians
    pub max_steer_angle_rad: f64,
}

/// Single track kinematic vehicle.
#[derive(Debug, Clone)]
pub struct KinematicVehicle {
    world: WorldFrame,
    params: VehicleParams,

    time_s: f64,
    position_m: Vector3<f64>,

    /// Heading about the vertical axis, positive to the left
    heading_rad: f64,

    speed_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl KinematicVehicle {
    pub fn new(
        world: WorldFrame,
        params: VehicleParams,
        position_m: Vector3<f64>,
        heading_rad: f64,
        speed_ms: f64
    ) -> Self {
        Self {
            world,
            params,
            time_s: 0.0,
            position_m,
            heading_rad,
            speed_ms,
        }
    }

    /// Current state as seen by a steering controller.
    pub fn state(&self) -> VehicleState {
        VehicleState::planar(
            self.position_m,
            self.heading_rad,
            self.speed_ms,
            self.time_s,
            &self.world
        )
    }

    /// Integrate the vehicle over `dt_s` with the given steering demand.
    ///
    /// The demand is saturated to `[-1, 1]`.
    pub fn step(&mut self, steer_norm: f64, dt_s: f64) {
        let steer_norm = if steer_norm.is_nan() { 0.0 } else { steer_norm.max(-1.0).min(1.0) };
        let delta_rad = steer_norm * self.params.max_steer_angle_rad;

        let yaw_rate_rads = self.speed_ms * delta_rad.tan() / self.params.wheelbase_m;
        self.heading_rad = util::maths::wrap_to_pi(self.heading_rad + yaw_rate_rads * dt_s);

        let forward = self.world.rotation_about_vertical(self.heading_rad) * self.world.forward();
        self.position_m += self.speed_ms * dt_s * forward;
        self.time_s += dt_s;
    }

    pub fn heading_rad(&self) -> f64 {
        self.heading_rad
    }

    pub fn position_m(&self) -> Vector3<f64> {
        self.position_m
    }

    pub fn time_s(&self) -> f64 {
        self.time_s
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::{Path, PathGeometry};
    use crate::steer_ctrl::*;
    use std::sync::Arc;

    fn vehicle_params() -> VehicleParams {
        VehicleParams {
            wheelbase_m: 2.5,
            max_steer_angle_rad: DEFAULT_MAX_STEER_ANGLE_RAD,
        }
    }

    fn straight_path() -> Arc<dyn PathGeometry> {
        Arc::new(Path::straight(
            Vector3::zeros(), Vector3::new(500.0, 0.0, 0.0), 1.0, WorldFrame::iso()
        ).unwrap())
    }

    /// Run the controller for `duration_s` and return the final vehicle.
    fn run(ctrl: &mut dyn SteeringController, duration_s: f64) -> KinematicVehicle {
        let dt_s = 0.01;
        let mut vehicle = KinematicVehicle::new(
            WorldFrame::iso(),
            vehicle_params(),
            Vector3::new(0.0, -1.0, 0.0),
            0.0,
            5.0
        );

        ctrl.reset(&vehicle.state());
        while vehicle.time_s() < duration_s {
            let steer = ctrl.advance(&vehicle.state(), dt_s);
            vehicle.step(steer, dt_s);
        }

        vehicle
    }

    #[test]
    fn test_straight_driving() {
        let mut vehicle = KinematicVehicle::new(
            WorldFrame::iso(), vehicle_params(), Vector3::zeros(), 0.0, 2.0
        );
        for _ in 0..100 {
            vehicle.step(0.0, 0.01);
        }
        assert!((vehicle.position_m() - Vector3::new(2.0, 0.0, 0.0)).norm() < 1e-9);
        assert!((vehicle.time_s() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_left_demand_turns_left() {
        let mut vehicle = KinematicVehicle::new(
            WorldFrame::iso(), vehicle_params(), Vector3::zeros(), 0.0, 2.0
        );
        vehicle.step(0.5, 0.1);
        assert!(vehicle.heading_rad() > 0.0);
        assert!(vehicle.state().forward(&WorldFrame::iso()).y > 0.0);

        // Demands beyond full lock are saturated
        let mut a = vehicle.clone();
        let mut b = vehicle.clone();
        a.step(1.0, 0.1);
        b.step(3.0, 0.1);
        assert_eq!(a.heading_rad(), b.heading_rad());
    }

    #[test]
    fn test_path_follow_converges() {
        let mut ctrl = PathFollowController::new(
            straight_path(),
            WorldFrame::iso(),
            PathFollowGains {
                lookahead_m: 5.0,
                pid: PidGains { k_p: 0.5, k_i: 0.0, k_d: 0.0 },
            }
        );

        let vehicle = run(&mut ctrl, 30.0);
        assert!(vehicle.position_m().y.abs() < 0.05);
        assert!(vehicle.heading_rad().abs() < 0.01);
    }

    #[test]
    fn test_stanley_converges() {
        let mut ctrl = StanleyController::new(
            straight_path(),
            WorldFrame::iso(),
            StanleyGains {
                pid: PidGains { k_p: 1.0, k_i: 0.0, k_d: 0.0 },
                ..StanleyGains::default()
            }
        );

        let vehicle = run(&mut ctrl, 40.0);
        assert!(vehicle.position_m().y.abs() < 0.05);
        assert!(vehicle.heading_rad().abs() < 0.01);
    }
}
