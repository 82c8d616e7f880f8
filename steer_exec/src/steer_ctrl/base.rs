//! # Base steering controller state
//!
//! `SteeringCore` holds what every controller shares: the sentinel and target
//! points, the lateral error with its integral and derivative, the PID gains,
//! the world frame and the data log.
//!
//! The lateral error is the length of the ground plane projection of
//! `target - sentinel`. Its sign is taken from the vertical component of
//! `(sentinel - position) x (target - position)`, so a target to the left of
//! the sentinel ray gives a positive error.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use crate::data_log::DataLog;
use crate::vehicle::VehicleState;
use crate::world::{safe_normalize, WorldFrame};
use util::maths::sign;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// PID gains
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct PidGains {
    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,
}

/// State shared by all steering controllers.
#[derive(Debug, Clone)]
pub struct SteeringCore {
    world: WorldFrame,

    /// Distance of the sentinel ahead of the vehicle
    lookahead_m: f64,

    gains: PidGains,

    sentinel_m: Vector3<f64>,
    target_m: Vector3<f64>,

    /// Error from the most recent advance
    err_m: f64,

    /// Trapezoidal integral of the error
    err_integral: f64,

    /// Backward difference derivative of the error
    err_deriv: f64,

    data_log: DataLog,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SteeringCore {
    pub fn new(world: WorldFrame, lookahead_m: f64, gains: PidGains) -> Self {
        Self {
            world,
            lookahead_m,
            gains,
            sentinel_m: Vector3::zeros(),
            target_m: Vector3::zeros(),
            err_m: 0.0,
            err_integral: 0.0,
            err_deriv: 0.0,
            data_log: DataLog::default(),
        }
    }

    /// Place the sentinel at the lookahead distance along the vehicle's
    /// forward direction, projected onto the ground plane.
    pub fn update_sentinel(&mut self, state: &VehicleState) -> Vector3<f64> {
        let forward = safe_normalize(&self.world.project(&state.forward(&self.world)));
        self.sentinel_m = state.position_m + self.lookahead_m * forward;
        self.sentinel_m
    }

    pub fn set_sentinel(&mut self, sentinel_m: Vector3<f64>) {
        self.sentinel_m = sentinel_m;
    }

    pub fn set_target(&mut self, target_m: Vector3<f64>) {
        self.target_m = target_m;
    }

    /// Signed lateral error between the current sentinel and target.
    pub fn lateral_error(&self, state: &VehicleState) -> f64 {
        let err_vec = self.world.project(&(self.target_m - self.sentinel_m));

        let sentinel_vec = self.world.project(&(self.sentinel_m - state.position_m));
        let target_vec = self.world.project(&(self.target_m - state.position_m));
        let side = self.world.height(&sentinel_vec.cross(&target_vec));

        sign(side) * err_vec.norm()
    }

    /// Update the error derivative and integral with a new error sample.
    ///
    /// A non-positive step leaves the derivative at zero.
    pub fn accumulate(&mut self, err_m: f64, dt_s: f64) {
        self.err_deriv = if dt_s > 0.0 {
            (err_m - self.err_m) / dt_s
        }
        else {
            0.0
        };
        self.err_integral += (err_m + self.err_m) * dt_s / 2.0;
        self.err_m = err_m;
    }

    /// PID output for the current error state.
    pub fn pid_output(&self) -> f64 {
        self.gains.k_p * self.err_m
            + self.gains.k_i * self.err_integral
            + self.gains.k_d * self.err_deriv
    }

    /// Recompute the sentinel and zero the error state.
    pub fn reset(&mut self, state: &VehicleState) {
        self.update_sentinel(state);
        self.err_m = 0.0;
        self.err_integral = 0.0;
        self.err_deriv = 0.0;
    }

    /// Zero the integral and the cached previous error.
    pub fn clear_integral(&mut self) {
        self.err_integral = 0.0;
        self.err_m = 0.0;
    }

    /// Append the current target and sentinel to the data log if collecting.
    pub fn record(&mut self, time_s: f64) {
        self.data_log.push(time_s, self.target_m, self.sentinel_m);
    }

    pub fn world(&self) -> &WorldFrame {
        &self.world
    }

    pub fn lookahead_m(&self) -> f64 {
        self.lookahead_m
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn sentinel_m(&self) -> Vector3<f64> {
        self.sentinel_m
    }

    pub fn target_m(&self) -> Vector3<f64> {
        self.target_m
    }

    pub fn err_m(&self) -> f64 {
        self.err_m
    }

    pub fn err_integral(&self) -> f64 {
        self.err_integral
    }

    pub fn err_deriv(&self) -> f64 {
        self.err_deriv
    }

    pub fn data_log(&self) -> &DataLog {
        &self.data_log
    }

    pub fn data_log_mut(&mut self) -> &mut DataLog {
        &mut self.data_log
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn core(k_p: f64, k_i: f64, k_d: f64) -> SteeringCore {
        SteeringCore::new(WorldFrame::iso(), 5.0, PidGains { k_p, k_i, k_d })
    }

    #[test]
    fn test_sentinel_projected_to_ground() {
        let world = WorldFrame::iso();
        let mut core = core(1.0, 0.0, 0.0);

        let mut state = VehicleState::planar(Vector3::new(0.0, -1.0, 0.0), 0.0, 5.0, 0.0, &world);
        let sentinel = core.update_sentinel(&state);
        assert!((sentinel - Vector3::new(5.0, -1.0, 0.0)).norm() < 1e-12);

        // Nose pitched down, the sentinel stays at ground level
        state.attitude_q = nalgebra::UnitQuaternion::from_euler_angles(0.0, 0.3, 0.0);
        let sentinel = core.update_sentinel(&state);
        assert!((sentinel - Vector3::new(5.0, -1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_lateral_error_sign() {
        let world = WorldFrame::iso();
        let state = VehicleState::planar(Vector3::new(0.0, -1.0, 0.0), 0.0, 5.0, 0.0, &world);
        let mut core = core(1.0, 0.0, 0.0);
        core.update_sentinel(&state);

        core.set_target(Vector3::new(5.0, 0.0, 0.0));
        assert!((core.lateral_error(&state) - 1.0).abs() < 1e-12);

        core.set_target(Vector3::new(5.0, -3.0, 0.0));
        assert!((core.lateral_error(&state) + 2.0).abs() < 1e-12);

        // Height differences are ignored
        core.set_target(Vector3::new(5.0, 0.0, 4.0));
        assert!((core.lateral_error(&state) - 1.0).abs() < 1e-12);

        // Target on the sentinel ray has no side
        core.set_target(Vector3::new(8.0, -1.0, 0.0));
        assert_eq!(core.lateral_error(&state), 0.0);
    }

    #[test]
    fn test_lateral_error_sign_y_up() {
        let world = WorldFrame::y_up();
        let state = VehicleState::planar(Vector3::zeros(), 0.0, 5.0, 0.0, &world);
        let mut core = SteeringCore::new(world, 5.0, PidGains::default());
        core.update_sentinel(&state);

        // Left is -z in the Y up frame
        core.set_target(Vector3::new(5.0, 0.0, -1.0));
        assert!((core.lateral_error(&state) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pid_accumulation() {
        let mut core = core(2.0, 1.0, 0.5);

        core.accumulate(1.0, 0.1);
        assert!((core.err_deriv() - 10.0).abs() < 1e-12);
        assert!((core.err_integral() - 0.05).abs() < 1e-12);
        assert!((core.pid_output() - (2.0 + 0.05 + 5.0)).abs() < 1e-12);

        core.accumulate(3.0, 0.1);
        assert!((core.err_deriv() - 20.0).abs() < 1e-9);
        assert!((core.err_integral() - 0.25).abs() < 1e-12);

        // No time passed, no derivative
        core.accumulate(3.0, 0.0);
        assert_eq!(core.err_deriv(), 0.0);

        core.clear_integral();
        assert_eq!(core.err_integral(), 0.0);
        assert_eq!(core.err_m(), 0.0);
    }
}
