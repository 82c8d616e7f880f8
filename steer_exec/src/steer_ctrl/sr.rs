//! # SR preview steering controller
//!
//! The SR controller previews where a single track vehicle would be after the
//! preview time at the current steering angle and integrates the lateral
//! offset of that point from the path into the steering angle.
//!
//! The preview distance is `max(u, v_min) * T_p`. With no steering the
//! sentinel lies on a straight line ahead of the vehicle. Otherwise it lies on
//! the arc of radius
//!
//! ```text
//! R = (L + K_ug u^2 / g) / delta
//! ```
//!
//! where `L` is the wheelbase and `K_ug` the understeer gradient in degrees
//! per g of lateral acceleration.
//!
//! The path is followed segment by segment (see `SegmentStepper`). Each step
//!
//! ```text
//! delta = clamp(delta + K_lat * e, -delta_max, delta_max)
//! ```
//!
//! but only while `u >= v_min`. Below that speed the steering angle is held.
//! The demand is `delta / delta_max`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use super::{
    max_steer_angle_rad, saturate, Params, PidGains, StatusReport,
    SteeringController, SteeringCore, DEFAULT_MAX_STEER_ANGLE_RAD
};
use crate::data_log::DataLog;
use crate::path::{PathGeometry, SegmentStepper};
use crate::vehicle::VehicleState;
use crate::world::{safe_normalize, WorldFrame};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Units: seconds
pub const DEFAULT_PREVIEW_TIME_S: f64 = 0.5;

/// Allowed preview times.
///
/// Units: seconds
pub const PREVIEW_TIME_RANGE_S: (f64, f64) = (0.2, 4.0);

/// Allowed understeer gradients.
///
/// Units: degrees/g
pub const K_UG_RANGE: (f64, f64) = (0.0, 5.0);

/// Units: meters/second
pub const DEFAULT_MIN_SPEED_MS: f64 = 2.0;

/// Units: meters
pub const DEFAULT_WHEELBASE_M: f64 = 2.5;

/// Units: meters/second^2
pub const GRAVITY_MS2: f64 = 9.81;

/// Arc angles below this are treated as a straight preview.
///
/// Units: radians
const MIN_ARC_ANGLE_RAD: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Effective gains of the SR controller.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct SrGains {
    /// Lateral error integration gain, non-negative
    pub k_lat: f64,

    /// Understeer gradient, in `K_UG_RANGE`.
    ///
    /// Units: degrees/g
    pub k_ug: f64,

    /// Preview time, in `PREVIEW_TIME_RANGE_S`.
    pub preview_time_s: f64,

    pub min_speed_ms: f64,

    pub wheelbase_m: f64,

    pub max_steer_angle_rad: f64,
}

#[derive(Debug, Clone)]
pub struct SrController {
    core: SteeringCore,
    stepper: SegmentStepper,
    gains: SrGains,

    /// Current road wheel steering angle
    delta_rad: f64,

    report: StatusReport,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SrGains {
    fn default() -> Self {
        Self {
            k_lat: 0.0,
            k_ug: 0.0,
            preview_time_s: DEFAULT_PREVIEW_TIME_S,
            min_speed_ms: DEFAULT_MIN_SPEED_MS,
            wheelbase_m: DEFAULT_WHEELBASE_M,
            max_steer_angle_rad: DEFAULT_MAX_STEER_ANGLE_RAD,
        }
    }
}

impl SrGains {
    /// Apply the allowed ranges to the gains.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();

        Self {
            k_lat: self.k_lat.abs(),
            k_ug: self.k_ug.max(K_UG_RANGE.0).min(K_UG_RANGE.1),
            preview_time_s: self.preview_time_s
                .max(PREVIEW_TIME_RANGE_S.0)
                .min(PREVIEW_TIME_RANGE_S.1),
            min_speed_ms: self.min_speed_ms.abs(),
            wheelbase_m: if self.wheelbase_m > 0.0 {
                self.wheelbase_m
            } else {
                defaults.wheelbase_m
            },
            max_steer_angle_rad: if self.max_steer_angle_rad > 0.0 {
                self.max_steer_angle_rad
            } else {
                defaults.max_steer_angle_rad
            },
        }
    }
}

impl SrController {
    pub fn new(path: &dyn PathGeometry, world: WorldFrame, gains: SrGains) -> Self {
        let gains = gains.clamped();

        Self {
            core: SteeringCore::new(
                world,
                gains.min_speed_ms * gains.preview_time_s,
                PidGains::default()
            ),
            stepper: SegmentStepper::new(path, world),
            gains,
            delta_rad: 0.0,
            report: StatusReport::default(),
        }
    }

    pub fn from_params(params: &Params, path: &dyn PathGeometry) -> Self {
        let defaults = SrGains::default();

        let gains = SrGains {
            k_lat: params.gains.k_lat.unwrap_or(defaults.k_lat),
            k_ug: params.gains.k_ug.unwrap_or(defaults.k_ug),
            preview_time_s: params.preview_time_s.unwrap_or(defaults.preview_time_s),
            min_speed_ms: params.min_speed_ms.unwrap_or(defaults.min_speed_ms),
            wheelbase_m: params.wheelbase_m.unwrap_or(defaults.wheelbase_m),
            max_steer_angle_rad: max_steer_angle_rad(params),
        };

        Self::new(path, params.world(), gains)
    }

    pub fn gains(&self) -> SrGains {
        self.gains
    }

    /// Current road wheel steering angle.
    pub fn delta_rad(&self) -> f64 {
        self.delta_rad
    }

    /// Current segment index.
    pub fn path_index(&self) -> usize {
        self.stepper.index()
    }

    /// Preview point for the current state and steering angle.
    fn preview_sentinel(&self, state: &VehicleState) -> Vector3<f64> {
        let world = self.core.world();
        let u = state.speed_ms;

        let forward = safe_normalize(&world.project(&state.forward(world)));
        let preview_m = u.max(self.gains.min_speed_ms) * self.gains.preview_time_s;
        let straight_m = state.position_m + preview_m * forward;

        if self.delta_rad == 0.0 {
            return straight_m;
        }

        // Turn radius of the single track model, signed positive to the left
        let radius_m = (self.gains.wheelbase_m
            + self.gains.k_ug.to_radians() * u * u / GRAVITY_MS2)
            / self.delta_rad;
        let theta_rad = preview_m / radius_m;

        if !theta_rad.is_finite() || theta_rad.abs() < MIN_ARC_ANGLE_RAD {
            return straight_m;
        }

        // Point on the arc about the turn centre at `position + R n_g`
        let n_g = safe_normalize(&world.project(&state.left(world)));
        let rotated = world.rotation_about_vertical(theta_rad) * n_g;

        state.position_m + radius_m * (n_g - rotated)
    }
}

impl SteeringController for SrController {
    /// Zeroes the steering angle and seeds the segment index at the segment
    /// nearest to the sentinel. Gains are kept.
    fn reset(&mut self, state: &VehicleState) {
        self.delta_rad = 0.0;
        self.core.reset(state);

        let sentinel_m = self.preview_sentinel(state);
        self.core.set_sentinel(sentinel_m);
        self.stepper.reset(&sentinel_m);
    }

    fn advance(&mut self, state: &VehicleState, dt_s: f64) -> f64 {
        let sentinel_m = self.preview_sentinel(state);
        self.core.set_sentinel(sentinel_m);

        let step = self.stepper.step(&sentinel_m);
        self.core.set_target(step.target_m);
        self.core.record(state.time_s);

        let err_m = step.offset_m;
        self.core.accumulate(err_m, dt_s);

        if state.speed_ms >= self.gains.min_speed_ms {
            self.delta_rad = saturate(
                self.delta_rad + self.gains.k_lat * err_m,
                -self.gains.max_steer_angle_rad,
                self.gains.max_steer_angle_rad
            );
        }

        let raw = self.delta_rad / self.gains.max_steer_angle_rad;
        let output = saturate(raw, -1.0, 1.0);

        debug!(
            "SR: segment {}, err {:.4} m, delta {:.4} rad, output {:.4}",
            step.index, err_m, self.delta_rad, output
        );

        self.report = StatusReport {
            lat_error_m: err_m,
            path_index: Some(step.index),
            raw_output: raw,
            output,
            ..StatusReport::new(state.time_s, &sentinel_m, &step.target_m)
        };

        output
    }

    fn data_log(&self) -> &DataLog {
        self.core.data_log()
    }

    fn data_log_mut(&mut self) -> &mut DataLog {
        self.core.data_log_mut()
    }

    fn report(&self) -> StatusReport {
        self.report
    }

    fn name(&self) -> &'static str {
        "SR"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::Path;

    fn line(n: usize, closed: bool) -> Path {
        Path::new(
            (0..n).map(|i| Vector3::new(i as f64, 0.0, 0.0)).collect(),
            closed,
            WorldFrame::iso()
        ).unwrap()
    }

    #[test]
    fn test_closed_path_index_cycles() {
        let world = WorldFrame::iso();
        let n = 10;
        let path = line(n, true);

        // Speed 2 with a 0.5 s preview puts the sentinel 1 m ahead
        let gains = SrGains {
            k_lat: 0.0,
            preview_time_s: 0.5,
            ..SrGains::default()
        };
        let mut ctrl = SrController::new(&path, world, gains);

        let state_at = |x: f64, t: f64| VehicleState::planar(
            Vector3::new(x, 0.0, 0.0), 0.0, 2.0, t, &world
        );

        ctrl.reset(&state_at(-0.5, 0.0));
        assert_eq!(ctrl.path_index(), 0);

        let mut visited = Vec::new();
        for k in 0..n {
            ctrl.advance(&state_at(-0.5 + k as f64, 0.5 * k as f64), 0.5);
            visited.push(ctrl.path_index());
            assert_eq!(ctrl.report().path_index, Some(ctrl.path_index()));
        }
        assert_eq!(visited, (0..n).collect::<Vec<usize>>());

        // Back around to the start
        ctrl.advance(&state_at(-1.5, 5.0), 0.5);
        assert_eq!(ctrl.path_index(), 0);
    }

    #[test]
    fn test_open_path_index_never_decreases() {
        let world = WorldFrame::iso();
        let path = line(20, false);
        let gains = SrGains {
            k_lat: 0.05,
            ..SrGains::default()
        };
        let mut ctrl = SrController::new(&path, world, gains);

        let mut state = VehicleState::planar(Vector3::new(0.0, -0.5, 0.0), 0.0, 4.0, 0.0, &world);
        ctrl.reset(&state);

        let mut prev = ctrl.path_index();
        for k in 0..100 {
            state.position_m.x = 0.3 * k as f64;
            state.time_s = 0.1 * k as f64;
            ctrl.advance(&state, 0.1);

            assert!(ctrl.path_index() >= prev);
            prev = ctrl.path_index();
        }
        assert_eq!(prev, 19);
    }

    #[test]
    fn test_steering_frozen_below_min_speed() {
        let world = WorldFrame::iso();
        let path = line(100, false);
        let gains = SrGains {
            k_lat: 0.01,
            ..SrGains::default()
        };
        let mut ctrl = SrController::new(&path, world, gains);

        // Right of the path, above the minimum speed the angle builds up to
        // the left
        let fast = VehicleState::planar(Vector3::new(0.0, -1.0, 0.0), 0.0, 5.0, 0.0, &world);
        ctrl.reset(&fast);
        let mut out = 0.0;
        for _ in 0..3 {
            out = ctrl.advance(&fast, 0.01);
        }
        assert!(out > 0.0);
        let delta_rad = ctrl.delta_rad();

        // Below it, the angle holds
        let slow = VehicleState::planar(Vector3::new(0.0, -1.0, 0.0), 0.0, 1.0, 0.0, &world);
        for _ in 0..10 {
            assert_eq!(ctrl.advance(&slow, 0.01), out);
            assert_eq!(ctrl.delta_rad(), delta_rad);
        }

        let stopped = VehicleState::planar(Vector3::new(0.0, -1.0, 0.0), 0.0, 0.0, 0.0, &world);
        assert_eq!(ctrl.advance(&stopped, 0.01), out);
    }

    #[test]
    fn test_steering_saturates() {
        let world = WorldFrame::iso();
        let path = line(100, false);
        let gains = SrGains {
            k_lat: 1.0,
            ..SrGains::default()
        };
        let mut ctrl = SrController::new(&path, world, gains);

        let state = VehicleState::planar(Vector3::new(0.0, 10.0, 0.0), 0.0, 5.0, 0.0, &world);
        ctrl.reset(&state);
        assert_eq!(ctrl.advance(&state, 0.01), -1.0);
        assert_eq!(ctrl.delta_rad(), -ctrl.gains().max_steer_angle_rad);
    }

    #[test]
    fn test_preview_on_arc() {
        let world = WorldFrame::iso();
        let path = line(100, false);
        let gains = SrGains {
            wheelbase_m: 2.0,
            preview_time_s: 1.0,
            ..SrGains::default()
        };
        let mut ctrl = SrController::new(&path, world, gains);

        // Steering left with no understeer the turn radius is L / delta
        ctrl.delta_rad = 0.2;
        let radius_m = 2.0 / 0.2;
        let state = VehicleState::planar(Vector3::zeros(), 0.0, 5.0, 0.0, &world);
        let sentinel_m = ctrl.preview_sentinel(&state);

        // On the circle about the turn centre, left of the straight ahead
        let centre_m = Vector3::new(0.0, radius_m, 0.0);
        assert!(((sentinel_m - centre_m).norm() - radius_m).abs() < 1e-9);
        assert!(sentinel_m.y > 0.0);

        // 5 m of arc at radius 10 m
        let theta_rad: f64 = 0.5;
        assert!((sentinel_m.x - radius_m * theta_rad.sin()).abs() < 1e-9);
        assert!((sentinel_m.y - radius_m * (1.0 - theta_rad.cos())).abs() < 1e-9);
    }

    #[test]
    fn test_preview_on_arc_with_understeer() {
        let world = WorldFrame::iso();
        let path = line(100, false);
        let gains = SrGains {
            wheelbase_m: 2.0,
            k_ug: 2.0,
            preview_time_s: 1.0,
            ..SrGains::default()
        };
        let mut ctrl = SrController::new(&path, world, gains);

        // 2 deg/g of understeer at 10 m/s widens the turn
        ctrl.delta_rad = 0.2;
        let u: f64 = 10.0;
        let radius_m = (2.0 + 2f64.to_radians() * u * u / GRAVITY_MS2) / 0.2;
        let state = VehicleState::planar(Vector3::zeros(), 0.0, u, 0.0, &world);
        let sentinel_m = ctrl.preview_sentinel(&state);

        let centre_m = Vector3::new(0.0, radius_m, 0.0);
        assert!(((sentinel_m - centre_m).norm() - radius_m).abs() < 1e-9);

        // 10 m of arc
        let theta_rad = 10.0 / radius_m;
        assert!((sentinel_m.x - radius_m * theta_rad.sin()).abs() < 1e-9);
        assert!((sentinel_m.y - radius_m * (1.0 - theta_rad.cos())).abs() < 1e-9);

        // Not on the circle of the neutral steer radius
        let neutral_centre_m = Vector3::new(0.0, 10.0, 0.0);
        assert!(((sentinel_m - neutral_centre_m).norm() - 10.0).abs() > 1e-3);
    }

    #[test]
    fn test_reset_keeps_gains() {
        let world = WorldFrame::iso();
        let path = line(10, false);
        let gains = SrGains {
            k_lat: 0.2,
            k_ug: 1.0,
            ..SrGains::default()
        };
        let mut ctrl = SrController::new(&path, world, gains);

        let state = VehicleState::planar(Vector3::new(0.0, -1.0, 0.0), 0.0, 5.0, 0.0, &world);
        ctrl.reset(&state);
        ctrl.advance(&state, 0.01);
        assert!(ctrl.delta_rad() != 0.0);

        ctrl.reset(&state);
        assert_eq!(ctrl.delta_rad(), 0.0);
        assert_eq!(ctrl.gains().k_lat, 0.2);
        assert_eq!(ctrl.gains().k_ug, 1.0);
    }

    #[test]
    fn test_gains_round_trip() {
        let path = line(10, false);

        let params: Params = util::params::from_toml_str(
            r#"
            "Preview Time" = 1.5
            "Max Steering Angle" = 0.6
            "Wheelbase" = 3.2
            "Min Speed" = 1.0

            [Gains]
            Klat = 0.1
            Kug = 2.5
            "#
        ).unwrap();
        let ctrl = SrController::from_params(&params, &path);
        assert_eq!(
            ctrl.gains(),
            SrGains {
                k_lat: 0.1,
                k_ug: 2.5,
                preview_time_s: 1.5,
                min_speed_ms: 1.0,
                wheelbase_m: 3.2,
                max_steer_angle_rad: 0.6,
            }
        );

        let ctrl = SrController::from_params(&Params::default(), &path);
        assert_eq!(ctrl.gains(), SrGains::default());

        // Out of range values are clamped
        let params: Params = util::params::from_toml_str(
            r#"
            "Preview Time" = 10.0

            [Gains]
            Klat = -0.3
            Kug = 7.0
            "#
        ).unwrap();
        let gains = SrController::from_params(&params, &path).gains();
        assert_eq!(gains.k_lat, 0.3);
        assert_eq!(gains.k_ug, 5.0);
        assert_eq!(gains.preview_time_s, 4.0);
    }
}
