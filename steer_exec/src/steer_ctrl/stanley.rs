//! # Stanley steering controller
//!
//! Control law, with `e` the lateral error and `u` the speed:
//!
//! ```text
//! delta = h + atan(Kp e / max(u, v_min)) + Kd e_dot + Ki int(e)
//! ```
//!
//! where `h` is the heading error to the path tangent and
//! `e_dot = -u sin(atan(Kp e / max(u, v_min)))` is the kinematic rate of the
//! lateral error. The demand `delta / delta_max` is saturated to `[-1, 1]`
//! and passed through a first order lag modelling the driver's reaction
//! delay.
//!
//! Lateral errors inside the dead zone are ignored. Between one and two dead
//! zone widths the error is faded in smoothly so small path disturbances do
//! not cause chattering.
//!
//! The integral and the cached previous error are cleared every reset
//! interval to bound windup.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::Arc;
use log::{debug, trace, warn};
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use super::{
    max_steer_angle_rad, saturate, Params, PidGains, StatusReport,
    SteeringController, SteeringCore, DEFAULT_LOOKAHEAD_M,
    DEFAULT_MAX_STEER_ANGLE_RAD
};
use crate::data_log::DataLog;
use crate::filter::{DtCheck, Pt1Filter, SampleClock};
use crate::path::{PathGeometry, PathTracker};
use crate::vehicle::VehicleState;
use crate::world::{safe_normalize, WorldFrame};
use util::maths::sine_step;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Units: meters/second
pub const DEFAULT_MIN_SPEED_MS: f64 = 1.0;

/// Interval between integral resets.
///
/// Units: seconds
pub const DEFAULT_RESET_INTERVAL_S: f64 = 30.0;

/// Driver reaction delay.
///
/// Units: seconds
pub const DEFAULT_DELAY_S: f64 = 0.4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Effective gains of the Stanley controller.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct StanleyGains {
    pub lookahead_m: f64,

    /// Non-negative PID gains
    pub pid: PidGains,

    pub dead_zone_m: f64,

    pub min_speed_ms: f64,

    pub max_steer_angle_rad: f64,

    pub reset_interval_s: f64,

    pub delay_s: f64,
}

#[derive(Debug, Clone)]
pub struct StanleyController {
    core: SteeringCore,
    tracker: PathTracker,
    gains: StanleyGains,

    /// Reaction delay, built on the first advance
    delay: Option<Pt1Filter>,
    clock: SampleClock,

    /// Time left until the integral is cleared
    time_to_reset_s: f64,

    report: StatusReport,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for StanleyGains {
    fn default() -> Self {
        Self {
            lookahead_m: DEFAULT_LOOKAHEAD_M,
            pid: PidGains::default(),
            dead_zone_m: 0.0,
            min_speed_ms: DEFAULT_MIN_SPEED_MS,
            max_steer_angle_rad: DEFAULT_MAX_STEER_ANGLE_RAD,
            reset_interval_s: DEFAULT_RESET_INTERVAL_S,
            delay_s: DEFAULT_DELAY_S,
        }
    }
}

impl StanleyController {
    pub fn new(path: Arc<dyn PathGeometry>, world: WorldFrame, gains: StanleyGains) -> Self {
        let gains = StanleyGains {
            pid: PidGains {
                k_p: gains.pid.k_p.abs(),
                k_i: gains.pid.k_i.abs(),
                k_d: gains.pid.k_d.abs(),
            },
            dead_zone_m: gains.dead_zone_m.max(0.0),
            min_speed_ms: gains.min_speed_ms.abs(),
            max_steer_angle_rad: if gains.max_steer_angle_rad > 0.0 {
                gains.max_steer_angle_rad
            } else {
                DEFAULT_MAX_STEER_ANGLE_RAD
            },
            ..gains
        };

        Self {
            core: SteeringCore::new(world, gains.lookahead_m, gains.pid),
            tracker: PathTracker::new(path),
            gains,
            delay: None,
            clock: SampleClock::default(),
            time_to_reset_s: gains.reset_interval_s,
            report: StatusReport::default(),
        }
    }

    pub fn from_params(params: &Params, path: Arc<dyn PathGeometry>) -> Self {
        let defaults = StanleyGains::default();

        let gains = StanleyGains {
            lookahead_m: params.lookahead_dist_m.unwrap_or(defaults.lookahead_m),
            pid: PidGains {
                k_p: params.gains.k_p.unwrap_or(defaults.pid.k_p),
                k_i: params.gains.k_i.unwrap_or(defaults.pid.k_i),
                k_d: params.gains.k_d.unwrap_or(defaults.pid.k_d),
            },
            dead_zone_m: params.dead_zone_m.unwrap_or(defaults.dead_zone_m),
            min_speed_ms: params.min_speed_ms.unwrap_or(defaults.min_speed_ms),
            max_steer_angle_rad: max_steer_angle_rad(params),
            ..defaults
        };

        Self::new(path, params.world(), gains)
    }

    pub fn gains(&self) -> StanleyGains {
        self.gains
    }

    /// Heading error between the chassis and the path tangent, positive when
    /// the path turns away to the left.
    fn heading_error(&self, state: &VehicleState, tangent: &Vector3<f64>) -> f64 {
        let world = self.core.world();
        let a = safe_normalize(&world.project(&state.forward(world)));
        let b = safe_normalize(&world.project(tangent));

        saturate(world.height(&a.cross(&b)), -1.0, 1.0).asin()
    }
}

impl SteeringController for StanleyController {
    fn reset(&mut self, state: &VehicleState) {
        self.core.reset(state);
        self.tracker.reset(&self.core.sentinel_m());
        self.time_to_reset_s = self.gains.reset_interval_s;

        if let Some(delay) = self.delay.as_mut() {
            delay.reset();
        }
    }

    fn advance(&mut self, state: &VehicleState, dt_s: f64) -> f64 {
        if let DtCheck::Drift { expected_s, actual_s } = self.clock.check(dt_s) {
            warn!(
                "Stanley step interval changed from {} s to {} s, reconfiguring the delay filter",
                expected_s, actual_s
            );
            if let Some(delay) = self.delay.as_mut() {
                delay.reconfigure(actual_s);
            }
        }

        let sentinel_m = self.core.update_sentinel(state);
        let frame = self.tracker.closest_frame(&sentinel_m);
        self.core.set_target(frame.point_m);
        self.core.record(state.time_s);

        let raw_err_m = self.core.lateral_error(state);
        let err_m = dead_zone_weight(raw_err_m, self.gains.dead_zone_m) * raw_err_m;

        let pid = self.gains.pid;
        let u = state.speed_ms;
        let u_eff = u.max(self.gains.min_speed_ms).max(std::f64::MIN_POSITIVE);
        let cross_track_rad = (pid.k_p * err_m / u_eff).atan();
        let err_rate_ms = -u * cross_track_rad.sin();

        self.core.accumulate(err_m, dt_s);

        let head_err_rad = self.heading_error(state, &frame.tangent);

        let delta_rad = head_err_rad
            + cross_track_rad
            + pid.k_d * err_rate_ms
            + pid.k_i * self.core.err_integral();
        let raw = delta_rad / self.gains.max_steer_angle_rad;
        let steer = saturate(raw, -1.0, 1.0);

        self.time_to_reset_s -= dt_s;
        if self.time_to_reset_s <= 0.0 {
            trace!("Stanley integral reset at {} s", state.time_s);
            self.time_to_reset_s = self.gains.reset_interval_s;
            self.core.clear_integral();
        }

        let delay_s = self.gains.delay_s;
        let output = self.delay
            .get_or_insert_with(|| Pt1Filter::configure(dt_s, delay_s, 1.0))
            .filter(steer);

        debug!(
            "Stanley: err {:.4} m, h {:.4} rad, delta {:.4} rad, output {:.4}",
            err_m, head_err_rad, delta_rad, output
        );

        self.report = StatusReport {
            lat_error_m: err_m,
            head_error_rad: Some(head_err_rad),
            raw_output: raw,
            output,
            num_dt_drifts: self.clock.num_drifts(),
            ..StatusReport::new(state.time_s, &sentinel_m, &frame.point_m)
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
        "Stanley"
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Weight applied to a lateral error by a dead zone of half width
/// `dead_zone_m`.
///
/// Zero inside the dead zone, one beyond twice its width, with a smooth
/// transition between. A non-positive width disables the dead zone.
pub fn dead_zone_weight(err_m: f64, dead_zone_m: f64) -> f64 {
    if dead_zone_m > 0.0 {
        sine_step(err_m.abs(), dead_zone_m, 0.0, 2.0 * dead_zone_m, 1.0)
    }
    else {
        1.0
    }
}
