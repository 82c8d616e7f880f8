//! # XT steering controller
//!
//! The XT controller combines three channels, each with its own filter:
//!
//! - Lateral error, shaped by a PD filter with lag whose gain is `Kp`.
//! - Heading error between the vehicle and the path tangent, through a short
//!   first order lag.
//! - Ackermann angle of the previous demand, `sin(prev_output * max_angle)`,
//!   through the same lag.
//!
//! The weighted sum `Wy y + Wh h + Wa a` is then constrained against counter
//! steering. On a left bend only left (non-negative) demands are allowed, on a
//! right bend only right (non-positive) ones. A section whose curvature is at
//! or below `1 / R_threshold` counts as straight and is left unconstrained.
//!
//! The filters are built on the first advance, once the step interval is
//! known. If the interval later changes a warning is logged and the filters
//! are rebuilt for the new interval, keeping their state.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::Arc;
use log::{debug, warn};
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use super::{
    max_steer_angle_rad, saturate, Params, PidGains, StatusReport,
    SteeringController, SteeringCore, DEFAULT_LOOKAHEAD_M,
    DEFAULT_MAX_STEER_ANGLE_RAD
};
use crate::data_log::DataLog;
use crate::filter::{DtCheck, Pdt1Filter, Pt1Filter, SampleClock};
use crate::path::{PathGeometry, PathTracker};
use crate::vehicle::VehicleState;
use crate::world::{safe_normalize, WorldFrame};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default gain of the lateral error filter
pub const DEFAULT_K_P: f64 = 0.4;

/// Default turn radius above which the path counts as straight.
///
/// Units: meters
pub const DEFAULT_R_THRESHOLD_M: f64 = 100_000.0;

/// Lag of the heading and Ackermann channels.
///
/// Units: seconds
pub const CHANNEL_LAG_S: f64 = 0.030;

/// Lag time constant of the lateral error filter.
///
/// Units: seconds
pub const LAT_LAG_S: f64 = 0.15;

/// Lead time constant of the lateral error filter.
///
/// Units: seconds
pub const LAT_LEAD_S: f64 = 0.3;

/// Ground speed below which the chassis heading is used instead of the
/// direction of travel.
///
/// Units: meters/second
pub const HEADING_SPEED_THRESHOLD_MS: f64 = 1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Effective gains of the XT controller.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct XtGains {
    pub lookahead_m: f64,

    /// Gain of the lateral error filter
    pub k_p: f64,

    /// Lateral error channel weight
    pub w_y: f64,

    /// Heading error channel weight
    pub w_h: f64,

    /// Ackermann angle channel weight
    pub w_a: f64,

    pub r_threshold_m: f64,

    pub max_wheel_angle_rad: f64,
}

/// The three channel filters
#[derive(Debug, Clone)]
struct XtFilters {
    lat: Pdt1Filter,
    head: Pt1Filter,
    ackermann: Pt1Filter,
}

#[derive(Debug, Clone)]
pub struct XtController {
    core: SteeringCore,
    tracker: PathTracker,
    gains: XtGains,

    /// Built on the first advance
    filters: Option<XtFilters>,
    clock: SampleClock,

    /// Demand returned by the previous advance
    prev_output: f64,

    report: StatusReport,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for XtGains {
    fn default() -> Self {
        Self {
            lookahead_m: DEFAULT_LOOKAHEAD_M,
            k_p: DEFAULT_K_P,
            w_y: 1.0,
            w_h: 1.0,
            w_a: 1.0,
            r_threshold_m: DEFAULT_R_THRESHOLD_M,
            max_wheel_angle_rad: DEFAULT_MAX_STEER_ANGLE_RAD,
        }
    }
}

impl XtFilters {
    fn new(dt_s: f64, k_p: f64) -> Self {
        Self {
            lat: Pdt1Filter::configure(dt_s, LAT_LAG_S, LAT_LEAD_S, k_p),
            head: Pt1Filter::configure(dt_s, CHANNEL_LAG_S, 1.0),
            ackermann: Pt1Filter::configure(dt_s, CHANNEL_LAG_S, 1.0),
        }
    }

    fn reconfigure(&mut self, dt_s: f64) {
        self.lat.reconfigure(dt_s);
        self.head.reconfigure(dt_s);
        self.ackermann.reconfigure(dt_s);
    }

    fn reset(&mut self) {
        self.lat.reset();
        self.head.reset();
        self.ackermann.reset();
    }
}

impl XtController {
    pub fn new(path: Arc<dyn PathGeometry>, world: WorldFrame, gains: XtGains) -> Self {
        let max_wheel_angle_rad = if gains.max_wheel_angle_rad > 0.0 {
            gains.max_wheel_angle_rad
        }
        else {
            DEFAULT_MAX_STEER_ANGLE_RAD
        };

        Self {
            core: SteeringCore::new(
                world,
                gains.lookahead_m,
                PidGains { k_p: gains.k_p, k_i: 0.0, k_d: 0.0 }
            ),
            tracker: PathTracker::new(path),
            gains: XtGains {
                max_wheel_angle_rad,
                ..gains
            },
            filters: None,
            clock: SampleClock::default(),
            prev_output: 0.0,
            report: StatusReport::default(),
        }
    }

    pub fn from_params(params: &Params, path: Arc<dyn PathGeometry>) -> Self {
        let defaults = XtGains::default();

        let gains = XtGains {
            lookahead_m: params.lookahead_dist_m.unwrap_or(defaults.lookahead_m),
            k_p: params.gains.k_p.unwrap_or(defaults.k_p),
            w_y: params.gains.w_y.unwrap_or(defaults.w_y),
            w_h: params.gains.w_h.unwrap_or(defaults.w_h),
            w_a: params.gains.w_a.unwrap_or(defaults.w_a),
            max_wheel_angle_rad: max_steer_angle_rad(params),
            ..defaults
        };

        Self::new(path, params.world(), gains)
    }

    pub fn gains(&self) -> XtGains {
        self.gains
    }

    /// Signed angle from the vehicle's direction to the path tangent,
    /// positive when the path turns away to the left.
    ///
    /// Above the speed threshold the direction of travel is used, below it
    /// the chassis heading. A tangent pointing against the direction of
    /// travel is reversed first.
    fn heading_error(&self, state: &VehicleState, tangent: &Vector3<f64>) -> f64 {
        let world = self.core.world();

        let ground_vel_ms = world.project(&state.velocity_ms);
        let a = if ground_vel_ms.norm() < HEADING_SPEED_THRESHOLD_MS {
            safe_normalize(&world.project(&state.forward(world)))
        }
        else {
            safe_normalize(&ground_vel_ms)
        };

        let mut b = safe_normalize(&world.project(tangent));
        if (a - b).norm() >= 1.0 {
            b = -b;
        }

        saturate(world.height(&a.cross(&b)), -1.0, 1.0).asin()
    }

    /// Classify the local bend: +1 left, -1 right, 0 straight.
    ///
    /// `normal` points toward the centre of curvature, so on a left bend it
    /// lies close to the vehicle's left direction.
    fn curvature_code(&self, left: &Vector3<f64>, normal: &Vector3<f64>, curvature_m: f64) -> i8 {
        if curvature_m <= 1.0 / self.gains.r_threshold_m {
            return 0;
        }

        let world = self.core.world();
        let a = safe_normalize(&world.project(left));
        let b = safe_normalize(&world.project(normal));

        if (a - b).norm() < 1.0 {
            1
        }
        else {
            -1
        }
    }
}

impl SteeringController for XtController {
    fn reset(&mut self, state: &VehicleState) {
        self.core.reset(state);
        self.tracker.reset(&self.core.sentinel_m());
        self.prev_output = 0.0;

        if let Some(filters) = self.filters.as_mut() {
            filters.reset();
        }
    }

    fn advance(&mut self, state: &VehicleState, dt_s: f64) -> f64 {
        if let DtCheck::Drift { expected_s, actual_s } = self.clock.check(dt_s) {
            warn!(
                "XT step interval changed from {} s to {} s, reconfiguring filters",
                expected_s, actual_s
            );
            if let Some(filters) = self.filters.as_mut() {
                filters.reconfigure(actual_s);
            }
        }

        let sentinel_m = self.core.update_sentinel(state);
        let frame = self.tracker.closest_frame(&sentinel_m);
        self.core.set_target(frame.point_m);
        self.core.record(state.time_s);

        // Raw channel values
        let y_err_m = self.core.lateral_error(state);
        self.core.accumulate(y_err_m, dt_s);
        let h_err_rad = self.heading_error(state, &frame.tangent);
        let ackermann = (self.prev_output * self.gains.max_wheel_angle_rad).sin();

        let k_p = self.gains.k_p;
        let filters = self.filters.get_or_insert_with(|| XtFilters::new(dt_s, k_p));
        let y_out = filters.lat.filter(y_err_m);
        let h_out = filters.head.filter(h_err_rad);
        let a_out = filters.ackermann.filter(ackermann);

        let raw = self.gains.w_y * y_out + self.gains.w_h * h_out + self.gains.w_a * a_out;

        // No counter steering in bends
        let left = state.left(self.core.world());
        let code = self.curvature_code(&left, &frame.normal, frame.curvature_m);
        let output = match code {
            1 => saturate(raw, 0.0, 1.0),
            -1 => saturate(raw, -1.0, 0.0),
            _ => saturate(raw, -1.0, 1.0),
        };
        self.prev_output = output;

        debug!(
            "XT: y {:.4} m, h {:.4} rad, a {:.4}, code {}, raw {:.4}, output {:.4}",
            y_err_m, h_err_rad, ackermann, code, raw, output
        );

        self.report = StatusReport {
            lat_error_m: y_err_m,
            head_error_rad: Some(h_err_rad),
            curvature_code: Some(code),
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
        "XT"
    }
}
