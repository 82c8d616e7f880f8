//! # Steering control module
//!
//! Steering control keeps a ground vehicle on a reference path by producing a
//! normalised steering demand in `[-1, 1]` every step, positive steering to
//! the left.
//!
//! All controllers share the idea of a sentinel point, a point ahead of the
//! vehicle, and a target point, the point on the path the sentinel should be
//! brought onto. The lateral error is the ground plane distance between the
//! two, signed positive when the target is to the left of the vehicle.
//!
//! Four controllers are provided:
//!
//! - `PathFollow`: PID on the lateral error, sentinel on a straight lookahead
//!   ray, target the closest point on the path.
//! - `Xt`: weighted sum of a filtered lateral error, heading error and
//!   Ackermann angle channel, with a constraint against counter steering in
//!   bends.
//! - `Sr`: preview controller placing the sentinel on the arc a single track
//!   vehicle would follow, integrating the lateral error into the steering
//!   angle.
//! - `Stanley`: heading error plus the arctangent of the speed scaled lateral
//!   error, with a dead zone and a reaction delay.
//!
//! The host calls `reset` once before a run and then `advance` once per
//! simulation step.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod base;
pub mod params;
pub mod path_follow;
pub mod sr;
pub mod stanley;
pub mod xt;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fmt;
use std::path::Path as FsPath;
use std::str::FromStr;
use std::sync::Arc;
use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::data_log::DataLog;
use crate::path::PathGeometry;
use crate::vehicle::VehicleState;
pub use base::{PidGains, SteeringCore};
pub use params::Params;
pub use path_follow::{PathFollowController, PathFollowGains};
pub use sr::{SrController, SrGains};
pub use stanley::{StanleyController, StanleyGains};
pub use xt::{XtController, XtGains};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Sentinel distance used when none is configured.
///
/// Units: meters
pub const DEFAULT_LOOKAHEAD_M: f64 = 5.0;

/// Maximum steering angle used when none (or a non-positive one) is
/// configured.
///
/// Units: radians
pub const DEFAULT_MAX_STEER_ANGLE_RAD: f64 = 25.0 * std::f64::consts::PI / 180.0;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The capabilities shared by every steering controller.
pub trait SteeringController {
    /// Prepare the controller for a new run starting from the given state.
    ///
    /// The data log is not cleared.
    fn reset(&mut self, state: &VehicleState);

    /// Advance the controller by one step of `dt_s` seconds and return the
    /// steering demand, in `[-1, 1]`.
    fn advance(&mut self, state: &VehicleState, dt_s: f64) -> f64;

    fn data_log(&self) -> &DataLog;

    fn data_log_mut(&mut self) -> &mut DataLog;

    /// Monitoring quantities from the most recent advance.
    fn report(&self) -> StatusReport;

    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The status report containing monitoring quantities for a single advance.
///
/// Vectors are flattened so the report can be archived as a CSV row.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// Simulated time of the advance
    pub time_s: f64,

    pub sentinel_x_m: f64,
    pub sentinel_y_m: f64,
    pub sentinel_z_m: f64,

    pub target_x_m: f64,
    pub target_y_m: f64,
    pub target_z_m: f64,

    /// Signed lateral error, positive when the target is to the left
    pub lat_error_m: f64,

    /// Heading error to the path tangent, for controllers which use it
    pub head_error_rad: Option<f64>,

    /// Bend classification: +1 left, -1 right, 0 straight
    pub curvature_code: Option<i8>,

    /// Current segment index, for controllers which step along the path
    pub path_index: Option<usize>,

    /// Demand before saturation and filtering
    pub raw_output: f64,

    /// Demand returned to the host
    pub output: f64,

    /// Number of times the step interval has changed since the controller
    /// was created
    pub num_dt_drifts: u64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The available steering controllers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteerCtrlKind {
    PathFollow,
    Xt,
    Sr,
    Stanley,
}

/// A steering controller of any kind.
#[derive(Debug, Clone)]
pub enum SteerCtrl {
    PathFollow(PathFollowController),
    Xt(XtController),
    Sr(SrController),
    Stanley(StanleyController),
}

#[derive(Debug, Error)]
pub enum SteerCtrlError {
    #[error("Unknown steering controller \"{0}\", expected one of path_follow, xt, sr, stanley")]
    UnknownKind(String),

    #[error("Could not load the steering parameters: {0}")]
    ParamLoadError(util::params::LoadError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StatusReport {
    /// Start a new report for the given time, sentinel and target.
    pub fn new(time_s: f64, sentinel_m: &Vector3<f64>, target_m: &Vector3<f64>) -> Self {
        Self {
            time_s,
            sentinel_x_m: sentinel_m.x,
            sentinel_y_m: sentinel_m.y,
            sentinel_z_m: sentinel_m.z,
            target_x_m: target_m.x,
            target_y_m: target_m.y,
            target_z_m: target_m.z,
            ..Default::default()
        }
    }

    pub fn sentinel_m(&self) -> Vector3<f64> {
        Vector3::new(self.sentinel_x_m, self.sentinel_y_m, self.sentinel_z_m)
    }

    pub fn target_m(&self) -> Vector3<f64> {
        Vector3::new(self.target_x_m, self.target_y_m, self.target_z_m)
    }
}

impl SteerCtrlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SteerCtrlKind::PathFollow => "path_follow",
            SteerCtrlKind::Xt => "xt",
            SteerCtrlKind::Sr => "sr",
            SteerCtrlKind::Stanley => "stanley",
        }
    }
}

impl fmt::Display for SteerCtrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SteerCtrlKind {
    type Err = SteerCtrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path_follow" | "pid" => Ok(SteerCtrlKind::PathFollow),
            "xt" => Ok(SteerCtrlKind::Xt),
            "sr" => Ok(SteerCtrlKind::Sr),
            "stanley" => Ok(SteerCtrlKind::Stanley),
            _ => Err(SteerCtrlError::UnknownKind(s.to_string())),
        }
    }
}

impl SteerCtrl {
    /// Build a controller of the given kind from a parameter record.
    ///
    /// Fields missing from the record take the controller's defaults.
    pub fn from_params(
        kind: SteerCtrlKind,
        params: &Params,
        path: Arc<dyn PathGeometry>
    ) -> Self {
        let ctrl = match kind {
            SteerCtrlKind::PathFollow => SteerCtrl::PathFollow(
                PathFollowController::from_params(params, path)
            ),
            SteerCtrlKind::Xt => SteerCtrl::Xt(
                XtController::from_params(params, path)
            ),
            SteerCtrlKind::Sr => SteerCtrl::Sr(
                SrController::from_params(params, path.as_ref())
            ),
            SteerCtrlKind::Stanley => SteerCtrl::Stanley(
                StanleyController::from_params(params, path)
            ),
        };

        info!("Created {} steering controller", ctrl.name());

        ctrl
    }

    /// Build a controller of the given kind from a TOML or JSON parameter
    /// file.
    pub fn from_file<P: AsRef<FsPath>>(
        kind: SteerCtrlKind,
        param_file: P,
        path: Arc<dyn PathGeometry>
    ) -> Result<Self, SteerCtrlError> {
        let params: Params = util::params::load(param_file.as_ref())
            .map_err(SteerCtrlError::ParamLoadError)?;

        info!("Loaded parameters: {:?}", param_file.as_ref());

        Ok(Self::from_params(kind, &params, path))
    }

    pub fn kind(&self) -> SteerCtrlKind {
        match self {
            SteerCtrl::PathFollow(_) => SteerCtrlKind::PathFollow,
            SteerCtrl::Xt(_) => SteerCtrlKind::Xt,
            SteerCtrl::Sr(_) => SteerCtrlKind::Sr,
            SteerCtrl::Stanley(_) => SteerCtrlKind::Stanley,
        }
    }

    fn inner(&self) -> &dyn SteeringController {
        match self {
            SteerCtrl::PathFollow(c) => c,
            SteerCtrl::Xt(c) => c,
            SteerCtrl::Sr(c) => c,
            SteerCtrl::Stanley(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SteeringController {
        match self {
            SteerCtrl::PathFollow(c) => c,
            SteerCtrl::Xt(c) => c,
            SteerCtrl::Sr(c) => c,
            SteerCtrl::Stanley(c) => c,
        }
    }
}

impl SteeringController for SteerCtrl {
    fn reset(&mut self, state: &VehicleState) {
        self.inner_mut().reset(state)
    }

    fn advance(&mut self, state: &VehicleState, dt_s: f64) -> f64 {
        self.inner_mut().advance(state, dt_s)
    }

    fn data_log(&self) -> &DataLog {
        self.inner().data_log()
    }

    fn data_log_mut(&mut self) -> &mut DataLog {
        self.inner_mut().data_log_mut()
    }

    fn report(&self) -> StatusReport {
        self.inner().report()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// The configured maximum steering angle if it is positive, otherwise the
/// default.
pub fn max_steer_angle_rad(params: &Params) -> f64 {
    match params.max_steer_angle_rad {
        Some(a) if a > 0.0 => a,
        _ => DEFAULT_MAX_STEER_ANGLE_RAD
    }
}

/// Saturate a demand to `[min, max]`, mapping NaN to zero.
pub(crate) fn saturate(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    }
    else {
        value.max(min).min(max)
    }
}
