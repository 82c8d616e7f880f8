//! # Path following controller
//!
//! The plain PID path follower. The sentinel sits on a straight ray ahead of
//! the vehicle and the target is the closest point on the path to it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::Arc;
use log::debug;
use serde::Serialize;

// Internal
use super::{
    saturate, Params, PidGains, StatusReport, SteeringController, SteeringCore,
    DEFAULT_LOOKAHEAD_M
};
use crate::data_log::DataLog;
use crate::path::{PathGeometry, PathTracker};
use crate::vehicle::VehicleState;
use crate::world::WorldFrame;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Effective gains of the path following controller.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct PathFollowGains {
    pub lookahead_m: f64,
    pub pid: PidGains,
}

#[derive(Debug, Clone)]
pub struct PathFollowController {
    core: SteeringCore,
    tracker: PathTracker,
    report: StatusReport,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PathFollowGains {
    /// Zero PID gains, so the controller gives no output until tuned.
    fn default() -> Self {
        Self {
            lookahead_m: DEFAULT_LOOKAHEAD_M,
            pid: PidGains::default(),
        }
    }
}

impl PathFollowController {
    pub fn new(path: Arc<dyn PathGeometry>, world: WorldFrame, gains: PathFollowGains) -> Self {
        Self {
            core: SteeringCore::new(world, gains.lookahead_m, gains.pid),
            tracker: PathTracker::new(path),
            report: StatusReport::default(),
        }
    }

    pub fn from_params(params: &Params, path: Arc<dyn PathGeometry>) -> Self {
        let defaults = PathFollowGains::default();

        let gains = PathFollowGains {
            lookahead_m: params.lookahead_dist_m.unwrap_or(defaults.lookahead_m),
            pid: PidGains {
                k_p: params.gains.k_p.unwrap_or(defaults.pid.k_p),
                k_i: params.gains.k_i.unwrap_or(defaults.pid.k_i),
                k_d: params.gains.k_d.unwrap_or(defaults.pid.k_d),
            },
        };

        Self::new(path, params.world(), gains)
    }

    pub fn gains(&self) -> PathFollowGains {
        PathFollowGains {
            lookahead_m: self.core.lookahead_m(),
            pid: self.core.gains(),
        }
    }

    pub fn core(&self) -> &SteeringCore {
        &self.core
    }
}

impl SteeringController for PathFollowController {
    fn reset(&mut self, state: &VehicleState) {
        self.core.reset(state);
        self.tracker.reset(&self.core.sentinel_m());
    }

    fn advance(&mut self, state: &VehicleState, dt_s: f64) -> f64 {
        let sentinel_m = self.core.update_sentinel(state);
        self.core.set_target(self.tracker.closest_point(&sentinel_m));
        self.core.record(state.time_s);

        let err_m = self.core.lateral_error(state);
        self.core.accumulate(err_m, dt_s);

        let raw = self.core.pid_output();
        let output = saturate(raw, -1.0, 1.0);

        debug!("PathFollow: err {:.4} m, raw {:.4}, output {:.4}", err_m, raw, output);

        self.report = StatusReport {
            lat_error_m: err_m,
            raw_output: raw,
            output,
            ..StatusReport::new(state.time_s, &sentinel_m, &self.core.target_m())
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
        "PathFollow"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::Path;
    use nalgebra::Vector3;

    fn straight_path() -> Arc<dyn PathGeometry> {
        Arc::new(Path::new(
            vec![Vector3::zeros(), Vector3::new(100.0, 0.0, 0.0)],
            false,
            WorldFrame::iso()
        ).unwrap())
    }

    fn controller(lookahead_m: f64, k_p: f64, k_i: f64, k_d: f64) -> PathFollowController {
        PathFollowController::new(
            straight_path(),
            WorldFrame::iso(),
            PathFollowGains {
                lookahead_m,
                pid: PidGains { k_p, k_i, k_d },
            }
        )
    }

    #[test]
    fn test_scenario_straight_path() {
        let world = WorldFrame::iso();
        let state = VehicleState::planar(Vector3::new(0.0, -1.0, 0.0), 0.0, 5.0, 0.0, &world);

        let mut ctrl = controller(5.0, 0.1, 0.0, 0.0);
        ctrl.reset(&state);
        let out = ctrl.advance(&state, 0.01);

        let report = ctrl.report();
        assert!((report.sentinel_m() - Vector3::new(5.0, -1.0, 0.0)).norm() < 1e-9);
        assert!((report.target_m() - Vector3::new(5.0, 0.0, 0.0)).norm() < 1e-9);
        assert!((report.lat_error_m - 1.0).abs() < 1e-9);
        assert!((out - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_zero_error_gives_zero_output() {
        let world = WorldFrame::iso();

        for lookahead_m in [0.0, 1.0, 5.0, 25.0].iter() {
            let mut ctrl = controller(*lookahead_m, 0.7, 0.0, 0.0);
            let state = VehicleState::planar(Vector3::new(10.0, 0.0, 0.0), 0.0, 5.0, 0.0, &world);
            ctrl.reset(&state);

            for i in 0..20 {
                let state = VehicleState::planar(
                    Vector3::new(10.0 + i as f64, 0.0, 0.0), 0.0, 5.0, 0.01 * i as f64, &world
                );
                assert_eq!(ctrl.advance(&state, 0.01), 0.0);
            }
        }
    }

    #[test]
    fn test_output_saturates() {
        let world = WorldFrame::iso();
        let state = VehicleState::planar(Vector3::new(0.0, -30.0, 0.0), 0.0, 5.0, 0.0, &world);

        let mut ctrl = controller(5.0, 1.0, 0.0, 0.0);
        ctrl.reset(&state);
        assert_eq!(ctrl.advance(&state, 0.01), 1.0);
        assert!((ctrl.report().raw_output - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_gains_round_trip() {
        let params: Params = util::params::from_toml_str(
            r#"
            "Lookahead Distance" = 7.5

            [Gains]
            Kp = 0.8
            Ki = 0.01
            Kd = 0.05
            "#
        ).unwrap();
        let ctrl = PathFollowController::from_params(&params, straight_path());
        assert_eq!(
            ctrl.gains(),
            PathFollowGains {
                lookahead_m: 7.5,
                pid: PidGains { k_p: 0.8, k_i: 0.01, k_d: 0.05 },
            }
        );

        let ctrl = PathFollowController::from_params(&Params::default(), straight_path());
        assert_eq!(ctrl.gains(), PathFollowGains::default());
    }
}
