//! Steering control executable entry point.
//!
//! # Architecture
//!
//! The executable runs one of the steering controllers against a kinematic
//! single track vehicle:
//!
//!     - Initialise the session and logging
//!     - Load the controller parameters and the reference path
//!     - Place the vehicle at the start of the path with a lateral offset
//!     - Main loop:
//!         - Advance the controller on the current vehicle state
//!         - Archive the controller's status report
//!         - Integrate the vehicle with the steering demand
//!     - Export the controller's data log and a run summary
//!
//! # Usage
//!
//! ```text
//! STEER_PARAMS_DIR=params steer_exec --ctrl stanley --path oval_path.toml
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::path::PathBuf;
use std::sync::Arc;
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, info, warn};
use nalgebra::Vector3;
use serde::Serialize;
use structopt::StructOpt;

// Internal
use steer_lib::{
    path::{Path, PathGeometry},
    sim::{KinematicVehicle, VehicleParams},
    steer_ctrl::{
        self,
        Params,
        SteerCtrl,
        SteerCtrlKind,
        SteeringController,
        sr::DEFAULT_WHEELBASE_M
    },
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Radius of the circular path used when no path file is given.
///
/// Units: meters
const DEFAULT_PATH_RADIUS_M: f64 = 50.0;

/// Number of points in the default circular path.
const DEFAULT_PATH_NUM_POINTS: usize = 360;

/// Number of cycles between progress messages.
const PROGRESS_INTERVAL_CYCLES: u64 = 1000;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Run a steering controller against a kinematic vehicle.
#[derive(Debug, StructOpt)]
#[structopt(name = "steer_exec")]
struct Opts {
    /// Controller to run: path_follow (or pid), xt, sr, stanley
    #[structopt(short, long, default_value = "path_follow")]
    ctrl: SteerCtrlKind,

    /// Controller parameter file (TOML or JSON)
    #[structopt(short, long, parse(from_os_str), default_value = "steer_ctrl.toml")]
    params: PathBuf,

    /// Reference path file (TOML or JSON), a circle is used if not given
    #[structopt(long, parse(from_os_str))]
    path: Option<PathBuf>,

    /// Length of the run in seconds
    #[structopt(long, default_value = "60.0")]
    duration_s: f64,

    /// Controller and vehicle step in seconds
    #[structopt(long, default_value = "0.01")]
    dt_s: f64,

    /// Vehicle speed in meters per second
    #[structopt(long, default_value = "5.0")]
    speed_ms: f64,

    /// Initial offset of the vehicle to the right of the path in meters
    #[structopt(long, default_value = "1.0")]
    offset_m: f64,

    /// Export the controller's data log to this file at the end of the run
    #[structopt(long, parse(from_os_str))]
    data_log: Option<PathBuf>,
}

/// Summary of a run, saved into the session directory.
#[derive(Debug, Serialize)]
struct RunSummary {
    ctrl: SteerCtrlKind,
    num_cycles: u64,
    duration_s: f64,
    max_abs_lat_error_m: f64,
    rms_lat_error_m: f64,
    num_dt_drifts: u64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    let opts = Opts::from_args();

    // Initialise session
    let session = Session::new(
        "steer_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Info, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Steering Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opts);

    if !(opts.dt_s > 0.0) {
        return Err(eyre!("The step must be positive, found {} s", opts.dt_s));
    }

    // ---- LOAD PARAMETERS ----

    let params: Params = util::params::load(&opts.params)
        .wrap_err("Could not load steering control params")?;

    info!("Steering control parameters loaded from {:?}", opts.params);

    let world = params.world();

    // ---- LOAD PATH ----

    let path = match opts.path {
        Some(ref p) => Path::from_file(p, world)
            .wrap_err("Failed to load the reference path")?,
        None => {
            info!(
                "No path provided, using a {} m radius circle",
                DEFAULT_PATH_RADIUS_M
            );
            Path::circle(
                Vector3::zeros(),
                DEFAULT_PATH_RADIUS_M,
                DEFAULT_PATH_NUM_POINTS,
                world
            ).wrap_err("Failed to build the default path")?
        }
    };

    info!("Path length: {:.02} m", path.length_m());

    // ---- INITIALISE VEHICLE ----

    let (start_m, next_m) = path.segment(0);
    let dir_m = world.project(&(next_m - start_m));
    let heading_rad = dir_m.dot(&world.left()).atan2(dir_m.dot(&world.forward()));

    let vehicle_params = VehicleParams {
        wheelbase_m: match params.wheelbase_m {
            Some(l) if l > 0.0 => l,
            _ => DEFAULT_WHEELBASE_M
        },
        max_steer_angle_rad: steer_ctrl::max_steer_angle_rad(&params),
    };

    let start_offset_m = -opts.offset_m
        * (world.rotation_about_vertical(heading_rad) * world.left());

    let mut vehicle = KinematicVehicle::new(
        world,
        vehicle_params,
        start_m + start_offset_m,
        heading_rad,
        opts.speed_ms
    );

    info!("Vehicle initialised: {:?}", vehicle_params);

    // ---- INITIALISE CONTROLLER ----

    let path: Arc<dyn PathGeometry> = Arc::new(path);
    let mut ctrl = SteerCtrl::from_params(opts.ctrl, &params, path);
    ctrl.reset(&vehicle.state());

    if opts.data_log.is_some() {
        ctrl.data_log_mut().start();
    }

    let mut archiver = Archiver::from_path(&session, "steer_ctrl/status.csv")
        .wrap_err("Failed to create the status archive")?;

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let num_cycles = (opts.duration_s / opts.dt_s).ceil().max(0.0) as u64;
    let mut max_abs_lat_error_m = 0f64;
    let mut sum_sq_lat_error_m2 = 0f64;

    for cycle in 0..num_cycles {
        let state = vehicle.state();
        let demand = ctrl.advance(&state, opts.dt_s);
        let report = ctrl.report();

        max_abs_lat_error_m = max_abs_lat_error_m.max(report.lat_error_m.abs());
        sum_sq_lat_error_m2 += report.lat_error_m.powi(2);

        if let Err(e) = archiver.serialise(report) {
            warn!("Could not archive the status report: {}", e);
        }

        if cycle % PROGRESS_INTERVAL_CYCLES == 0 {
            info!(
                "t = {:.02} s, lateral error = {:+.03} m, demand = {:+.03}",
                state.time_s,
                report.lat_error_m,
                demand
            );
        }

        vehicle.step(demand, opts.dt_s);
    }

    info!("End of main loop\n");

    // ---- EXPORT ----

    if let Some(ref data_log_path) = opts.data_log {
        ctrl.data_log_mut().stop();
        ctrl.data_log().write_file(data_log_path)
            .wrap_err("Failed to write the data log")?;
    }

    let summary = RunSummary {
        ctrl: ctrl.kind(),
        num_cycles,
        duration_s: vehicle.time_s(),
        max_abs_lat_error_m,
        rms_lat_error_m: if num_cycles > 0 {
            (sum_sq_lat_error_m2 / num_cycles as f64).sqrt()
        }
        else {
            0.0
        },
        num_dt_drifts: ctrl.report().num_dt_drifts,
    };

    info!("Run summary: {:#?}", summary);

    session.save_json("summary.json", &summary)
        .wrap_err("Failed to save the run summary")?;

    Ok(())
}
