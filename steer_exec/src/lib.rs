//! # Steering control library.
//!
//! This library provides the lateral steering controllers and the pieces they
//! are built from, so that hosts other than the `steer_exec` binary can drive
//! them.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Data collection - per controller log of target and sentinel points
pub mod data_log;

/// Filters - first order lag and PD with lag filters used by the controllers
pub mod filter;

/// Path - reference path geometry, closest point tracking and segment stepping
pub mod path;

/// Kinematic host - single track vehicle used to run the controllers standalone
pub mod sim;

/// Steering control module - the controllers themselves and their configuration
pub mod steer_ctrl;

/// Vehicle state - snapshot of the vehicle passed to the controllers each step
pub mod vehicle;

/// World frame - forward and vertical conventions and ground plane projection
pub mod world;
