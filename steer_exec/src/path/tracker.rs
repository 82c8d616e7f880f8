//! Closest point path tracking

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::Arc;
use nalgebra::Vector3;

// Internal
use super::{PathFrame, PathGeometry};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Finds the closest point on a path to a query point.
///
/// The tracker remembers the last query result so that controllers can
/// report it.
#[derive(Debug, Clone)]
pub struct PathTracker {
    path: Arc<dyn PathGeometry>,

    last_frame: Option<PathFrame>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathTracker {
    pub fn new(path: Arc<dyn PathGeometry>) -> Self {
        Self {
            path,
            last_frame: None,
        }
    }

    /// Re-seed the tracker at the given location.
    pub fn reset(&mut self, loc_m: &Vector3<f64>) {
        self.last_frame = Some(self.path.closest_frame(loc_m));
    }

    /// The closest point on the path to `loc_m`.
    pub fn closest_point(&mut self, loc_m: &Vector3<f64>) -> Vector3<f64> {
        self.closest_frame(loc_m).point_m
    }

    /// The closest point on the path to `loc_m` with the local frame and
    /// curvature there.
    pub fn closest_frame(&mut self, loc_m: &Vector3<f64>) -> PathFrame {
        let frame = self.path.closest_frame(loc_m);
        self.last_frame = Some(frame);
        frame
    }

    /// Result of the most recent query, if any.
    pub fn last_frame(&self) -> Option<&PathFrame> {
        self.last_frame.as_ref()
    }

    pub fn path(&self) -> &Arc<dyn PathGeometry> {
        &self.path
    }
}
