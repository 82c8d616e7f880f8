//! # Path
//!
//! This module defines the reference path followed by the steering
//! controllers and the two ways the controllers query it.
//!
//! A path is an ordered sequence of 3D points in the world frame, flagged as
//! open or closed. For a closed path the last segment joins the final point
//! back to the first. The geometry is accessed through the [`PathGeometry`]
//! trait, which `Path` implements as a polyline.
//!
//! The two query modes are:
//!
//! - [`PathTracker`]: closest point on the path to a query point, optionally
//!   with the local frame and curvature at that point.
//! - [`SegmentStepper`]: a precomputed list of segments and a current segment
//!   index which only moves forwards (or wraps on closed paths). Used by the
//!   preview controller.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod stepper;
pub mod tracker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::convert::TryFrom;
use std::path::Path as FsPath;
use log::{info, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::world::{safe_normalize, WorldFrame};
pub use stepper::*;
pub use tracker::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Largest curvature reported for a path point.
///
/// Units: 1/meters
pub const MAX_CURVATURE_M: f64 = 1e6;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Queries a steering controller makes on its reference path.
pub trait PathGeometry: std::fmt::Debug + Send + Sync {
    /// Number of points defining the path.
    fn num_points(&self) -> usize;

    /// The point at the given index.
    fn point(&self, index: usize) -> Vector3<f64>;

    /// True if the last point connects back to the first.
    fn is_closed(&self) -> bool;

    /// Local frame and curvature at the point on the path closest to `loc_m`.
    fn closest_frame(&self, loc_m: &Vector3<f64>) -> PathFrame;

    /// The point on the path closest to `loc_m`.
    fn closest_point(&self, loc_m: &Vector3<f64>) -> Vector3<f64> {
        self.closest_frame(loc_m).point_m
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A polyline path of at least two points.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "PathFile")]
pub struct Path {
    /// The points of the path in the world frame.
    points_m: Vec<Vector3<f64>>,

    /// If true the last point connects back to the first.
    closed: bool,

    /// Frame convention the points are given in, used to orient the normal
    /// on straight sections.
    #[serde(rename = "world_frame")]
    world: WorldFrame,
}

/// A path as written in a path file, before validation.
#[derive(Deserialize)]
struct PathFile {
    points_m: Vec<Vector3<f64>>,

    #[serde(default)]
    closed: bool,

    #[serde(default)]
    world_frame: Option<WorldFrame>,
}

/// Local frame of a path at a point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PathFrame {
    /// The point on the path.
    pub point_m: Vector3<f64>,

    /// Unit vector along the direction of travel.
    pub tangent: Vector3<f64>,

    /// Unit vector pointing toward the centre of curvature, or to the left of
    /// the tangent on a straight section.
    pub normal: Vector3<f64>,

    /// `tangent x normal`
    pub binormal: Vector3<f64>,

    /// Unsigned curvature, clamped to `MAX_CURVATURE_M`.
    ///
    /// Units: 1/meters
    pub curvature_m: f64,
}

/// Closest point on one segment of the path.
#[derive(Clone, Copy, Debug)]
struct SegmentHit {
    segment: usize,
    param: f64,
    point_m: Vector3<f64>,
    dist_sq: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PathError {
    #[error("A path needs at least 2 points but {0} were given")]
    TooFewPoints(usize),

    #[error("Could not load the path file: {0}")]
    LoadError(util::params::LoadError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new path from the given points.
    pub fn new(
        points_m: Vec<Vector3<f64>>,
        closed: bool,
        world: WorldFrame
    ) -> Result<Self, PathError> {
        let path = Self {
            points_m,
            closed,
            world,
        };
        path.validate()?;

        Ok(path)
    }

    /// Load a path from a TOML or JSON file.
    ///
    /// Files without a `world_frame` take the given frame. A file giving a
    /// different frame keeps its own, with a warning.
    pub fn from_file<P: AsRef<FsPath>>(
        path_file: P,
        world: WorldFrame
    ) -> Result<Self, PathError> {
        let file: PathFile = util::params::load(path_file.as_ref())
            .map_err(PathError::LoadError)?;

        let path_world = match file.world_frame {
            Some(w) if w != world => {
                warn!(
                    "Path {:?} is given in the {:?} frame but the controller uses \
                    the {:?} frame",
                    path_file.as_ref(), w.kind(), world.kind()
                );
                w
            },
            Some(w) => w,
            None => world
        };

        let path = Self::new(file.points_m, file.closed, path_world)?;

        info!(
            "Loaded path {:?}: {} points, {}",
            path_file.as_ref(),
            path.points_m.len(),
            if path.closed { "closed" } else { "open" }
        );

        Ok(path)
    }

    /// Produces an open straight path between the two points, with each point
    /// in the path having at most the given separation.
    pub fn straight(
        from_m: Vector3<f64>,
        to_m: Vector3<f64>,
        point_sep_m: f64,
        world: WorldFrame
    ) -> Result<Self, PathError> {
        let diff_m = to_m - from_m;
        let dist_m = diff_m.norm();

        // Number of segments needed to keep every separation below the
        // requested one
        let num_segments = if point_sep_m > 0.0 {
            ((dist_m / point_sep_m).ceil() as usize).max(1)
        }
        else {
            1
        };

        let points_m = (0..=num_segments)
            .map(|i| from_m + diff_m * (i as f64 / num_segments as f64))
            .collect();

        Self::new(points_m, false, world)
    }

    /// Produces a closed circular path of `num_points` points about the
    /// vertical axis through `centre_m`, travelled anticlockwise (turning
    /// left) and starting at `centre_m - radius * left`.
    pub fn circle(
        centre_m: Vector3<f64>,
        radius_m: f64,
        num_points: usize,
        world: WorldFrame
    ) -> Result<Self, PathError> {
        let start_offset_m = -radius_m * world.left();

        let points_m = (0..num_points)
            .map(|i| {
                let angle_rad = 2.0 * std::f64::consts::PI * i as f64 / num_points as f64;
                centre_m + world.rotation_about_vertical(angle_rad) * start_offset_m
            })
            .collect();

        Self::new(points_m, true, world)
    }

    /// Number of segments in the path, including the closing segment of a
    /// closed path.
    pub fn num_segments(&self) -> usize {
        match (self.points_m.len(), self.closed) {
            (0, _) | (1, _) => 0,
            (n, true) => n,
            (n, false) => n - 1,
        }
    }

    /// Start and end points of the segment at the given index.
    pub fn segment(&self, index: usize) -> (Vector3<f64>, Vector3<f64>) {
        let n = self.points_m.len();
        (self.points_m[index % n], self.points_m[(index + 1) % n])
    }

    /// Total length of the path.
    pub fn length_m(&self) -> f64 {
        (0..self.num_segments())
            .map(|i| {
                let (a, b) = self.segment(i);
                (b - a).norm()
            })
            .sum()
    }

    fn validate(&self) -> Result<(), PathError> {
        if self.points_m.len() < 2 {
            return Err(PathError::TooFewPoints(self.points_m.len()));
        }
        Ok(())
    }

    /// Find the closest point over all segments.
    fn closest_hit(&self, loc_m: &Vector3<f64>) -> SegmentHit {
        let mut best = SegmentHit {
            segment: 0,
            param: 0.0,
            point_m: self.points_m[0],
            dist_sq: (loc_m - self.points_m[0]).norm_squared(),
        };

        for i in 0..self.num_segments() {
            let (a, b) = self.segment(i);
            let ab = b - a;
            let len_sq = ab.norm_squared();

            let param = if len_sq > 0.0 {
                ((loc_m - a).dot(&ab) / len_sq).max(0.0).min(1.0)
            }
            else {
                0.0
            };

            let point_m = a + param * ab;
            let dist_sq = (loc_m - point_m).norm_squared();

            if dist_sq < best.dist_sq {
                best = SegmentHit {
                    segment: i,
                    param,
                    point_m,
                    dist_sq,
                };
            }
        }

        best
    }

    /// Unit direction of the segment, skipping forward over zero length
    /// segments. Zero if every segment is degenerate.
    fn segment_tangent(&self, index: usize) -> Vector3<f64> {
        let num_segments = self.num_segments();
        for k in 0..num_segments {
            let i = if self.closed {
                (index + k) % num_segments
            }
            else {
                // Look ahead first, then behind
                let ahead = index + k;
                if ahead < num_segments {
                    ahead
                }
                else {
                    match index.checked_sub(ahead + 1 - num_segments) {
                        Some(j) => j,
                        None => break,
                    }
                }
            };

            let (a, b) = self.segment(i);
            let dir = safe_normalize(&(b - a));
            if dir != Vector3::zeros() {
                return dir;
            }
        }

        Vector3::zeros()
    }

    /// Index of the vertex the curvature at a segment hit is evaluated at,
    /// with its neighbours, or `None` if the path has no interior vertex.
    fn curvature_vertices(&self, hit: &SegmentHit) -> Option<(usize, usize, usize)> {
        let n = self.points_m.len();
        let nearest = if hit.param < 0.5 { hit.segment } else { hit.segment + 1 };

        if self.closed {
            if n < 3 {
                return None;
            }
            let v = nearest % n;
            Some(((v + n - 1) % n, v, (v + 1) % n))
        }
        else {
            if n < 3 {
                return None;
            }
            let v = nearest.max(1).min(n - 2);
            Some((v - 1, v, v + 1))
        }
    }
}

impl TryFrom<PathFile> for Path {
    type Error = PathError;

    fn try_from(file: PathFile) -> Result<Self, Self::Error> {
        Self::new(file.points_m, file.closed, file.world_frame.unwrap_or_default())
    }
}

impl PathGeometry for Path {
    fn num_points(&self) -> usize {
        self.points_m.len()
    }

    fn point(&self, index: usize) -> Vector3<f64> {
        self.points_m[index]
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn closest_frame(&self, loc_m: &Vector3<f64>) -> PathFrame {
        let hit = self.closest_hit(loc_m);
        let tangent = self.segment_tangent(hit.segment);

        // Curvature and bend direction from the three vertices around the
        // hit
        let (curvature_m, bend) = match self.curvature_vertices(&hit) {
            Some((i0, i1, i2)) => menger_curvature(
                &self.points_m[i0], &self.points_m[i1], &self.points_m[i2]
            ),
            None => (0.0, Vector3::zeros())
        };

        let bend_axis = safe_normalize(&bend);
        let mut normal = safe_normalize(&bend_axis.cross(&tangent));
        if normal == Vector3::zeros() {
            normal = safe_normalize(&self.world.vertical().cross(&tangent));
        }

        PathFrame {
            point_m: hit.point_m,
            tangent,
            normal,
            binormal: tangent.cross(&normal),
            curvature_m,
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Menger curvature of the triangle `a, b, c`, and the turning axis
/// `(b - a) x (c - b)`.
///
/// Repeated points give either zero (collinear) or `MAX_CURVATURE_M`.
pub fn menger_curvature(
    a: &Vector3<f64>,
    b: &Vector3<f64>,
    c: &Vector3<f64>
) -> (f64, Vector3<f64>) {
    let ab = b - a;
    let bc = c - b;
    let ac = c - a;

    let bend = ab.cross(&bc);
    let twice_area = bend.norm();
    let denom = ab.norm() * bc.norm() * ac.norm();

    let curvature_m = if denom > 0.0 {
        2.0 * twice_area / denom
    }
    else if twice_area > 0.0 {
        MAX_CURVATURE_M
    }
    else {
        0.0
    };

    (curvature_m.min(MAX_CURVATURE_M), bend)
}
