//! # Segment stepping
//!
//! The preview controller follows the path as a list of straight segments,
//! keeping track of the segment its sentinel point is currently alongside.
//! Each step the sentinel is projected onto the current segment's direction.
//! If the projection lies beyond the end of the segment the index advances,
//! wrapping to zero on a closed path and stopping at the last index on an
//! open path, and the sentinel is projected again.
//!
//! The index never moves backwards except by wrapping on a closed path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use super::PathGeometry;
use crate::world::{safe_normalize, WorldFrame};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Steps along a polyline version of a path.
#[derive(Debug, Clone)]
pub struct SegmentStepper {
    /// Start point of each segment
    starts_m: Vec<Vector3<f64>>,

    /// Direction vector of each segment, its length is the segment length
    dirs_m: Vec<Vector3<f64>>,

    /// Unit direction of each segment
    unit_dirs: Vec<Vector3<f64>>,

    closed: bool,

    world: WorldFrame,

    /// Current segment index
    index: usize,
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepResult {
    /// Index of the segment the sentinel is alongside.
    pub index: usize,

    /// Signed lateral offset of the sentinel from the segment, positive when
    /// the path lies to the left of the sentinel.
    ///
    /// Units: meters
    pub offset_m: f64,

    /// Distance of the sentinel's projection along the segment from its
    /// start point.
    ///
    /// Units: meters
    pub along_m: f64,

    /// Projection of the sentinel onto the segment line.
    pub target_m: Vector3<f64>,

    /// Unit direction of the segment.
    pub unit_dir: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SegmentStepper {
    /// Build the segment list for the given path.
    ///
    /// There is one segment per path point. On a closed path the last segment
    /// joins the final point to the first. On an open path the last segment
    /// continues from the final point in the direction of the one before it.
    pub fn new(path: &dyn PathGeometry, world: WorldFrame) -> Self {
        let n = path.num_points();
        let closed = path.is_closed();

        let starts_m: Vec<Vector3<f64>> = (0..n).map(|i| path.point(i)).collect();

        let mut dirs_m: Vec<Vector3<f64>> = starts_m
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect();

        if n >= 2 {
            if closed {
                dirs_m.push(starts_m[0] - starts_m[n - 1]);
            }
            else {
                dirs_m.push(starts_m[n - 1] - starts_m[n - 2]);
            }
        }
        else {
            dirs_m.resize(n, Vector3::zeros());
        }

        let unit_dirs = dirs_m.iter().map(safe_normalize).collect();

        Self {
            starts_m,
            dirs_m,
            unit_dirs,
            closed,
            world,
            index: 0,
        }
    }

    /// Seed the index at the segment closest to `loc_m`.
    pub fn reset(&mut self, loc_m: &Vector3<f64>) {
        let mut best_dist_sq = std::f64::INFINITY;
        self.index = 0;

        for i in 0..self.num_segments() {
            let len_sq = self.dirs_m[i].norm_squared();
            let param = if len_sq > 0.0 {
                ((loc_m - self.starts_m[i]).dot(&self.dirs_m[i]) / len_sq)
                    .max(0.0)
                    .min(1.0)
            }
            else {
                0.0
            };
            let dist_sq = (loc_m - (self.starts_m[i] + param * self.dirs_m[i]))
                .norm_squared();

            if dist_sq < best_dist_sq {
                best_dist_sq = dist_sq;
                self.index = i;
            }
        }
    }

    /// Advance the index for the given sentinel location and return the
    /// projection of the sentinel onto the current segment.
    pub fn step(&mut self, sentinel_m: &Vector3<f64>) -> StepResult {
        let num_segments = self.num_segments();
        if num_segments == 0 {
            return StepResult {
                index: 0,
                offset_m: 0.0,
                along_m: 0.0,
                target_m: *sentinel_m,
                unit_dir: Vector3::zeros(),
            };
        }

        let mut along_m = self.along(sentinel_m);

        // At most one full lap, so a degenerate path cannot spin forever
        let mut iterations = 0;
        while self.passed(along_m) && iterations < num_segments {
            iterations += 1;

            if self.index + 1 < num_segments {
                self.index += 1;
            }
            else if self.closed {
                self.index = 0;
            }
            else {
                break;
            }

            along_m = self.along(sentinel_m);
        }

        trace!("Segment stepper at {} after {} advances", self.index, iterations);

        let start_m = self.starts_m[self.index];
        let unit_dir = self.unit_dirs[self.index];

        // Normal pointing to the right of the segment
        let right = unit_dir.cross(&self.world.vertical());

        StepResult {
            index: self.index,
            offset_m: (sentinel_m - start_m).dot(&right),
            along_m,
            target_m: start_m + along_m * unit_dir,
            unit_dir,
        }
    }

    /// Current segment index.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn num_segments(&self) -> usize {
        self.starts_m.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn along(&self, sentinel_m: &Vector3<f64>) -> f64 {
        (sentinel_m - self.starts_m[self.index]).dot(&self.unit_dirs[self.index])
    }

    /// True if the projection lies beyond the end of the current segment.
    /// Zero length segments are always passed.
    fn passed(&self, along_m: f64) -> bool {
        let len_m = self.dirs_m[self.index].norm();
        len_m <= 0.0 || along_m > len_m
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
    fn test_closed_path_cycles_all_segments() {
        let n = 10;
        let path = line(n, true);
        let mut stepper = SegmentStepper::new(&path, WorldFrame::iso());
        assert_eq!(stepper.num_segments(), n);

        let mut visited = Vec::new();

        // Sentinel moving forward along the line visits every forward
        // segment in order
        for i in 0..(n - 1) {
            let res = stepper.step(&Vector3::new(i as f64 + 0.5, 0.0, 0.0));
            visited.push(res.index);
        }

        // Past the last point the sentinel is alongside the closing segment
        let res = stepper.step(&Vector3::new(n as f64 - 0.5, 0.0, 0.0));
        visited.push(res.index);

        assert_eq!(visited, (0..n).collect::<Vec<usize>>());

        // And back before the first point the index wraps to zero
        let res = stepper.step(&Vector3::new(-0.5, 0.0, 0.0));
        assert_eq!(res.index, 0);
    }

    #[test]
    fn test_open_path_index_monotonic() {
        let n = 6;
        let path = line(n, false);
        let mut stepper = SegmentStepper::new(&path, WorldFrame::iso());

        let mut prev = 0;
        for k in 0..40 {
            // Sentinel wanders forward and back but the index never decreases
            let x = 0.25 * k as f64 - if k % 3 == 0 { 1.0 } else { 0.0 };
            let res = stepper.step(&Vector3::new(x, 0.3, 0.0));
            assert!(res.index >= prev);
            assert!(res.index < n);
            prev = res.index;
        }

        // Far beyond the end it stops at the last index, continuing the
        // final direction
        let res = stepper.step(&Vector3::new(50.0, 0.0, 0.0));
        assert_eq!(res.index, n - 1);
        assert_eq!(res.unit_dir, Vector3::x());
        assert!((res.target_m - Vector3::new(50.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_offset_sign() {
        let path = line(5, false);
        let mut stepper = SegmentStepper::new(&path, WorldFrame::iso());

        // Sentinel right of the path, path lies to its left
        let res = stepper.step(&Vector3::new(0.5, -1.0, 0.0));
        assert!((res.offset_m - 1.0).abs() < 1e-12);
        assert!((res.target_m - Vector3::new(0.5, 0.0, 0.0)).norm() < 1e-12);

        let res = stepper.step(&Vector3::new(0.5, 2.0, 0.0));
        assert!((res.offset_m + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_path_terminates() {
        let path = Path::new(
            vec![Vector3::zeros(); 4],
            true,
            WorldFrame::iso()
        ).unwrap();
        let mut stepper = SegmentStepper::new(&path, WorldFrame::iso());

        let res = stepper.step(&Vector3::new(1.0, 1.0, 0.0));
        assert!(res.index < 4);
        assert!(res.offset_m.is_finite());
    }

    #[test]
    fn test_reset_seeds_nearest_segment() {
        let path = line(10, false);
        let mut stepper = SegmentStepper::new(&path, WorldFrame::iso());

        stepper.reset(&Vector3::new(6.4, 0.5, 0.0));
        assert_eq!(stepper.index(), 6);
    }
}
