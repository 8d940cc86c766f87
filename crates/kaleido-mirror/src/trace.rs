//! Reflection trace-back: fold a cross-section point into the tube.
//!
//! The sight line runs from the tube axis to the point. Wherever it leaves
//! the tube through a mirror, the remainder of the line is reflected across
//! that mirror and the walk continues from the hit point. Every reflection
//! strictly reduces the distance to the center, so the walk either lands on
//! the view disk, stops inside the polygon, or runs out of bounces.

use kaleido_math::Vec2;
use log::{debug, info};
use rayon::prelude::*;

use crate::{CrossSectionCamera, MirrorError, MirrorTube, Result};

/// Reflections allowed before a pixel is given up as background.
pub const DEFAULT_MAX_BOUNCES: usize = 100;

/// Half-plane and cap tests are relaxed by this fraction of the radius.
const RELATIVE_EPSILON: f64 = 1e-9;

/// One reflection: which mirror, where the sight line met it, and where
/// the point landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflection {
    pub mirror: usize,
    pub hit: Vec2,
    pub point: Vec2,
}

/// The reflections a trace went through, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReflectionPath {
    steps: Vec<Reflection>,
}

impl ReflectionPath {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reflection> {
        self.steps.iter()
    }

    pub fn last(&self) -> Option<&Reflection> {
        self.steps.last()
    }

    /// Mirror indices in reflection order.
    pub fn mirrors(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.iter().map(|r| r.mirror)
    }
}

/// Why a point did not resolve to a cap location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    /// The query point was not finite.
    NonFinite,
    /// More than the allowed number of reflections.
    BounceLimit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceOutcome {
    /// Resolved point inside the tube.
    Source(Vec2),
    Background(Miss),
}

impl TraceOutcome {
    pub fn source(&self) -> Option<Vec2> {
        match *self {
            TraceOutcome::Source(p) => Some(p),
            TraceOutcome::Background(_) => None,
        }
    }
}

/// Result of a recorded trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub outcome: TraceOutcome,
    pub path: ReflectionPath,
}

impl Trace {
    pub fn source(&self) -> Option<Vec2> {
        self.outcome.source()
    }

    pub fn bounces(&self) -> usize {
        self.path.len()
    }
}

enum FoldState {
    Inside,
    Outside { mirror: usize, hit: Vec2 },
    Failed(Miss),
}

/// Resolves output pixels to points inside the mirror tube.
///
/// Configuration is fixed at construction; tracing never mutates the solver,
/// so it can be shared freely across threads.
#[derive(Debug, Clone)]
pub struct ReflectionSolver {
    tube: MirrorTube,
    cap_radius: f64,
    camera: CrossSectionCamera,
    max_bounces: usize,
    mirror_eps: f64,
    cap_eps: f64,
}

impl ReflectionSolver {
    pub fn new(tube: MirrorTube, cap_radius: f64, camera: CrossSectionCamera) -> Result<Self> {
        if !(cap_radius.is_finite() && cap_radius > 0.0) {
            return Err(MirrorError::InvalidParameter(format!(
                "cap radius must be positive, got {cap_radius}"
            )));
        }
        info!(
            "Reflection solver: {} mirrors, tube radius {}, cap radius {}, {}x{} px",
            tube.mirror_count(),
            tube.circumradius(),
            cap_radius,
            camera.width(),
            camera.height()
        );
        Ok(Self {
            mirror_eps: RELATIVE_EPSILON * tube.circumradius(),
            cap_eps: RELATIVE_EPSILON * cap_radius,
            tube,
            cap_radius,
            camera,
            max_bounces: DEFAULT_MAX_BOUNCES,
        })
    }

    pub fn with_max_bounces(mut self, max_bounces: usize) -> Self {
        self.max_bounces = max_bounces;
        self
    }

    pub fn tube(&self) -> &MirrorTube {
        &self.tube
    }

    pub fn cap_radius(&self) -> f64 {
        self.cap_radius
    }

    pub fn camera(&self) -> &CrossSectionCamera {
        &self.camera
    }

    pub fn max_bounces(&self) -> usize {
        self.max_bounces
    }

    fn classify(&self, from: &Vec2, p: &Vec2) -> FoldState {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return FoldState::Failed(Miss::NonFinite);
        }
        if p.norm() <= self.cap_radius + self.cap_eps {
            return FoldState::Inside;
        }
        if let Some((mirror, hit)) = self.tube.first_crossed(from, p, self.mirror_eps) {
            return FoldState::Outside { mirror, hit };
        }
        // The sight line ran along a mirror or through a vertex: fold across
        // the lowest-index mirror the point is still beyond.
        match self.tube.first_violated(p, self.mirror_eps) {
            Some(mirror) => FoldState::Outside { mirror, hit: *from },
            None => FoldState::Inside,
        }
    }

    fn fold<F: FnMut(Reflection)>(&self, mut p: Vec2, mut visit: F) -> TraceOutcome {
        let mut from = Vec2::zeros();
        let mut bounces = 0;
        loop {
            match self.classify(&from, &p) {
                FoldState::Inside => return TraceOutcome::Source(p),
                FoldState::Failed(miss) => return TraceOutcome::Background(miss),
                FoldState::Outside { .. } if bounces == self.max_bounces => {
                    return TraceOutcome::Background(Miss::BounceLimit);
                }
                FoldState::Outside { mirror, hit } => {
                    p = self.tube.mirrors()[mirror].reflect(&p);
                    from = hit;
                    bounces += 1;
                    visit(Reflection { mirror, hit, point: p });
                }
            }
        }
    }

    /// Fold `p` into the tube, recording each reflection.
    pub fn trace_back(&self, p: Vec2) -> Trace {
        let mut path = ReflectionPath::default();
        let outcome = self.fold(p, |r| path.steps.push(r));
        Trace { outcome, path }
    }

    /// Point inside the tube seen at `p`, or `None` for background.
    pub fn source_of(&self, p: Vec2) -> Option<Vec2> {
        self.fold(p, |_| {}).source()
    }

    pub fn trace_pixel(&self, i: usize, j: usize) -> Trace {
        self.trace_back(self.camera.pixel_to_point(i, j))
    }

    pub fn trace_batch(&self, points: &[Vec2]) -> Vec<Option<Vec2>> {
        points.par_iter().map(|&p| self.source_of(p)).collect()
    }

    /// Source of every camera pixel, row-major from the bottom row.
    pub fn trace_frame(&self) -> Vec<Option<Vec2>> {
        let (w, h) = (self.camera.width(), self.camera.height());
        let sources: Vec<Option<Vec2>> = (0..w * h)
            .into_par_iter()
            .map(|k| self.source_of(self.camera.pixel_to_point(k % w, k / w)))
            .collect();
        debug!(
            "Traced {}x{} frame, {} background pixels",
            w,
            h,
            sources.iter().filter(|s| s.is_none()).count()
        );
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn solver(n: usize, tube_radius: f64, cap_radius: f64) -> ReflectionSolver {
        let tube = MirrorTube::regular(n, tube_radius).unwrap();
        let camera = CrossSectionCamera::new(64, 64, tube_radius / 16.0).unwrap();
        ReflectionSolver::new(tube, cap_radius, camera).unwrap()
    }

    #[test]
    fn test_point_on_cap_is_its_own_source() {
        let s = solver(6, 2.0, 1.0);
        let p = Vec2::new(0.3, -0.4);
        let t = s.trace_back(p);
        assert_eq!(t.outcome, TraceOutcome::Source(p));
        assert!(t.path.is_empty());
    }

    #[test]
    fn test_single_reflection_along_apothem() {
        let s = solver(6, 2.0, 1.0);
        let a = s.tube().apothem();
        let dir = Vec2::new((PI / 6.0).cos(), (PI / 6.0).sin());

        let t = s.trace_back(dir * 3.0);

        assert_eq!(t.bounces(), 1);
        assert_eq!(t.path.mirrors().collect::<Vec<_>>(), vec![0]);
        assert_relative_eq!(t.source().unwrap(), dir * (2.0 * a - 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_hexagon_vertex_direction_lands_on_neighbor_mirror() {
        // Beyond vertex 0 at distance 3: the corner goes to mirror 0, and the
        // image lands exactly on mirror 5, outside the unit cap but inside
        // the tube.
        let s = solver(6, 2.0, 1.0);
        let t = s.trace_back(Vec2::new(3.0, 0.0));

        assert_eq!(t.bounces(), 1);
        let landed = t.path.last().unwrap();
        assert_eq!(landed.mirror, 0);
        assert_relative_eq!(landed.hit, Vec2::new(2.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(landed.point, Vec2::new(1.5, -0.75_f64.sqrt()), epsilon = 1e-12);
        assert_relative_eq!(landed.point.norm(), 3.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(s.tube().mirrors()[5].signed_distance(&landed.point), 0.0, epsilon = 1e-12);
        assert_eq!(t.source(), Some(landed.point));
    }

    #[test]
    fn test_square_corner_folds_twice() {
        let s = solver(4, 2.0, 1.0);
        let t = s.trace_back(Vec2::new(3.0, 0.0));

        assert_eq!(t.path.mirrors().collect::<Vec<_>>(), vec![0, 3]);
        let first = t.path.iter().next().unwrap();
        assert_relative_eq!(first.hit, Vec2::new(2.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(first.point, Vec2::new(2.0, -1.0), epsilon = 1e-12);
        assert_relative_eq!(t.source().unwrap(), Vec2::new(1.0, 0.0), epsilon = 1e-9);
    }

    fn pentagon() -> ReflectionSolver {
        let tube = MirrorTube::regular(5, 0.15).unwrap();
        let view = tube.apothem();
        let camera = CrossSectionCamera::new(64, 64, 0.3 / 64.0).unwrap();
        ReflectionSolver::new(tube, view, camera).unwrap()
    }

    fn at_degrees(r: f64, deg: f64) -> Vec2 {
        let (s, c) = deg.to_radians().sin_cos();
        Vec2::new(c, s) * r
    }

    #[test]
    fn test_pentagon_wedge_reflects_off_crossed_mirror() {
        // Beyond both mirror 0 and mirror 1, but the sight line leaves the
        // tube through mirror 1.
        let s = pentagon();
        let p = at_degrees(0.2, 80.0);
        assert_eq!(s.tube().first_violated(&p, 0.0), Some(0));

        let t = s.trace_back(p);
        assert_eq!(t.path.mirrors().collect::<Vec<_>>(), vec![1]);
        assert_relative_eq!(t.path.iter().next().unwrap().hit.normalize(), p.normalize(), epsilon = 1e-12);
        assert_relative_eq!(
            t.source().unwrap(),
            Vec2::new(0.06886796006773022, 0.09189459119634458),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_pentagon_long_sight_line_folds_three_times() {
        let s = pentagon();
        let t = s.trace_back(at_degrees(0.4, 80.0));
        assert_eq!(t.path.mirrors().collect::<Vec<_>>(), vec![1, 0, 4]);
        // Each walk segment starts where the previous one met its mirror.
        for (step, next) in t.path.iter().zip(t.path.iter().skip(1)) {
            let m = s.tube().mirrors()[next.mirror];
            assert!(m.exit_parameter(&step.hit, &step.point, 1e-12).is_some());
        }
        assert_relative_eq!(
            t.source().unwrap(),
            Vec2::new(0.07159787081585615, 0.0011785507836240827),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_pentagon_stops_inside_polygon() {
        let s = pentagon();
        // Past the view disk, short of the mirrors: seen directly.
        let corner = Vec2::new(0.14, 0.0);
        assert!(corner.norm() > s.cap_radius());
        assert_eq!(s.trace_back(corner).outcome, TraceOutcome::Source(corner));

        let t = s.trace_back(at_degrees(0.3, 80.0));
        assert_eq!(t.path.mirrors().collect::<Vec<_>>(), vec![1, 0]);
        let src = t.source().unwrap();
        assert!(src.norm() > s.cap_radius());
        assert!(s.tube().contains(&src, 1e-12));
        assert_relative_eq!(src, Vec2::new(0.13151134403672315, 0.01567874099879603), epsilon = 1e-12);
    }

    #[test]
    fn test_bounce_limit() {
        let s = solver(4, 2.0, 1.0).with_max_bounces(1);
        let t = s.trace_back(Vec2::new(3.0, 0.0));
        assert_eq!(t.outcome, TraceOutcome::Background(Miss::BounceLimit));
        assert_eq!(t.bounces(), 1);
    }

    #[test]
    fn test_gap_between_cap_and_mirrors_is_seen_directly() {
        let s = solver(6, 2.0, 1.0);
        let p = Vec2::new(0.0, 1.5);
        let t = s.trace_back(p);
        assert_eq!(t.outcome, TraceOutcome::Source(p));
        assert!(t.path.is_empty());
    }

    #[test]
    fn test_non_finite_point_is_background() {
        let s = solver(5, 1.0, 1.0);
        assert_eq!(
            s.trace_back(Vec2::new(f64::NAN, 0.0)).outcome,
            TraceOutcome::Background(Miss::NonFinite)
        );
        assert_eq!(s.source_of(Vec2::new(f64::INFINITY, 1.0)), None);
    }

    #[test]
    fn test_tube_inside_cap_resolves_every_pixel() {
        // Circumradius equal to the cap radius: the whole polygon is on the cap.
        let s = solver(5, 0.5, 0.5);
        assert!(s.trace_frame().iter().all(Option::is_some));
    }

    #[test]
    fn test_frame_matches_pixels() {
        let s = solver(3, 1.0, 0.4);
        let frame = s.trace_frame();
        let w = s.camera().width();
        assert_eq!(frame.len(), s.camera().pixel_count());
        for (i, j) in [(0, 0), (5, 17), (40, 63), (32, 32)] {
            assert_eq!(frame[j * w + i], s.trace_pixel(i, j).source());
        }
    }

    #[test]
    fn test_batch_matches_serial() {
        let s = solver(7, 1.0, 0.6);
        let pts: Vec<Vec2> = (0..200)
            .map(|k| {
                let a = k as f64 * 0.37;
                Vec2::new(a.cos(), a.sin()) * (0.1 + 0.02 * k as f64)
            })
            .collect();
        let batch = s.trace_batch(&pts);
        for (p, b) in pts.iter().zip(&batch) {
            assert_eq!(*b, s.source_of(*p));
        }
    }

    #[test]
    fn test_invalid_cap_radius() {
        let tube = MirrorTube::regular(4, 1.0).unwrap();
        let camera = CrossSectionCamera::new(8, 8, 0.1).unwrap();
        assert!(ReflectionSolver::new(tube, 0.0, camera).is_err());
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn trace_terminates_within_bounce_limit(
                n in 3usize..12,
                x in -50.0..50.0_f64,
                y in -50.0..50.0_f64,
            ) {
                let s = solver(n, 1.0, 0.7).with_max_bounces(20);
                let t = s.trace_back(Vec2::new(x, y));
                prop_assert!(t.bounces() <= 20);
            }

            #[test]
            fn reflections_move_toward_center(
                n in 3usize..9,
                x in -10.0..10.0_f64,
                y in -10.0..10.0_f64,
            ) {
                let s = solver(n, 1.0, 0.5);
                let t = s.trace_back(Vec2::new(x, y));
                let mut r = Vec2::new(x, y).norm();
                for step in t.path.iter() {
                    let next = step.point.norm();
                    prop_assert!(next < r + 1e-12);
                    r = next;
                }
                if let Some(src) = t.source() {
                    prop_assert!(s.tube().contains(&src, 1e-9));
                }
            }

            #[test]
            fn trace_is_deterministic(x in -5.0..5.0_f64, y in -5.0..5.0_f64) {
                let s = solver(6, 1.0, 0.8);
                let p = Vec2::new(x, y);
                prop_assert_eq!(s.trace_back(p), s.trace_back(p));
            }
        }
    }
}
