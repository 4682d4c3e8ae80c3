//! Axis-aligned boxes and query regions.
//!
//! [`Bounds`] is the raw k-orthotope: two length-`K` coordinate arrays. The
//! tree's queries thread a `Bounds` through their recursion, clamping one
//! side of one axis per descent, and prune a subtree as soon as its box can
//! no longer meet the query. [`Region`] wraps a `Bounds` with the inclusion
//! and intersection predicates; [`CenterProbe`] is the shrinking
//! point-plus-radius target of a nearest search.
//!
//! No `low <= high` relation is enforced. The tree only ever derives
//! shrinking boxes from its recursion, and the nearest search deliberately
//! starts from a zero-volume box that the per-axis tests treat correctly.

use crate::accessor::{Accessor, ScalarCmp};
use crate::distance::Metric;
use crate::scalar::Scalar;

/// An axis-aligned box with per-axis low and high coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<S: Scalar, const K: usize> {
    low: [S; K],
    high: [S; K],
}

impl<S: Scalar, const K: usize> Bounds<S, K> {
    /// A box spanning `low..=high` on every axis.
    pub fn new(low: [S; K], high: [S; K]) -> Self {
        Self { low, high }
    }

    /// A zero-volume box collapsed onto a single point.
    pub fn point(at: [S; K]) -> Self {
        Self { low: at, high: at }
    }

    /// The low coordinate on `axis`. Panics if `axis >= K`.
    #[inline]
    pub fn low(&self, axis: usize) -> S {
        self.low[axis]
    }

    /// The high coordinate on `axis`. Panics if `axis >= K`.
    #[inline]
    pub fn high(&self, axis: usize) -> S {
        self.high[axis]
    }

    #[inline]
    pub fn set_low_bound(&mut self, value: S, axis: usize) {
        self.low[axis] = value;
    }

    #[inline]
    pub fn set_high_bound(&mut self, value: S, axis: usize) {
        self.high[axis] = value;
    }
}

/// A query region: a [`Bounds`] plus inclusion/intersection predicates.
///
/// The predicates take the ordering to evaluate under, so a region built
/// once can be queried against trees with different comparators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region<S: Scalar, const K: usize> {
    bounds: Bounds<S, K>,
}

impl<S: Scalar, const K: usize> Region<S, K> {
    pub fn new(bounds: Bounds<S, K>) -> Self {
        Self { bounds }
    }

    /// The axis box `[coord - radius, coord + radius]` around `value`.
    pub fn around<V, A>(accessor: &A, value: &V, radius: S) -> Self
    where
        A: Accessor<V, Scalar = S>,
    {
        Self {
            bounds: Bounds {
                low: std::array::from_fn(|i| accessor.coord(value, i) - radius),
                high: std::array::from_fn(|i| accessor.coord(value, i) + radius),
            },
        }
    }

    /// A zero-volume region collapsed onto `value`.
    pub fn point<V, A>(accessor: &A, value: &V) -> Self
    where
        A: Accessor<V, Scalar = S>,
    {
        let at = std::array::from_fn(|i| accessor.coord(value, i));
        Self {
            bounds: Bounds::point(at),
        }
    }

    pub fn bounds(&self) -> &Bounds<S, K> {
        &self.bounds
    }

    /// True iff `point` lies inside the region on every axis, i.e. neither
    /// `point < low` nor `high < point` under `cmp`.
    pub fn encloses<C: ScalarCmp<S>>(&self, point: &[S; K], cmp: &C) -> bool {
        for i in 0..K {
            if cmp.lt(&point[i], &self.bounds.low[i]) || cmp.lt(&self.bounds.high[i], &point[i]) {
                return false;
            }
        }
        true
    }

    /// True iff no axis separates the region from `other`.
    pub fn intersects<C: ScalarCmp<S>>(&self, other: &Bounds<S, K>, cmp: &C) -> bool {
        for i in 0..K {
            if cmp.lt(&other.high[i], &self.bounds.low[i])
                || cmp.lt(&self.bounds.high[i], &other.low[i])
            {
                return false;
            }
        }
        true
    }

    /// True iff `probe`'s center sits within the probe radius of the region
    /// box on every axis.
    pub fn intersects_probe<C, M>(&self, probe: &CenterProbe<S, K>, cmp: &C, metric: &M) -> bool
    where
        C: ScalarCmp<S>,
        M: Metric<S>,
    {
        probe.intersects(&self.bounds, cmp, metric)
    }
}

/// A point target with a shrinking acceptance radius.
///
/// The nearest search tightens the radius each time a closer candidate is
/// found, so box intersection tests against the probe reject ever more of
/// the tree as the search proceeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterProbe<S: Scalar, const K: usize> {
    center: [S; K],
    radius: f64,
}

impl<S: Scalar, const K: usize> CenterProbe<S, K> {
    pub fn new(center: [S; K], radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn center(&self) -> &[S; K] {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Shrink the radius. A larger `radius` is ignored; the probe never
    /// grows back.
    #[inline]
    pub fn tighten(&mut self, radius: f64) {
        if radius < self.radius {
            self.radius = radius;
        }
    }

    /// True iff on every axis the center lies within `radius` of
    /// `[bounds.low, bounds.high]`, measuring with the metric's projected
    /// distance.
    pub fn intersects<C, M>(&self, bounds: &Bounds<S, K>, cmp: &C, metric: &M) -> bool
    where
        C: ScalarCmp<S>,
        M: Metric<S>,
    {
        for i in 0..K {
            let c = self.center[i];
            if cmp.lt(&c, &bounds.low[i]) {
                if metric.proj_distance(c, bounds.low[i]) > self.radius {
                    return false;
                }
            } else if cmp.lt(&bounds.high[i], &c)
                && metric.proj_distance(bounds.high[i], c) > self.radius
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{AxisAccessor, LessCmp};
    use crate::distance::Euclidean;

    #[test]
    fn encloses_is_inclusive() {
        let r: Region<i32, 2> = Region::new(Bounds::new([0, 0], [10, 10]));
        assert!(r.encloses(&[0, 0], &LessCmp));
        assert!(r.encloses(&[10, 10], &LessCmp));
        assert!(r.encloses(&[5, 7], &LessCmp));
        assert!(!r.encloses(&[11, 5], &LessCmp));
        assert!(!r.encloses(&[5, -1], &LessCmp));
    }

    #[test]
    fn around_builds_the_axis_box() {
        let r: Region<i32, 3> = Region::around(&AxisAccessor, &[5, 4, 3], 3);
        assert_eq!(r.bounds().low(0), 2);
        assert_eq!(r.bounds().high(0), 8);
        assert_eq!(r.bounds().low(2), 0);
        assert_eq!(r.bounds().high(2), 6);
    }

    #[test]
    fn intersects_needs_overlap_on_every_axis() {
        let r: Region<i32, 2> = Region::new(Bounds::new([0, 0], [10, 10]));
        assert!(r.intersects(&Bounds::new([5, 5], [15, 15]), &LessCmp));
        assert!(r.intersects(&Bounds::new([10, 0], [20, 10]), &LessCmp));
        // overlaps on x, separated on y
        assert!(!r.intersects(&Bounds::new([5, 11], [15, 20]), &LessCmp));
        assert!(!r.intersects(&Bounds::new([-5, -5], [-1, 20]), &LessCmp));
    }

    #[test]
    fn probe_respects_radius() {
        let b: Bounds<i32, 2> = Bounds::new([10, 0], [20, 10]);
        let near = CenterProbe::new([7, 5], 4.0);
        let far = CenterProbe::new([7, 5], 2.0);
        assert!(near.intersects(&b, &LessCmp, &Euclidean));
        assert!(!far.intersects(&b, &LessCmp, &Euclidean));

        // Same answers through the region-level predicate.
        let r = Region::new(b);
        assert!(r.intersects_probe(&near, &LessCmp, &Euclidean));
        assert!(!r.intersects_probe(&far, &LessCmp, &Euclidean));
    }

    #[test]
    fn probe_inside_box_always_intersects() {
        let b: Bounds<i32, 2> = Bounds::new([0, 0], [10, 10]);
        let p = CenterProbe::new([5, 5], 0.0);
        assert!(p.intersects(&b, &LessCmp, &Euclidean));
    }

    #[test]
    fn tighten_never_grows() {
        let mut p: CenterProbe<i32, 2> = CenterProbe::new([0, 0], 5.0);
        p.tighten(3.0);
        assert_eq!(p.radius(), 3.0);
        p.tighten(4.0);
        assert_eq!(p.radius(), 3.0);
    }
}
