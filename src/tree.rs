//! The k-d tree container.
//!
//! ## Structure
//!
//! Every node at depth `L` splits space on axis `L mod K`: values strictly
//! below the node's coordinate on that axis (under the tree's comparator)
//! hang off the left child, everything else off the right. Insertion keeps
//! that property incrementally; [`KdTree::remove_at`] repairs it by pulling
//! a replacement out of the victim's own subtree; [`KdTree::optimise`]
//! rebuilds the whole tree from medians when incremental growth has skewed
//! it.
//!
//! ## Queries
//!
//! Range and nearest queries carry an axis-aligned box through the
//! recursion. Descending left clamps the box's high side on the node's
//! split axis, descending right clamps the low side, and a subtree is
//! skipped as soon as its box cannot meet the query.

use std::cmp::Ordering;
use std::fmt;
use std::fmt::Debug;
use std::marker::PhantomData;

use tinyvec::TinyVec;

use crate::accessor::{Accessor, AxisAccessor, LessCmp, ScalarCmp};
use crate::arena::{Node, NodeArena, NodeId, SlabArena};
use crate::bounds::{Bounds, CenterProbe, Region};
use crate::distance::{Euclidean, Metric};
use crate::error::Result;

/// Result of a nearest-neighbor query: the winning node and its distance
/// from the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    pub id: NodeId,
    pub distance: f64,
}

/// A dynamic k-dimensional point index.
///
/// `K` is the dimensionality, fixed per tree. `V` is the stored value type,
/// opaque to the tree except through the accessor `A`. The comparator `C`
/// orders coordinates and the arena `R` stores nodes; both default to the
/// obvious choice.
pub struct KdTree<V, const K: usize, A = AxisAccessor, C = LessCmp, R = SlabArena<V>> {
    pub(crate) arena: R,
    pub(crate) root: Option<NodeId>,
    pub(crate) leftmost: Option<NodeId>,
    pub(crate) rightmost: Option<NodeId>,
    count: usize,
    accessor: A,
    cmp: C,
    phantom: PhantomData<V>,
}

impl<V, const K: usize, A, C, R> KdTree<V, K, A, C, R>
where
    A: Accessor<V>,
    C: ScalarCmp<A::Scalar>,
    R: NodeArena<V>,
{
    /// An empty tree with default accessor, comparator and arena.
    pub fn new() -> Self
    where
        A: Default,
        C: Default,
        R: Default,
    {
        Self::with_parts(A::default(), C::default(), R::default())
    }

    /// An empty tree with a custom accessor.
    pub fn with_accessor(accessor: A) -> Self
    where
        C: Default,
        R: Default,
    {
        Self::with_parts(accessor, C::default(), R::default())
    }

    /// An empty tree from explicit parts.
    pub fn with_parts(accessor: A, cmp: C, arena: R) -> Self {
        assert!(K > 0, "KdTree requires at least one dimension");
        Self {
            arena,
            root: None,
            leftmost: None,
            rightmost: None,
            count: 0,
            accessor,
            cmp,
            phantom: PhantomData,
        }
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Largest point count the arena's 32-bit slot indices can address.
    pub fn max_len(&self) -> usize {
        u32::MAX as usize
    }

    /// The accessor this tree extracts coordinates with.
    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    /// Drop every stored point. Positions handed out before the clear go
    /// stale.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = None;
        self.leftmost = None;
        self.rightmost = None;
        self.count = 0;
    }

    /// The value at `id`, or `None` if the position is stale.
    pub fn get(&self, id: NodeId) -> Option<&V> {
        self.arena.get(id).map(|n| &n.value)
    }

    // --- insert ---

    /// Store a copy of `value`, returning its position.
    ///
    /// Duplicates are allowed; every insert creates a new node. Fails only
    /// if the arena refuses the allocation, in which case the tree is
    /// unchanged.
    pub fn insert(&mut self, value: V) -> Result<NodeId> {
        let Some(root) = self.root else {
            let id = self.arena.try_alloc(Node::new(value, None))?;
            self.root = Some(id);
            self.leftmost = Some(id);
            self.rightmost = Some(id);
            self.count += 1;
            return Ok(id);
        };
        let mut cur = root;
        let mut level = 0;
        loop {
            let axis = level % K;
            let (left, right) = {
                let node = self.node(cur);
                (node.left, node.right)
            };
            if self.axis_lt_value_node(axis, &value, cur) {
                match left {
                    Some(l) => cur = l,
                    None => return self.attach_left(cur, value),
                }
            } else {
                // Attaching at the rightmost node even when it has a right
                // child keeps the maximum reachable through right links.
                match right {
                    Some(r) if self.rightmost != Some(cur) => cur = r,
                    _ => return self.attach_right(cur, value),
                }
            }
            level += 1;
        }
    }

    fn attach_left(&mut self, parent: NodeId, value: V) -> Result<NodeId> {
        let id = self.arena.try_alloc(Node::new(value, Some(parent)))?;
        self.node_mut(parent).left = Some(id);
        if self.leftmost == Some(parent) {
            self.leftmost = Some(id);
        }
        self.count += 1;
        Ok(id)
    }

    fn attach_right(&mut self, parent: NodeId, value: V) -> Result<NodeId> {
        let id = self.arena.try_alloc(Node::new(value, Some(parent)))?;
        self.node_mut(parent).right = Some(id);
        if self.rightmost == Some(parent) {
            self.rightmost = Some(id);
        }
        self.count += 1;
        Ok(id)
    }

    // --- find ---

    /// Position of a stored value equal to `value` on every axis under the
    /// comparator, or `None`.
    ///
    /// Values equal on the split axis always descend right on insert, so
    /// the search also keeps descending right through equal coordinates.
    pub fn find(&self, value: &V) -> Option<NodeId> {
        let mut cur = self.root?;
        let mut level = 0;
        loop {
            let axis = level % K;
            if self.axis_lt_value_node(axis, value, cur) {
                cur = self.node(cur).left?;
            } else {
                if !self.axis_lt_node_value(axis, cur, value)
                    && self.matches_on_other_axes(cur, value, axis)
                {
                    return Some(cur);
                }
                cur = self.node(cur).right?;
            }
            level += 1;
        }
    }

    fn matches_on_axis(&self, id: NodeId, value: &V, axis: usize) -> bool {
        !self.axis_lt_node_value(axis, id, value) && !self.axis_lt_value_node(axis, value, id)
    }

    fn matches_on_other_axes(&self, id: NodeId, value: &V, skip: usize) -> bool {
        (0..K)
            .filter(|&i| i != skip)
            .all(|i| self.matches_on_axis(id, value, i))
    }

    // --- remove ---

    /// Remove one stored value equal to `value`, returning it. `None` if
    /// nothing matches; which of several duplicates goes is unspecified.
    pub fn remove(&mut self, value: &V) -> Option<V> {
        let id = self.find(value)?;
        self.remove_at(id)
    }

    /// Remove the value at `id`, returning it. `None` if the position is
    /// stale.
    ///
    /// Removal relocates nodes below `id` while repairing the split
    /// structure, so treat every position obtained before the call as
    /// stale; re-acquire them through [`KdTree::find`].
    pub fn remove_at(&mut self, id: NodeId) -> Option<V> {
        self.arena.get(id)?;
        let level = self.level_of(id);
        self.erase_node(id, level);
        let node = self.arena.free(id).expect("dangling NodeId");
        self.count -= 1;
        Some(node.value)
    }

    fn level_of(&self, id: NodeId) -> usize {
        let mut level = 0;
        let mut cur = self.node(id).parent;
        while let Some(parent) = cur {
            level += 1;
            cur = self.node(parent).parent;
        }
        level
    }

    /// Unlink `n` (at depth `level`) from the tree, grafting a
    /// partition-preserving replacement from its own subtree into its
    /// place. Does not release `n`'s slot.
    fn erase_node(&mut self, n: NodeId, level: usize) {
        let replacement = self.take_replacement(n, level);
        self.splice(n, replacement);
    }

    /// Pick the node that can stand in `n`'s position without violating the
    /// split property at `n`'s level, and detach it from where it was.
    fn take_replacement(&mut self, n: NodeId, level: usize) -> Option<NodeId> {
        let (left, right) = {
            let node = self.node(n);
            (node.left, node.right)
        };
        let axis = level % K;
        let (chosen, depth) = match (left, right) {
            (None, None) => return None,
            // Everything in the right subtree is >= on the axis; its
            // axis-minimum is the tightest legal stand-in. Mirrored for a
            // missing right child.
            (None, Some(r)) => self.min_on_axis(r, axis, level + 1),
            (Some(l), None) => self.max_on_axis(l, axis, level + 1),
            (Some(l), Some(r)) => {
                if self.axis_lt_nodes(axis, r, l) {
                    self.min_on_axis(r, axis, level + 1)
                } else {
                    self.max_on_axis(l, axis, level + 1)
                }
            }
        };
        // The stand-in is erased from its old position first, with its own
        // replacement found the same way.
        self.erase_node(chosen, depth);
        Some(chosen)
    }

    /// Graft `replacement` into `n`'s position: it adopts `n`'s parent and
    /// children, and the root/extreme pointers are patched if `n` held one
    /// of those roles.
    fn splice(&mut self, n: NodeId, replacement: Option<NodeId>) {
        let (parent, left, right) = {
            let node = self.node(n);
            (node.parent, node.left, node.right)
        };
        if let Some(q) = replacement {
            {
                let qn = self.node_mut(q);
                qn.parent = parent;
                qn.left = left;
                qn.right = right;
            }
            if let Some(l) = left {
                self.node_mut(l).parent = Some(q);
            }
            if let Some(r) = right {
                self.node_mut(r).parent = Some(q);
            }
        }
        match parent {
            None => self.root = replacement,
            Some(p) => {
                let pn = self.node_mut(p);
                if pn.left == Some(n) {
                    pn.left = replacement;
                } else {
                    pn.right = replacement;
                }
            }
        }
        if self.leftmost == Some(n) {
            self.leftmost = replacement.or(parent);
        }
        if self.rightmost == Some(n) {
            self.rightmost = replacement.or(parent);
        }
    }

    /// Smallest axis-`axis` node in the subtree at `n` (whose root sits at
    /// depth `level`), together with the depth it sits at.
    ///
    /// Axis alternation means the extremum can hide in either branch of any
    /// intermediate node, so both branches are searched at every step, even
    /// where the node's own split axis matches.
    fn min_on_axis(&self, n: NodeId, axis: usize, level: usize) -> (NodeId, usize) {
        let mut best = (n, level);
        let node = self.node(n);
        if let Some(l) = node.left {
            let cand = self.min_on_axis(l, axis, level + 1);
            if self.axis_lt_nodes(axis, cand.0, best.0) {
                best = cand;
            }
        }
        if let Some(r) = node.right {
            let cand = self.min_on_axis(r, axis, level + 1);
            if self.axis_lt_nodes(axis, cand.0, best.0) {
                best = cand;
            }
        }
        best
    }

    fn max_on_axis(&self, n: NodeId, axis: usize, level: usize) -> (NodeId, usize) {
        let mut best = (n, level);
        let node = self.node(n);
        if let Some(l) = node.left {
            let cand = self.max_on_axis(l, axis, level + 1);
            if self.axis_lt_nodes(axis, best.0, cand.0) {
                best = cand;
            }
        }
        if let Some(r) = node.right {
            let cand = self.max_on_axis(r, axis, level + 1);
            if self.axis_lt_nodes(axis, best.0, cand.0) {
                best = cand;
            }
        }
        best
    }

    // --- range queries ---

    /// Count of stored points inside the axis box `value ± radius`.
    pub fn count_within_range(&self, value: &V, radius: A::Scalar) -> usize {
        self.count_in_region(&Region::around(&self.accessor, value, radius))
    }

    /// Count of stored points inside `region`.
    pub fn count_in_region(&self, region: &Region<A::Scalar, K>) -> usize {
        let mut count = 0;
        self.visit_in_region(region, |_| count += 1);
        count
    }

    /// Copies of the stored points inside the axis box `value ± radius`, in
    /// traversal order.
    pub fn find_within_range(&self, value: &V, radius: A::Scalar) -> Vec<V>
    where
        V: Clone,
    {
        self.find_in_region(&Region::around(&self.accessor, value, radius))
    }

    /// Copies of the stored points inside `region`, in traversal order.
    pub fn find_in_region(&self, region: &Region<A::Scalar, K>) -> Vec<V>
    where
        V: Clone,
    {
        let mut out = Vec::new();
        self.visit_in_region(region, |v| out.push(v.clone()));
        out
    }

    /// Call `visitor` on every stored point inside `region`.
    pub fn visit_in_region<F>(&self, region: &Region<A::Scalar, K>, mut visitor: F)
    where
        F: FnMut(&V),
    {
        if let Some(root) = self.root {
            let bounds = *region.bounds();
            self.visit_region_rec(root, region, &bounds, 0, &mut visitor);
        }
    }

    fn visit_region_rec<F>(
        &self,
        n: NodeId,
        region: &Region<A::Scalar, K>,
        bounds: &Bounds<A::Scalar, K>,
        level: usize,
        visitor: &mut F,
    ) where
        F: FnMut(&V),
    {
        let node = self.node(n);
        let coords = self.coords_of(n);
        if region.encloses(&coords, &self.cmp) {
            visitor(&node.value);
        }
        let axis = level % K;
        if let Some(l) = node.left {
            let mut child = *bounds;
            child.set_high_bound(coords[axis], axis);
            if region.intersects(&child, &self.cmp) {
                self.visit_region_rec(l, region, &child, level + 1, visitor);
            }
        }
        if let Some(r) = node.right {
            let mut child = *bounds;
            child.set_low_bound(coords[axis], axis);
            if region.intersects(&child, &self.cmp) {
                self.visit_region_rec(r, region, &child, level + 1, visitor);
            }
        }
    }

    // --- nearest ---

    /// The stored point closest to `value` in Euclidean distance, if one
    /// lies within `max_distance`.
    pub fn find_nearest(&self, value: &V, max_distance: f64) -> Option<Nearest> {
        self.find_nearest_with(&Euclidean, value, max_distance)
    }

    /// [`KdTree::find_nearest`] under an arbitrary metric: candidates are
    /// scored with the metric's full distance and subtrees pruned with its
    /// projected distance.
    pub fn find_nearest_with<M>(&self, metric: &M, value: &V, max_distance: f64) -> Option<Nearest>
    where
        M: Metric<A::Scalar>,
    {
        let root = self.root?;
        let target = self.coords_of_value(value);
        // The search box starts as the target point itself; descents stretch
        // it one clamped axis at a time, and the probe test measures how far
        // the box has been pushed away from the target.
        let bounds = Bounds::point(target);
        let mut probe = CenterProbe::new(target, max_distance);
        let mut best = Nearest {
            id: root,
            distance: f64::INFINITY,
        };
        self.nearest_rec(metric, root, &mut probe, &bounds, 0, &mut best);
        (best.distance <= max_distance).then_some(best)
    }

    fn nearest_rec<M>(
        &self,
        metric: &M,
        n: NodeId,
        probe: &mut CenterProbe<A::Scalar, K>,
        bounds: &Bounds<A::Scalar, K>,
        level: usize,
        best: &mut Nearest,
    ) where
        M: Metric<A::Scalar>,
    {
        let coords = self.coords_of(n);
        let distance = metric.distance(probe.center(), &coords);
        // Strict improvement only: among equidistant candidates the first
        // one visited wins.
        if distance < best.distance {
            *best = Nearest { id: n, distance };
        }
        probe.tighten(best.distance);
        let node = self.node(n);
        let axis = level % K;
        if let Some(l) = node.left {
            let mut child = *bounds;
            child.set_high_bound(coords[axis], axis);
            if Region::new(child).intersects_probe(probe, &self.cmp, metric) {
                self.nearest_rec(metric, l, probe, &child, level + 1, best);
            }
        }
        // The left descent may have found a closer candidate; shrink before
        // deciding on the right.
        probe.tighten(best.distance);
        if let Some(r) = node.right {
            let mut child = *bounds;
            child.set_low_bound(coords[axis], axis);
            if Region::new(child).intersects_probe(probe, &self.cmp, metric) {
                self.nearest_rec(metric, r, probe, &child, level + 1, best);
            }
        }
    }

    // --- optimise ---

    /// Destructive median rebuild: collect all values, clear, and reinsert
    /// recursively from per-axis medians. Leaves every split balanced, so
    /// depth drops to roughly `log2(len)`.
    ///
    /// With the default arena this cannot fail. A bounded arena that
    /// refused an allocation mid-rebuild leaves the tree holding the subset
    /// inserted so far.
    pub fn optimise(&mut self) -> Result<()>
    where
        V: Clone,
    {
        let mut values: Vec<V> = self.iter().cloned().collect();
        self.clear();
        self.optimise_slice(&mut values, 0)
    }

    /// Alias of [`KdTree::optimise`] for the other spelling.
    pub fn optimize(&mut self) -> Result<()>
    where
        V: Clone,
    {
        self.optimise()
    }

    fn optimise_slice(&mut self, values: &mut [V], level: usize) -> Result<()>
    where
        V: Clone,
    {
        if values.is_empty() {
            return Ok(());
        }
        let axis = level % K;
        let (accessor, cmp) = (&self.accessor, &self.cmp);
        values.sort_by(|a, b| {
            let x = accessor.coord(a, axis);
            let y = accessor.coord(b, axis);
            if cmp.lt(&x, &y) {
                Ordering::Less
            } else if cmp.lt(&y, &x) {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        });
        let mid = values.len() / 2;
        self.insert(values[mid].clone())?;
        self.optimise_slice(&mut values[..mid], level + 1)?;
        self.optimise_slice(&mut values[mid + 1..], level + 1)
    }

    // --- debug dump ---

    /// Write a human-readable pre-order listing of the tree into `out`.
    ///
    /// Debugging aid only; the format is unstable.
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result
    where
        V: Debug,
    {
        writeln!(
            out,
            "kd-tree k={} len={} root={:?} leftmost={:?} rightmost={:?}",
            K, self.count, self.root, self.leftmost, self.rightmost
        )?;
        let Some(root) = self.root else {
            return writeln!(out, "(empty)");
        };
        let mut stack: TinyVec<[(NodeId, usize); 32]> = TinyVec::new();
        stack.push((root, 0));
        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            writeln!(out, "{:width$}{:?}", "", node.value, width = depth * 2)?;
            if let Some(r) = node.right {
                stack.push((r, depth + 1));
            }
            if let Some(l) = node.left {
                stack.push((l, depth + 1));
            }
        }
        Ok(())
    }

    // --- internals ---

    /// Live-node access; ids held by the tree itself are always live.
    pub(crate) fn node(&self, id: NodeId) -> &Node<V> {
        self.arena.get(id).expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<V> {
        self.arena.get_mut(id).expect("dangling NodeId")
    }

    pub(crate) fn coords_of(&self, id: NodeId) -> [A::Scalar; K] {
        let value = &self.node(id).value;
        std::array::from_fn(|i| self.accessor.coord(value, i))
    }

    fn coords_of_value(&self, value: &V) -> [A::Scalar; K] {
        std::array::from_fn(|i| self.accessor.coord(value, i))
    }

    #[inline]
    fn axis_lt_value_node(&self, axis: usize, value: &V, id: NodeId) -> bool {
        let a = self.accessor.coord(value, axis);
        let b = self.accessor.coord(&self.node(id).value, axis);
        self.cmp.lt(&a, &b)
    }

    #[inline]
    fn axis_lt_node_value(&self, axis: usize, id: NodeId, value: &V) -> bool {
        let a = self.accessor.coord(&self.node(id).value, axis);
        let b = self.accessor.coord(value, axis);
        self.cmp.lt(&a, &b)
    }

    #[inline]
    fn axis_lt_nodes(&self, axis: usize, a: NodeId, b: NodeId) -> bool {
        let x = self.accessor.coord(&self.node(a).value, axis);
        let y = self.accessor.coord(&self.node(b).value, axis);
        self.cmp.lt(&x, &y)
    }
}

impl<V, const K: usize, A, C, R> Default for KdTree<V, K, A, C, R>
where
    A: Accessor<V> + Default,
    C: ScalarCmp<A::Scalar> + Default,
    R: NodeArena<V> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, const K: usize, A, C, R> fmt::Debug for KdTree<V, K, A, C, R>
where
    A: Accessor<V>,
    C: ScalarCmp<A::Scalar>,
    R: NodeArena<V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KdTree")
            .field("k", &K)
            .field("len", &self.count)
            .field("root", &self.root)
            .field("leftmost", &self.leftmost)
            .field("rightmost", &self.rightmost)
            .finish_non_exhaustive()
    }
}

/// Copying a tree re-inserts every value and then rebalances, so the copy
/// is optimally shaped regardless of the original's history.
impl<V, const K: usize, A, C> Clone for KdTree<V, K, A, C, SlabArena<V>>
where
    V: Clone,
    A: Accessor<V> + Clone,
    C: ScalarCmp<A::Scalar> + Clone,
{
    fn clone(&self) -> Self {
        let mut tree = Self::with_parts(
            self.accessor.clone(),
            self.cmp.clone(),
            SlabArena::default(),
        );
        for value in self.iter() {
            tree.insert(value.clone()).expect("slab arena does not fail");
        }
        tree.optimise().expect("slab arena does not fail");
        tree
    }
}

impl<V, const K: usize, A, C> FromIterator<V> for KdTree<V, K, A, C, SlabArena<V>>
where
    V: Clone,
    A: Accessor<V> + Default,
    C: ScalarCmp<A::Scalar> + Default,
{
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree.optimise().expect("slab arena does not fail");
        tree
    }
}

impl<V, const K: usize, A, C> Extend<V> for KdTree<V, K, A, C, SlabArena<V>>
where
    A: Accessor<V>,
    C: ScalarCmp<A::Scalar>,
{
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value).expect("slab arena does not fail");
        }
    }
}
