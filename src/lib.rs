//! A dynamic, in-memory k-dimensional point index (k-d tree).
//!
//! ## Creation
//!
//! [`KdTree`] grows incrementally: [`KdTree::insert`] descends the existing
//! splits and hangs the new point off a leaf, tolerating imbalance. After a
//! batch of mutations, [`KdTree::optimise`] rebuilds the tree from per-axis
//! medians and restores `log2(len)` depth. Building via `FromIterator`
//! optimises automatically.
//!
//! ## Search
//!
//! Use [`KdTree::find`] for exact-match lookup, [`KdTree::find_within_range`]
//! / [`KdTree::count_within_range`] / [`KdTree::visit_in_region`] for
//! rectangular region queries, and [`KdTree::find_nearest`] for a
//! radius-bounded nearest neighbor. Stored values are opaque to the tree;
//! an [`Accessor`] extracts their coordinates, defaulting to `value[axis]`.
//!
//! ## Example
//!
//! ```
//! use kd_index::KdTree;
//!
//! let mut tree: KdTree<[i32; 3], 3> = KdTree::new();
//! tree.insert([5, 4, 0]).unwrap();
//! tree.insert([4, 2, 1]).unwrap();
//! tree.insert([7, 6, 9]).unwrap();
//!
//! // Points inside the box [3..7, 2..6, -2..2].
//! assert_eq!(tree.count_within_range(&[5, 4, 0], 2), 2);
//!
//! // Closest stored point to a probe.
//! let nearest = tree.find_nearest(&[6, 5, 1], f64::INFINITY).unwrap();
//! assert_eq!(tree.get(nearest.id), Some(&[5, 4, 0]));
//!
//! // Removal repairs the split structure in place.
//! assert_eq!(tree.remove(&[5, 4, 0]), Some([5, 4, 0]));
//! assert_eq!(tree.len(), 2);
//! ```

mod accessor;
mod arena;
mod bounds;
mod distance;
mod error;
mod iter;
mod scalar;
mod tree;

pub use accessor::{Accessor, AxisAccessor, LessCmp, ScalarCmp};
pub use arena::{BoundedArena, Node, NodeArena, NodeId, SlabArena};
pub use bounds::{Bounds, CenterProbe, Region};
pub use distance::{Euclidean, Manhattan, Metric};
pub use error::{KdIndexError, Result};
pub use iter::Iter;
pub use scalar::Scalar;
pub use tree::{KdTree, Nearest};
