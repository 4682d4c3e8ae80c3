use std::fmt::Debug;

use num_traits::{Bounded, Num, NumCast};

/// Coordinate number types usable as a point's per-axis scalar.
///
/// Implemented for every primitive integer and float type. Note that float
/// `NaN` is not supported and may produce nonsensical query results.
pub trait Scalar: Num + NumCast + PartialOrd + Copy + Debug + Send + Sync + Bounded {}

impl<T> Scalar for T where T: Num + NumCast + PartialOrd + Copy + Debug + Send + Sync + Bounded {}
