use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for the scalar types a tree can be evaluated in (`f32`, `f64`).
///
/// Bundles the numeric and utility traits the interpreter needs so that
/// buffers, datasets and Jacobians share one bound.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
}

impl Float for f32 {}
impl Float for f64 {}
