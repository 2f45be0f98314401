use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can flow through expression evaluation.
/// Must support floating-point arithmetic, debug printing, and conversion from f64.
///
/// Implemented by `f64` (plain evaluation) and `Dual` (derivative-carrying
/// evaluation for Newton-Raphson).
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}
