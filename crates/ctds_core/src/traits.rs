use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the evaluation
/// kernels. Ordinary floats satisfy it, and so does any richer numeric
/// type (dual numbers, intervals) exposing the `num_traits` float
/// surface.
pub trait Real: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Real for T {}

/// An autonomous vector field evaluated into a caller-owned buffer.
///
/// Implementations overwrite every entry of `dydt` on each call and keep
/// no state between calls. Both slices must have length `dimension()`;
/// the length contract is the caller's, not re-checked per call.
pub trait VectorField<T: Real> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Writes `dy/dt` at `y` into `dydt`.
    fn eval(&self, y: &[T], dydt: &mut [T]);
}
