//! Core traits shared by the `galerkin` crates.
use nalgebra::RealField;

pub use nalgebra;

/// The real scalar type used for geometry, basis functions and assembled tensors.
///
/// Implemented for every `Copy` type implementing [`RealField`], i.e. `f32` and `f64`.
pub trait Real: RealField + Copy {
    /// Converts an `f64` constant into `Self`.
    ///
    /// # Panics
    ///
    /// Panics if the value can not be represented by `Self`.
    fn from_f64_const(value: f64) -> Self {
        Self::from_f64(value).expect("Constant must fit in T")
    }

    /// Converts a count (number of points, number of nodes, ...) into `Self`.
    fn from_count(count: usize) -> Self {
        Self::from_usize(count).expect("Count must fit in T")
    }
}

impl<T: RealField + Copy> Real for T {}
