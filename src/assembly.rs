//! Assembly of forms into global scalars, vectors and sparse matrices.
pub mod buffers;
pub mod global;
pub mod local;

pub use buffers::{BasisValues, CoefficientValues, EntityValues, IntegralType, PointValues, Shape};
pub use global::*;
