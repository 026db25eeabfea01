use crate::assembly::buffers::EntityValues;
use crate::Real;
use nalgebra::DMatrixViewMut;

mod elliptic;
mod integrand;
mod mass;
mod source;

pub use elliptic::*;
pub use integrand::*;
pub use mass::*;
pub use source::*;

/// Computes the local tensor of one integration entity.
///
/// The output is zeroed before the call and has the shape `1 x 1` for functionals,
/// `num_test_dofs x 1` for linear forms and `num_test_dofs x num_trial_dofs` for bilinear
/// forms, with local DOFs ordered as `block_size * node + component`.
pub trait LocalKernel<T: Real>: Send + Sync {
    fn tabulate(&self, values: &EntityValues<T>, output: DMatrixViewMut<T>) -> eyre::Result<()>;
}

impl<T, K> LocalKernel<T> for &K
where
    T: Real,
    K: ?Sized + LocalKernel<T>,
{
    fn tabulate(&self, values: &EntityValues<T>, output: DMatrixViewMut<T>) -> eyre::Result<()> {
        (**self).tabulate(values, output)
    }
}
