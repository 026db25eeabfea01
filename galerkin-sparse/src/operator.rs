//! Linear operators used by iterative solvers.
use galerkin_traits::Real;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;

/// Rows per rayon task for CSR matrix-vector products.
const MATVEC_CHUNK_SIZE: usize = 512;

pub trait LinearOperator<T: Real> {
    /// Computes `y = A x`.
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>);
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Real,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T: Real> LinearOperator<T> for DMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        y.gemv(T::one(), self, &x, T::zero());
    }
}

impl<T: Real> LinearOperator<T> for CsrMatrix<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        assert_eq!(y.len(), self.nrows(), "Output dimension mismatch");
        assert_eq!(x.len(), self.ncols(), "Input dimension mismatch");
        let x = &x;
        y.as_mut_slice()
            .par_iter_mut()
            .with_min_len(MATVEC_CHUNK_SIZE)
            .enumerate()
            .for_each(|(i, y_i)| {
                let row = self.row(i);
                *y_i = row
                    .col_indices()
                    .iter()
                    .zip(row.values())
                    .fold(T::zero(), |acc, (&j, &a_ij)| acc + a_ij * x[j]);
            });
    }
}

pub struct IdentityOperator;

impl<T: Real> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        y.copy_from(&x);
    }
}

/// Diagonal (Jacobi) preconditioner `P = diag(A)^{-1}`.
///
/// Zero diagonal entries are replaced by one.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner<T: Real> {
    inverse_diagonal: DVector<T>,
}

impl<T: Real> JacobiPreconditioner<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Self {
        let inverse_diagonal = DVector::from_iterator(
            matrix.nrows(),
            (0..matrix.nrows()).map(|i| {
                let a_ii = matrix
                    .row(i)
                    .get_entry(i)
                    .map(|entry| entry.into_value())
                    .unwrap_or(T::zero());
                if a_ii == T::zero() {
                    T::one()
                } else {
                    T::one() / a_ii
                }
            }),
        );
        Self { inverse_diagonal }
    }
}

impl<T: Real> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        y.copy_from(&x);
        y.component_mul_assign(&self.inverse_diagonal);
    }
}
