use crate::{check_system_dimensions, LinearSolveError, LinearSolver};
use galerkin_traits::Real;
use nalgebra::{DMatrix, DVector, DVectorView};
use nalgebra_sparse::CsrMatrix;

/// Direct solver that densifies the matrix and computes an LU factorization with partial pivoting.
///
/// Intended for small systems and tests. A matrix is reported as singular when its smallest
/// pivot is below `pivot_tolerance` times its largest pivot.
#[derive(Debug, Clone)]
pub struct DenseLu<T: Real> {
    pivot_tolerance: T,
}

impl<T: Real> Default for DenseLu<T> {
    fn default() -> Self {
        Self {
            pivot_tolerance: T::from_f64_const(1e-14),
        }
    }
}

impl<T: Real> DenseLu<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pivot_tolerance(pivot_tolerance: T) -> Self {
        Self { pivot_tolerance }
    }
}

impl<T: Real> LinearSolver<T> for DenseLu<T> {
    fn solve(&mut self, matrix: &CsrMatrix<T>, rhs: DVectorView<T>) -> Result<DVector<T>, LinearSolveError> {
        check_system_dimensions(matrix, rhs.len())?;
        if rhs.is_empty() {
            return Ok(DVector::zeros(0));
        }

        let lu = DMatrix::from(matrix).lu();
        let u = lu.u();
        let (min_pivot, max_pivot) = u
            .diagonal()
            .iter()
            .map(|u_ii| u_ii.abs())
            .fold((T::max_value().unwrap_or(T::one()), T::zero()), |(min, max), u_ii| {
                (min.min(u_ii), max.max(u_ii))
            });

        if max_pivot == T::zero() || min_pivot <= self.pivot_tolerance * max_pivot {
            return Err(LinearSolveError::Singular);
        }

        let x = lu.solve(&rhs).ok_or(LinearSolveError::Singular)?;
        if x.iter().all(|x_i| x_i.is_finite()) {
            Ok(x)
        } else {
            Err(LinearSolveError::NonFiniteSolution)
        }
    }
}
