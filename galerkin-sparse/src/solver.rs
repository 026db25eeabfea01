use galerkin_traits::Real;
use nalgebra::{DVector, DVectorView};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Errors reported by linear solvers.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LinearSolveError {
    /// The matrix is not square, or the right-hand side does not match its dimensions.
    DimensionMismatch {
        nrows: usize,
        ncols: usize,
        rhs_len: usize,
    },
    /// The matrix is (numerically) singular.
    Singular,
    /// The operator was found to be indefinite by a method that requires definiteness.
    IndefiniteOperator,
    /// The preconditioner was found to be indefinite.
    IndefinitePreconditioner,
    /// An iterative method failed to reach its tolerance within the iteration limit.
    MaxIterationsReached { max_iter: usize },
    /// The computed solution contains NaN or infinite entries.
    NonFiniteSolution,
}

impl Display for LinearSolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { nrows, ncols, rhs_len } => write!(
                f,
                "Cannot solve system with {}x{} matrix and right-hand side of length {}",
                nrows, ncols, rhs_len
            ),
            Self::Singular => write!(f, "Matrix is singular"),
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite"),
            Self::IndefinitePreconditioner => write!(f, "Preconditioner appears to be indefinite"),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached", max_iter)
            }
            Self::NonFiniteSolution => write!(f, "Solution contains non-finite values"),
        }
    }
}

impl Error for LinearSolveError {}

/// A capability for solving linear systems `A x = b`.
///
/// Implementations may keep internal state (workspaces, factorizations) between calls,
/// hence the `&mut self` receiver. A failed solve must be reported as an error and is never
/// retried by callers in this workspace.
pub trait LinearSolver<T: Real> {
    fn solve(&mut self, matrix: &CsrMatrix<T>, rhs: DVectorView<T>) -> Result<DVector<T>, LinearSolveError>;
}

impl<T, S> LinearSolver<T> for &mut S
where
    T: Real,
    S: ?Sized + LinearSolver<T>,
{
    fn solve(&mut self, matrix: &CsrMatrix<T>, rhs: DVectorView<T>) -> Result<DVector<T>, LinearSolveError> {
        S::solve(self, matrix, rhs)
    }
}

impl<T, S> LinearSolver<T> for Box<S>
where
    T: Real,
    S: ?Sized + LinearSolver<T>,
{
    fn solve(&mut self, matrix: &CsrMatrix<T>, rhs: DVectorView<T>) -> Result<DVector<T>, LinearSolveError> {
        S::solve(self, matrix, rhs)
    }
}

/// Checks that `matrix` is square and compatible with a right-hand side of length `rhs_len`.
pub fn check_system_dimensions<T>(matrix: &CsrMatrix<T>, rhs_len: usize) -> Result<(), LinearSolveError> {
    if matrix.nrows() != matrix.ncols() || matrix.nrows() != rhs_len {
        Err(LinearSolveError::DimensionMismatch {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
            rhs_len,
        })
    } else {
        Ok(())
    }
}
