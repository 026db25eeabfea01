//! Preconditioned conjugate gradient for symmetric positive definite systems.
use crate::operator::{IdentityOperator, JacobiPreconditioner, LinearOperator};
use crate::{check_system_dimensions, LinearSolveError, LinearSolver};
use galerkin_traits::Real;
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;

#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct CgWorkspace<T: Real> {
    r: DVector<T>,
    z: DVector<T>,
    p: DVector<T>,
    Ap: DVector<T>,
}

#[allow(non_snake_case)]
struct Buffers<'a, T: Real> {
    r: &'a mut DVector<T>,
    z: &'a mut DVector<T>,
    p: &'a mut DVector<T>,
    Ap: &'a mut DVector<T>,
}

impl<T: Real> Default for CgWorkspace<T> {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            Ap: DVector::zeros(0),
        }
    }
}

impl<T: Real> CgWorkspace<T> {
    fn prepare_buffers(&mut self, dim: usize) -> Buffers<T> {
        self.r.resize_vertically_mut(dim, T::zero());
        self.z.resize_vertically_mut(dim, T::zero());
        self.p.resize_vertically_mut(dim, T::zero());
        self.Ap.resize_vertically_mut(dim, T::zero());
        Buffers {
            r: &mut self.r,
            z: &mut self.z,
            p: &mut self.p,
            Ap: &mut self.Ap,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct CgOutput {
    /// Number of updates made to the (initial) solution vector.
    pub num_iterations: usize,
}

/// Conjugate gradient solver with relative residual stopping criterion `||r|| <= rtol * ||b||`.
///
/// The residual used for the stopping criterion is the recursively updated residual, which
/// may drift from the true residual for ill-conditioned problems.
#[derive(Debug, Clone)]
pub struct ConjugateGradient<T: Real> {
    workspace: CgWorkspace<T>,
    rtol: T,
    max_iter: Option<usize>,
    jacobi: bool,
}

impl<T: Real> Default for ConjugateGradient<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> ConjugateGradient<T> {
    pub fn new() -> Self {
        Self {
            workspace: CgWorkspace::default(),
            rtol: T::from_f64_const(1e-12),
            max_iter: None,
            jacobi: true,
        }
    }

    pub fn with_rtol(self, rtol: T) -> Self {
        Self { rtol, ..self }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }

    /// Disables the Jacobi preconditioner used by [`LinearSolver::solve`].
    pub fn without_preconditioner(self) -> Self {
        Self { jacobi: false, ..self }
    }

    pub fn solve_with_guess<'b>(
        &mut self,
        operator: &dyn LinearOperator<T>,
        preconditioner: &dyn LinearOperator<T>,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<CgOutput, LinearSolveError> {
        self.solve_with_guess_(operator, preconditioner, b.into(), x.into())
    }

    #[allow(non_snake_case)]
    fn solve_with_guess_(
        &mut self,
        operator: &dyn LinearOperator<T>,
        preconditioner: &dyn LinearOperator<T>,
        b: DVectorView<T>,
        mut x: DVectorViewMut<T>,
    ) -> Result<CgOutput, LinearSolveError> {
        use LinearSolveError::*;
        assert_eq!(b.len(), x.len());

        let mut output = CgOutput { num_iterations: 0 };
        let Buffers { r, z, p, Ap } = self.workspace.prepare_buffers(x.len());

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(output);
        }

        // r = b - Ax
        operator.apply((&mut *r).into(), (&x).into());
        r.neg_mut();
        *r += &b;

        // z = Pr
        preconditioner.apply((&mut *z).into(), (&*r).into());
        p.copy_from(&*z);

        let mut zTr = z.dot(&*r);

        loop {
            if r.norm() <= self.rtol * b_norm {
                break;
            } else if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(MaxIterationsReached { max_iter });
                }
            }

            // Ap = A * p
            operator.apply((&mut *Ap).into(), (&*p).into());
            let pAp = p.dot(&*Ap);

            if pAp <= T::zero() {
                return Err(IndefiniteOperator);
            }
            if zTr <= T::zero() {
                return Err(IndefinitePreconditioner);
            }

            let alpha = zTr / pAp;
            x.axpy(alpha, &*p, T::one());
            r.axpy(-alpha, &*Ap, T::one());
            output.num_iterations += 1;

            // z = P r
            preconditioner.apply((&mut *z).into(), (&*r).into());
            let zTr_next = z.dot(&*r);
            let beta = zTr_next / zTr;

            // p = z + beta * p
            p.axpy(T::one(), &*z, beta);
            zTr = zTr_next;
        }

        Ok(output)
    }
}

impl<T: Real> LinearSolver<T> for ConjugateGradient<T> {
    fn solve(&mut self, matrix: &CsrMatrix<T>, rhs: DVectorView<T>) -> Result<DVector<T>, LinearSolveError> {
        check_system_dimensions(matrix, rhs.len())?;
        let mut x = DVector::zeros(rhs.len());
        let output = if self.jacobi {
            let preconditioner = JacobiPreconditioner::from_csr(matrix);
            self.solve_with_guess(matrix, &preconditioner, rhs, &mut x)?
        } else {
            self.solve_with_guess(matrix, &IdentityOperator, rhs, &mut x)?
        };
        debug!("CG converged in {} iterations", output.num_iterations);
        if x.iter().all(|x_i| x_i.is_finite()) {
            Ok(x)
        } else {
            Err(LinearSolveError::NonFiniteSolution)
        }
    }
}
