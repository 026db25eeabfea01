use galerkin_traits::Real;
use nalgebra::{DVectorView, DVectorViewMut};
use nalgebra_sparse::CsrMatrix;

/// A nonlinear system `F(x) = 0` with a sparse Jacobian.
pub trait NonlinearProblem<T: Real> {
    fn dimension(&self) -> usize;

    /// Evaluates `F(x)` into `f`.
    fn residual(&mut self, x: DVectorView<T>, f: DVectorViewMut<T>) -> eyre::Result<()>;

    /// Evaluates the Jacobian `dF/dx` at `x`.
    fn jacobian(&mut self, x: DVectorView<T>) -> eyre::Result<CsrMatrix<T>>;
}

impl<T, P> NonlinearProblem<T> for &mut P
where
    T: Real,
    P: ?Sized + NonlinearProblem<T>,
{
    fn dimension(&self) -> usize {
        P::dimension(self)
    }

    fn residual(&mut self, x: DVectorView<T>, f: DVectorViewMut<T>) -> eyre::Result<()> {
        P::residual(self, x, f)
    }

    fn jacobian(&mut self, x: DVectorView<T>) -> eyre::Result<CsrMatrix<T>> {
        P::jacobian(self, x)
    }
}

#[derive(Debug, Clone)]
pub struct NonlinearProblemBuilder {
    dimension: usize,
}

#[derive(Debug, Clone)]
pub struct ConcreteNonlinearProblem<F, J> {
    dimension: usize,
    residual: F,
    jacobian: J,
}

impl NonlinearProblemBuilder {
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn with_residual<F, T>(self, residual: F) -> ConcreteNonlinearProblem<F, ()>
    where
        T: Real,
        F: FnMut(DVectorView<T>, DVectorViewMut<T>) -> eyre::Result<()>,
    {
        ConcreteNonlinearProblem {
            dimension: self.dimension,
            residual,
            jacobian: (),
        }
    }
}

impl<F> ConcreteNonlinearProblem<F, ()> {
    pub fn with_jacobian<J, T>(self, jacobian: J) -> ConcreteNonlinearProblem<F, J>
    where
        T: Real,
        J: FnMut(DVectorView<T>) -> eyre::Result<CsrMatrix<T>>,
    {
        ConcreteNonlinearProblem {
            dimension: self.dimension,
            residual: self.residual,
            jacobian,
        }
    }
}

impl<T, F, J> NonlinearProblem<T> for ConcreteNonlinearProblem<F, J>
where
    T: Real,
    F: FnMut(DVectorView<T>, DVectorViewMut<T>) -> eyre::Result<()>,
    J: FnMut(DVectorView<T>) -> eyre::Result<CsrMatrix<T>>,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn residual(&mut self, x: DVectorView<T>, f: DVectorViewMut<T>) -> eyre::Result<()> {
        (self.residual)(x, f)
    }

    fn jacobian(&mut self, x: DVectorView<T>) -> eyre::Result<CsrMatrix<T>> {
        (self.jacobian)(x)
    }
}
