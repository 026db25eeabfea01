//! Newton's method for nonlinear variational problems `F(u; v) = 0`.
use crate::assembly::{set_bc, Assembler};
use crate::bc::DirichletBC;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::form::Form;
use crate::function::Function;
use crate::Real;
use galerkin_optimize::newton::{newton, NewtonError, NewtonReport, NewtonSettings};
use galerkin_optimize::problem::NonlinearProblem;
use galerkin_optimize::CancellationToken;
use galerkin_sparse::{DenseLu, LinearSolver};
use log::debug;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

/// A residual form and its Jacobian, seen as a nonlinear algebraic problem in the DOFs of the
/// unknown.
///
/// The unknown is the first coefficient of both forms. Boundary conditions are eliminated the
/// same way in both: the Jacobian has identity rows and columns for constrained DOFs, and the
/// residual is lifted with the current iterate, so that its constrained entries are
/// `x_d - g_d`.
pub struct NonlinearFormProblem<'a, T: Real> {
    assembler: &'a Assembler<T>,
    residual_form: &'a Form<T>,
    jacobian_form: &'a Form<T>,
    bcs: &'a [DirichletBC<T>],
    state: Function<T>,
    extra_coefficients: &'a [&'a Function<T>],
    pattern: Option<SparsityPattern>,
}

impl<'a, T: Real> NonlinearFormProblem<'a, T> {
    pub fn new(
        assembler: &'a Assembler<T>,
        u: &Function<T>,
        residual_form: &'a Form<T>,
        jacobian_form: &'a Form<T>,
        bcs: &'a [DirichletBC<T>],
        extra_coefficients: &'a [&'a Function<T>],
    ) -> Result<Self> {
        if residual_form.rank() != 1 || jacobian_form.rank() != 2 {
            return Err(Error::dimension_mismatch(format!(
                "Expected residual and Jacobian forms of rank 1 and 2, got {} and {}",
                residual_form.rank(),
                jacobian_form.rank()
            )));
        }
        let n = u.space().num_dofs();
        let spaces = [residual_form.test_space(), jacobian_form.test_space(), jacobian_form.trial_space()];
        if spaces.iter().flatten().any(|space| space.num_dofs() != n) {
            return Err(Error::dimension_mismatch(
                "Residual and Jacobian spaces must have as many DOFs as the unknown",
            ));
        }
        Ok(Self {
            assembler,
            residual_form,
            jacobian_form,
            bcs,
            state: u.clone(),
            extra_coefficients,
            pattern: None,
        })
    }

    fn coefficients(&self) -> Vec<&Function<T>> {
        std::iter::once(&self.state)
            .chain(self.extra_coefficients.iter().copied())
            .collect()
    }

    fn assemble_residual(&mut self, x: DVectorView<T>) -> Result<DVector<T>> {
        self.state.values_mut().copy_from(&x);
        let coefficients = self.coefficients();
        let x0 = self.state.values();
        let mut f = self.assembler.assemble_vector(self.residual_form, &coefficients)?;
        self.assembler
            .apply_lifting(&mut f, self.jacobian_form, &coefficients, self.bcs, Some(x0), -T::one())?;
        let test_space = self.residual_form.test_space();
        let test_bcs = self
            .bcs
            .iter()
            .filter(|bc| test_space.map_or(false, |space| Arc::ptr_eq(bc.space(), space)));
        set_bc(&mut f, test_bcs, Some(x0), -T::one())?;
        Ok(f)
    }

    fn assemble_jacobian(&mut self, x: DVectorView<T>) -> Result<CsrMatrix<T>> {
        self.state.values_mut().copy_from(&x);
        let pattern = match &self.pattern {
            Some(pattern) => pattern.clone(),
            None => {
                let pattern = self.assembler.sparsity_pattern(self.jacobian_form)?;
                self.pattern = Some(pattern.clone());
                pattern
            }
        };
        let values = vec![T::zero(); pattern.nnz()];
        let mut matrix =
            CsrMatrix::try_from_pattern_and_values(pattern, values).expect("Values must match the pattern");
        let coefficients = self.coefficients();
        self.assembler
            .assemble_matrix_into(&mut matrix, self.jacobian_form, &coefficients, self.bcs)?;
        Ok(matrix)
    }
}

impl<'a, T: Real> NonlinearProblem<T> for NonlinearFormProblem<'a, T> {
    fn dimension(&self) -> usize {
        self.state.values().len()
    }

    fn residual(&mut self, x: DVectorView<T>, mut f: DVectorViewMut<T>) -> eyre::Result<()> {
        let residual = self.assemble_residual(x)?;
        f.copy_from(&residual);
        Ok(())
    }

    fn jacobian(&mut self, x: DVectorView<T>) -> eyre::Result<CsrMatrix<T>> {
        Ok(self.assemble_jacobian(x)?)
    }
}

/// Solves nonlinear variational problems with Newton's method.
///
/// Each iteration assembles the Jacobian at the current iterate, solves the linearized system
/// with the configured linear solver (dense LU by default) and applies the relaxed update to
/// the unknown.
pub struct NewtonSolver<T: Real> {
    settings: NewtonSettings<T>,
    linear_solver: Box<dyn LinearSolver<T> + Send>,
    assembler: Assembler<T>,
    cancellation: Option<CancellationToken>,
}

impl<T: Real> Debug for NewtonSolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewtonSolver")
            .field("settings", &self.settings)
            .field("assembler", &self.assembler)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

impl<T: Real> Default for NewtonSolver<T> {
    fn default() -> Self {
        Self::new(Context::default())
    }
}

impl<T: Real> NewtonSolver<T> {
    pub fn new(context: Context) -> Self {
        Self {
            settings: NewtonSettings::default(),
            linear_solver: Box::new(DenseLu::default()),
            assembler: Assembler::new(context),
            cancellation: None,
        }
    }

    pub fn with_settings(mut self, settings: NewtonSettings<T>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_linear_solver(mut self, linear_solver: impl LinearSolver<T> + Send + 'static) -> Self {
        self.linear_solver = Box::new(linear_solver);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn settings(&self) -> &NewtonSettings<T> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut NewtonSettings<T> {
        &mut self.settings
    }

    pub fn assembler(&self) -> &Assembler<T> {
        &self.assembler
    }

    /// Solves `F(u; v) = 0` for `u`, where `u` is the only coefficient of the residual form
    /// and its Jacobian.
    ///
    /// `u` holds the initial guess on entry and the last iterate on return, also when the
    /// iteration did not converge.
    pub fn solve(
        &mut self,
        u: &mut Function<T>,
        residual_form: &Form<T>,
        jacobian_form: &Form<T>,
        bcs: &[DirichletBC<T>],
    ) -> Result<NewtonReport<T>> {
        self.solve_with_coefficients(u, residual_form, jacobian_form, bcs, &[])
    }

    /// Like [`solve`](Self::solve), for forms with additional coefficients after `u`.
    pub fn solve_with_coefficients(
        &mut self,
        u: &mut Function<T>,
        residual_form: &Form<T>,
        jacobian_form: &Form<T>,
        bcs: &[DirichletBC<T>],
        extra_coefficients: &[&Function<T>],
    ) -> Result<NewtonReport<T>> {
        let _timer = self.assembler.context().timer("Newton solve");
        let problem = NonlinearFormProblem::new(
            &self.assembler,
            u,
            residual_form,
            jacobian_form,
            bcs,
            extra_coefficients,
        )?;
        let report = newton(
            problem,
            u.values_mut(),
            &mut *self.linear_solver,
            &self.settings,
            self.cancellation.as_ref(),
        )
        .map_err(|err| match err {
            NewtonError::Problem(report) => report.downcast::<Error>().unwrap_or_else(Error::Kernel),
            NewtonError::LinearSolveFailure { error, .. } => Error::LinearSolveFailure(error),
            err => Error::Kernel(eyre::Report::new(err)),
        })?;
        debug!("Newton solve ended with status {:?}", report.status);
        Ok(report)
    }
}
