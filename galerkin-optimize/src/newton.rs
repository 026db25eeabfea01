use crate::problem::NonlinearProblem;
use crate::CancellationToken;
use galerkin_sparse::{LinearSolveError, LinearSolver};
use galerkin_traits::Real;
use log::{debug, info, warn};
use nalgebra::{DVector, DVectorViewMut};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// The quantity compared against the tolerances to decide convergence.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceCriterion {
    /// Euclidean norm of the residual `F(x)`, relative to the initial residual.
    Residual,
    /// Euclidean norm of the applied update, relative to the first update.
    Incremental,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonSettings<T> {
    pub max_iterations: usize,
    pub rtol: T,
    pub atol: T,
    /// The iteration is considered diverged when the residual norm grows by more than this
    /// factor in a single iteration.
    pub divergence_factor: T,
    pub convergence_criterion: ConvergenceCriterion,
    /// Scaling applied to each Newton update.
    pub relaxation: T,
}

impl<T: Real> Default for NewtonSettings<T> {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            rtol: T::from_f64_const(1e-9),
            atol: T::from_f64_const(1e-10),
            divergence_factor: T::from_f64_const(1e4),
            convergence_criterion: ConvergenceCriterion::Residual,
            relaxation: T::one(),
        }
    }
}

/// The states of a Newton iteration.
///
/// A solve starts out `Initialized`, moves to `Iterating` once the initial residual has been
/// evaluated, and ends in exactly one of the terminal states.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewtonStatus {
    Initialized,
    Iterating,
    Converged,
    MaxIterationsExceeded,
    DivergedResidual,
    Cancelled,
}

impl NewtonStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initialized | Self::Iterating)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonReport<T> {
    pub status: NewtonStatus,
    /// Number of updates applied to the initial guess.
    pub iterations: usize,
    /// Residual norms, starting with the norm at the initial guess. Empty if no residual
    /// was ever evaluated.
    pub residual_norms: Vec<T>,
}

impl<T: Real> NewtonReport<T> {
    pub fn converged(&self) -> bool {
        self.status == NewtonStatus::Converged
    }

    pub fn initial_residual_norm(&self) -> Option<T> {
        self.residual_norms.first().copied()
    }

    pub fn final_residual_norm(&self) -> Option<T> {
        self.residual_norms.last().copied()
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum NewtonError {
    /// Evaluating the residual or the Jacobian failed.
    Problem(eyre::Report),
    /// The Jacobian system could not be solved.
    LinearSolveFailure { iteration: usize, error: LinearSolveError },
}

impl Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            NewtonError::Problem(err) => write!(f, "Failed to evaluate nonlinear problem: {}", err),
            NewtonError::LinearSolveFailure { iteration, error } => {
                write!(f, "Failed to solve Jacobian system in iteration {}. Error: {}", iteration, error)
            }
        }
    }
}

impl Error for NewtonError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NewtonError::Problem(err) => Some(&**err),
            NewtonError::LinearSolveFailure { error, .. } => Some(error),
        }
    }
}

/// Attempts to solve the nonlinear equation `F(x) = 0` with Newton's method.
///
/// Each iteration solves `J(x) dx = -F(x)` with the given linear solver and updates
/// `x <- x + relaxation * dx`. `x` holds the initial guess on entry and the last iterate on
/// return. Non-convergence (iteration limit, divergence, cancellation) is reported through
/// [`NewtonReport::status`]; only failures to evaluate the problem or to solve a linear system
/// are errors.
///
/// With `max_iterations == 0`, the problem is not evaluated and `x` is left untouched.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn newton<'a, T, P, S>(
    mut problem: P,
    x: impl Into<DVectorViewMut<'a, T>>,
    linear_solver: &mut S,
    settings: &NewtonSettings<T>,
    cancellation: Option<&CancellationToken>,
) -> Result<NewtonReport<T>, NewtonError>
where
    T: Real,
    P: NonlinearProblem<T>,
    S: ?Sized + LinearSolver<T>,
{
    let mut x = x.into();
    let mut report = NewtonReport {
        status: NewtonStatus::Initialized,
        iterations: 0,
        residual_norms: Vec::new(),
    };

    if settings.max_iterations == 0 {
        warn!("Newton solver called with zero maximum iterations");
        report.status = NewtonStatus::MaxIterationsExceeded;
        return Ok(report);
    }

    let n = problem.dimension();
    if x.len() != n {
        return Err(NewtonError::Problem(eyre::eyre!(
            "Initial guess has length {}, but problem has dimension {}",
            x.len(),
            n
        )));
    }

    let mut f = DVector::zeros(n);
    problem
        .residual((&x).into(), (&mut f).into())
        .map_err(NewtonError::Problem)?;
    let r0 = f.norm();
    report.residual_norms.push(r0);
    log_iteration(0, r0, r0, settings);

    report.status = NewtonStatus::Iterating;
    debug!("Newton status: {:?}", report.status);

    if !r0.is_finite() {
        report.status = NewtonStatus::DivergedResidual;
    } else if settings.convergence_criterion == ConvergenceCriterion::Residual
        && r0 <= settings.atol.max(settings.rtol * r0)
    {
        report.status = NewtonStatus::Converged;
    }

    let mut r_prev = r0;
    let mut first_increment_norm = None;
    while !report.status.is_terminal() {
        if report.iterations >= settings.max_iterations {
            report.status = NewtonStatus::MaxIterationsExceeded;
            break;
        }
        if cancellation.map(CancellationToken::is_cancelled).unwrap_or(false) {
            report.status = NewtonStatus::Cancelled;
            break;
        }

        let jacobian = problem.jacobian((&x).into()).map_err(NewtonError::Problem)?;
        let minus_f = -&f;
        let dx = linear_solver
            .solve(&jacobian, minus_f.as_view())
            .map_err(|error| NewtonError::LinearSolveFailure {
                iteration: report.iterations,
                error,
            })?;

        x.axpy(settings.relaxation, &dx, 1.0);
        report.iterations += 1;

        problem
            .residual((&x).into(), (&mut f).into())
            .map_err(NewtonError::Problem)?;
        let r = f.norm();
        report.residual_norms.push(r);
        log_iteration(report.iterations, r, r0, settings);

        let converged = match settings.convergence_criterion {
            ConvergenceCriterion::Residual => r <= settings.atol.max(settings.rtol * r0),
            ConvergenceCriterion::Incremental => {
                let increment_norm = settings.relaxation.abs() * dx.norm();
                let reference = *first_increment_norm.get_or_insert(increment_norm);
                debug!("Newton increment norm at iter {}: {}", report.iterations, increment_norm);
                increment_norm <= settings.atol.max(settings.rtol * reference)
            }
        };

        if converged && r.is_finite() {
            report.status = NewtonStatus::Converged;
        } else if !r.is_finite() || r > settings.divergence_factor * r_prev {
            report.status = NewtonStatus::DivergedResidual;
        }
        r_prev = r;
    }

    match report.status {
        NewtonStatus::Converged => info!("Newton solver finished in {} iterations", report.iterations),
        status => warn!(
            "Newton solver stopped after {} iterations with status {:?}",
            report.iterations, status
        ),
    }

    Ok(report)
}

fn log_iteration<T: Real>(iteration: usize, r: T, r0: T, settings: &NewtonSettings<T>) {
    let relative = if r0 > T::zero() { r / r0 } else { T::zero() };
    info!(
        "Newton iteration {}: r (abs) = {} (tol = {}) r (rel) = {} (tol = {})",
        iteration, r, settings.atol, relative, settings.rtol
    );
}
