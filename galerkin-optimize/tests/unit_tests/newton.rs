use galerkin_optimize::newton::*;
use galerkin_optimize::problem::{NonlinearProblem, NonlinearProblemBuilder};
use galerkin_optimize::CancellationToken;
use galerkin_sparse::{DenseLu, LinearSolveError};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Matrix3, Vector3};
use nalgebra_sparse::CsrMatrix;

fn scalar_problem(
    f: impl Fn(f64) -> f64,
    df: impl Fn(f64) -> f64,
) -> impl NonlinearProblem<f64> {
    NonlinearProblemBuilder::with_dimension(1)
        .with_residual(move |x: DVectorView<f64>, mut r: DVectorViewMut<f64>| {
            r[0] = f(x[0]);
            Ok(())
        })
        .with_jacobian(move |x: DVectorView<f64>| Ok(CsrMatrix::from(&DMatrix::from_element(1, 1, df(x[0])))))
}

fn sqrt2_problem() -> impl NonlinearProblem<f64> {
    scalar_problem(|x| x * x - 2.0, |x| 2.0 * x)
}

#[test]
fn newton_finds_sqrt_2() {
    let mut x = DVector::from_element(1, 1.0);
    let settings = NewtonSettings::default();
    let report = newton(sqrt2_problem(), &mut x, &mut DenseLu::new(), &settings, None).unwrap();

    assert_eq!(report.status, NewtonStatus::Converged);
    assert!(report.converged());
    assert!(report.iterations < 10);
    assert_eq!(report.residual_norms.len(), report.iterations + 1);
    assert_eq!(report.initial_residual_norm(), Some(1.0));
    assert!((x[0] - 2.0f64.sqrt()).abs() < 1e-9);
}

#[test]
fn newton_converges_in_single_iteration_for_linear_system() {
    let a = Matrix3::new(5.0, 1.0, 2.0, 1.0, 4.0, 2.0, 2.0, 2.0, 4.0);
    let b = Vector3::new(1.0, 2.0, 3.0);
    let a_csr = CsrMatrix::from(&DMatrix::from_iterator(3, 3, a.iter().copied()));
    let problem = NonlinearProblemBuilder::with_dimension(3)
        .with_residual(|x: DVectorView<f64>, mut f: DVectorViewMut<f64>| {
            f.copy_from(&(a * x - b));
            Ok(())
        })
        .with_jacobian(|_: DVectorView<f64>| Ok(a_csr.clone()));

    let mut x = DVector::zeros(3);
    let settings = NewtonSettings::default();
    let report = newton(problem, &mut x, &mut DenseLu::new(), &settings, None).unwrap();

    let expected_solution = DVector::from_column_slice(&[-0.125, 1.0 / 6.0, 0.7291666666666666]);
    assert_eq!(report.status, NewtonStatus::Converged);
    assert_eq!(report.iterations, 1);
    assert_matrix_eq!(x, expected_solution, comp = abs, tol = 1e-12);
}

#[test]
fn newton_with_zero_max_iterations_does_not_evaluate_or_modify_guess() {
    let problem = NonlinearProblemBuilder::with_dimension(1)
        .with_residual(|_: DVectorView<f64>, _: DVectorViewMut<f64>| -> eyre::Result<()> {
            panic!("Residual must not be evaluated")
        })
        .with_jacobian(|_: DVectorView<f64>| -> eyre::Result<CsrMatrix<f64>> {
            panic!("Jacobian must not be evaluated")
        });

    let mut x = DVector::from_element(1, 3.0);
    let settings = NewtonSettings {
        max_iterations: 0,
        ..NewtonSettings::default()
    };
    let report = newton(problem, &mut x, &mut DenseLu::new(), &settings, None).unwrap();

    assert_eq!(report.status, NewtonStatus::MaxIterationsExceeded);
    assert_eq!(report.iterations, 0);
    assert!(report.residual_norms.is_empty());
    assert_eq!(x[0], 3.0);
}

#[test]
fn newton_reports_max_iterations_exceeded() {
    let mut x = DVector::from_element(1, 1.0);
    let settings = NewtonSettings {
        max_iterations: 2,
        ..NewtonSettings::default()
    };
    let report = newton(sqrt2_problem(), &mut x, &mut DenseLu::new(), &settings, None).unwrap();

    assert_eq!(report.status, NewtonStatus::MaxIterationsExceeded);
    assert_eq!(report.iterations, 2);
    // The last iterate is kept
    assert!((x[0] - 17.0 / 12.0).abs() < 1e-14);
}

#[test]
fn newton_fails_on_singular_jacobian() {
    let problem = scalar_problem(|x| x * x + 1.0, |x| 2.0 * x);
    let mut x = DVector::zeros(1);
    let result = newton(problem, &mut x, &mut DenseLu::new(), &NewtonSettings::default(), None);

    match result {
        Err(NewtonError::LinearSolveFailure { iteration, error }) => {
            assert_eq!(iteration, 0);
            assert_eq!(error, LinearSolveError::Singular);
        }
        other => panic!("Expected linear solve failure, got {:?}", other),
    }
}

#[test]
fn newton_detects_diverging_residual() {
    // Newton on the cube root overshoots: x_{k+1} = -2 x_k
    let problem = scalar_problem(|x| x.cbrt(), |x| x.abs().powf(-2.0 / 3.0) / 3.0);
    let mut x = DVector::from_element(1, 1.0);
    let settings = NewtonSettings {
        divergence_factor: 1.2,
        ..NewtonSettings::default()
    };
    let report = newton(problem, &mut x, &mut DenseLu::new(), &settings, None).unwrap();

    assert_eq!(report.status, NewtonStatus::DivergedResidual);
    assert_eq!(report.iterations, 1);
    assert!((x[0] + 2.0).abs() < 1e-12);
}

#[test]
fn newton_stops_when_cancelled() {
    let token = CancellationToken::new();
    token.cancel();

    let mut x = DVector::from_element(1, 1.0);
    let report = newton(
        sqrt2_problem(),
        &mut x,
        &mut DenseLu::new(),
        &NewtonSettings::default(),
        Some(&token),
    )
    .unwrap();

    assert_eq!(report.status, NewtonStatus::Cancelled);
    assert_eq!(report.iterations, 0);
    assert_eq!(report.residual_norms, vec![1.0]);
    assert_eq!(x[0], 1.0);

    token.reset();
    let report = newton(
        sqrt2_problem(),
        &mut x,
        &mut DenseLu::new(),
        &NewtonSettings::default(),
        Some(&token),
    )
    .unwrap();
    assert_eq!(report.status, NewtonStatus::Converged);
}

#[test]
fn newton_incremental_criterion_converges() {
    let mut x = DVector::from_element(1, 1.0);
    let settings = NewtonSettings {
        convergence_criterion: ConvergenceCriterion::Incremental,
        ..NewtonSettings::default()
    };
    let report = newton(sqrt2_problem(), &mut x, &mut DenseLu::new(), &settings, None).unwrap();

    assert_eq!(report.status, NewtonStatus::Converged);
    assert!(report.iterations < 10);
    assert!((x[0] - 2.0f64.sqrt()).abs() < 1e-9);
}

#[test]
fn newton_propagates_problem_errors() {
    let problem = NonlinearProblemBuilder::with_dimension(1)
        .with_residual(|_: DVectorView<f64>, _: DVectorViewMut<f64>| Err(eyre::eyre!("degenerate cell")))
        .with_jacobian(|_: DVectorView<f64>| Ok(CsrMatrix::identity(1)));

    let mut x = DVector::zeros(1);
    let result = newton(problem, &mut x, &mut DenseLu::new(), &NewtonSettings::default(), None);
    assert!(matches!(result, Err(NewtonError::Problem(_))));
}

#[test]
fn newton_rejects_guess_of_wrong_length() {
    let mut x = DVector::zeros(2);
    let result = newton(sqrt2_problem(), &mut x, &mut DenseLu::new(), &NewtonSettings::default(), None);
    assert!(matches!(result, Err(NewtonError::Problem(_))));
}

#[test]
fn newton_settings_json_roundtrip() {
    let settings = NewtonSettings {
        max_iterations: 7,
        rtol: 1e-6,
        atol: 1e-8,
        divergence_factor: 100.0,
        convergence_criterion: ConvergenceCriterion::Incremental,
        relaxation: 0.5,
    };
    let json = serde_json::to_string(&settings).unwrap();
    let deserialized: NewtonSettings<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, settings);
}
