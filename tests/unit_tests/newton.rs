use eyre::eyre;
use galerkin::assembly::local::{bilinear_integrand, dot, linear_integrand, LocalKernel};
use galerkin::assembly::{EntityValues, PointValues, Shape};
use galerkin::mesh::procedural::create_unit_interval;
use galerkin::optimize::newton::{NewtonSettings, NewtonStatus};
use galerkin::optimize::CancellationToken;
use galerkin::{CellType, DirichletBC, ElementDescription, Error, Form, FormBuilder, Function, FunctionSpace, NewtonSolver};
use matrixcompare::assert_scalar_eq;
use nalgebra::DMatrixViewMut;
use std::sync::Arc;

/// A single DG0 cell of unit length, so that integrals of the unknown are just its value.
fn scalar_space() -> Arc<FunctionSpace<f64>> {
    let mesh = Arc::new(create_unit_interval(1).unwrap());
    FunctionSpace::build(mesh, ElementDescription::discontinuous_lagrange(CellType::Interval, 0)).unwrap()
}

/// Forms for the scalar equation `f(u) = 0` with derivative `df`.
fn scalar_equation(space: &Arc<FunctionSpace<f64>>, f: fn(f64) -> f64, df: fn(f64) -> f64) -> (Form<f64>, Form<f64>) {
    let residual = FormBuilder::linear(space.clone())
        .with_coefficient(space.clone())
        .cell_integral(linear_integrand(move |p: &PointValues<f64>, v: &Shape<f64>| {
            f(p.coefficient(0)[0]) * v.value
        }))
        .build()
        .unwrap();
    let jacobian = FormBuilder::bilinear(space.clone(), space.clone())
        .with_coefficient(space.clone())
        .cell_integral(bilinear_integrand(
            move |p: &PointValues<f64>, v: &Shape<f64>, du: &Shape<f64>| df(p.coefficient(0)[0]) * du.value * v.value,
        ))
        .build()
        .unwrap();
    (residual, jacobian)
}

fn function_with_value(space: &Arc<FunctionSpace<f64>>, value: f64) -> Function<f64> {
    let mut u = Function::new(space.clone());
    u.values_mut().fill(value);
    u
}

#[test]
fn square_root_of_two() {
    let space = scalar_space();
    let (residual, jacobian) = scalar_equation(&space, |u| u * u - 2.0, |u| 2.0 * u);
    let mut u = function_with_value(&space, 1.0);
    let settings = NewtonSettings {
        rtol: 1e-10,
        ..NewtonSettings::default()
    };

    let report = NewtonSolver::default()
        .with_settings(settings)
        .solve(&mut u, &residual, &jacobian, &[])
        .unwrap();
    assert_eq!(report.status, NewtonStatus::Converged);
    assert!(report.iterations < 10);
    assert_scalar_eq!(u.values()[0], 2.0_f64.sqrt(), comp = abs, tol = 1e-12);
}

#[test]
fn zero_iterations_leave_the_guess_untouched() {
    let space = scalar_space();
    let (residual, jacobian) = scalar_equation(&space, |u| u * u - 2.0, |u| 2.0 * u);
    let mut u = function_with_value(&space, 1.0);
    let settings = NewtonSettings {
        max_iterations: 0,
        ..NewtonSettings::default()
    };

    let report = NewtonSolver::default()
        .with_settings(settings)
        .solve(&mut u, &residual, &jacobian, &[])
        .unwrap();
    assert_eq!(report.status, NewtonStatus::MaxIterationsExceeded);
    assert_eq!(report.iterations, 0);
    assert!(report.residual_norms.is_empty());
    assert_eq!(u.values()[0], 1.0);
}

#[test]
fn singular_jacobian_is_a_linear_solve_failure() {
    let space = scalar_space();
    let (residual, jacobian) = scalar_equation(&space, |u| u * u - 2.0, |u| 2.0 * u);
    let mut u = function_with_value(&space, 0.0);

    let result = NewtonSolver::default().solve(&mut u, &residual, &jacobian, &[]);
    assert!(matches!(result, Err(Error::LinearSolveFailure(_))));
}

#[test]
fn growing_residual_is_divergence() {
    // Newton on the cube root overshoots: u_{k+1} = -2 u_k
    let space = scalar_space();
    let (residual, jacobian) = scalar_equation(&space, f64::cbrt, |u| u.cbrt() / (3.0 * u));
    let mut u = function_with_value(&space, 1.0);
    let settings = NewtonSettings {
        divergence_factor: 1.1,
        ..NewtonSettings::default()
    };

    let report = NewtonSolver::default()
        .with_settings(settings)
        .solve(&mut u, &residual, &jacobian, &[])
        .unwrap();
    assert_eq!(report.status, NewtonStatus::DivergedResidual);
    assert_eq!(report.iterations, 1);
    assert_scalar_eq!(u.values()[0], -2.0, comp = abs, tol = 1e-12);
}

#[test]
fn cancelled_solve_stops_before_the_first_update() {
    let space = scalar_space();
    let (residual, jacobian) = scalar_equation(&space, |u| u * u - 2.0, |u| 2.0 * u);
    let mut u = function_with_value(&space, 1.0);
    let token = CancellationToken::new();
    token.cancel();

    let report = NewtonSolver::default()
        .with_cancellation(token)
        .solve(&mut u, &residual, &jacobian, &[])
        .unwrap();
    assert_eq!(report.status, NewtonStatus::Cancelled);
    assert_eq!(report.iterations, 0);
    assert_eq!(report.residual_norms.len(), 1);
    assert_eq!(u.values()[0], 1.0);
}

struct FailingKernel;

impl LocalKernel<f64> for FailingKernel {
    fn tabulate(&self, _values: &EntityValues<f64>, _output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        Err(eyre!("Material law undefined"))
    }
}

#[test]
fn kernel_failures_are_propagated() {
    let space = scalar_space();
    let (_, jacobian) = scalar_equation(&space, |u| u, |_| 1.0);
    let residual = FormBuilder::linear(space.clone())
        .with_coefficient(space.clone())
        .cell_integral(FailingKernel)
        .build()
        .unwrap();
    let mut u = function_with_value(&space, 1.0);

    let result = NewtonSolver::default().solve(&mut u, &residual, &jacobian, &[]);
    assert!(matches!(result, Err(Error::Kernel(_))));
}

/// `-((1 + u^2) u')' = -2x` on the unit interval with `u(0) = 0`, `u(1) = 1` has the solution
/// `u = x`, which P1 elements reproduce exactly.
#[test]
fn nonlinear_diffusion_on_interval() {
    let mesh = Arc::new(create_unit_interval(8).unwrap());
    let space = FunctionSpace::build(mesh, ElementDescription::lagrange(CellType::Interval, 1)).unwrap();
    let residual = FormBuilder::linear(space.clone())
        .with_coefficient(space.clone())
        .cell_integral(linear_integrand(|p: &PointValues<f64>, v: &Shape<f64>| {
            let u = p.coefficient(0)[0];
            (1.0 + u * u) * dot(p.coefficient_gradient(0, 0), v.gradient) + 2.0 * p.x[0] * v.value
        }))
        .build()
        .unwrap();
    let jacobian = FormBuilder::bilinear(space.clone(), space.clone())
        .with_coefficient(space.clone())
        .cell_integral(bilinear_integrand(|p: &PointValues<f64>, v: &Shape<f64>, du: &Shape<f64>| {
            let u = p.coefficient(0)[0];
            let grad_u = p.coefficient_gradient(0, 0);
            (1.0 + u * u) * dot(du.gradient, v.gradient) + 2.0 * u * du.value * dot(grad_u, v.gradient)
        }))
        .build()
        .unwrap();
    let bcs = [DirichletBC::from_subdomain_with(space.clone(), |_| true, |x, _| x[0])];
    let mut u = Function::new(space.clone());

    let report = NewtonSolver::default()
        .solve(&mut u, &residual, &jacobian, &bcs)
        .unwrap();
    assert!(report.converged());
    assert!(report.iterations < 10);

    let x = space.tabulate_dof_coordinates();
    for (node, &u_node) in u.values().iter().enumerate() {
        assert_scalar_eq!(u_node, x[(node, 0)], comp = abs, tol = 1e-9);
    }
}

#[test]
fn extra_coefficients_follow_the_unknown() {
    // L2 projection of g, written as the nonlinear problem int (u - g) v = 0
    let mesh = Arc::new(create_unit_interval(4).unwrap());
    let space = FunctionSpace::build(mesh, ElementDescription::lagrange(CellType::Interval, 1)).unwrap();
    let residual = FormBuilder::linear(space.clone())
        .with_coefficient(space.clone())
        .with_coefficient(space.clone())
        .cell_integral(linear_integrand(|p: &PointValues<f64>, v: &Shape<f64>| {
            (p.coefficient(0)[0] - p.coefficient(1)[0]) * v.value
        }))
        .build()
        .unwrap();
    let jacobian = FormBuilder::bilinear(space.clone(), space.clone())
        .with_coefficient(space.clone())
        .with_coefficient(space.clone())
        .cell_integral(bilinear_integrand(|_: &PointValues<f64>, v: &Shape<f64>, du: &Shape<f64>| {
            du.value * v.value
        }))
        .build()
        .unwrap();
    let mut g = Function::new(space.clone());
    g.interpolate(|x| 1.0 - 3.0 * x[0]).unwrap();
    let mut u = Function::new(space);

    let report = NewtonSolver::default()
        .solve_with_coefficients(&mut u, &residual, &jacobian, &[], &[&g])
        .unwrap();
    assert!(report.converged());
    for (u_i, g_i) in u.values().iter().zip(g.values().iter()) {
        assert_scalar_eq!(*u_i, *g_i, comp = abs, tol = 1e-12);
    }
}
