use super::poisson_forms;
use galerkin::assembly::Assembler;
use galerkin::mesh::procedural::{create_unit_cube, create_unit_interval, create_unit_square};
use galerkin::sparse::{ConjugateGradient, DenseLu, LinearSolver};
use galerkin::{CellType, DirichletBC, ElementDescription, Function, FunctionSpace, Mesh};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::DVector;
use std::sync::Arc;

/// Solves `-div grad u = f` with `u = u_exact` on the whole boundary.
fn solve_poisson(
    mesh: Mesh<f64>,
    description: ElementDescription,
    u_exact: fn(&[f64]) -> f64,
    f: fn(&[f64]) -> f64,
    solver: &mut dyn LinearSolver<f64>,
) -> Function<f64> {
    let space = FunctionSpace::build(Arc::new(mesh), description).unwrap();
    let (a, l) = poisson_forms(&space, f);
    let bc = DirichletBC::from_subdomain_with(space.clone(), |_| true, |x, _| u_exact(x));
    let (matrix, rhs) = Assembler::default()
        .assemble_system(&a, &[], &l, &[], &[bc])
        .unwrap();
    let u = solver.solve(&matrix, rhs.as_view()).unwrap();
    Function::from_vector(space, u).unwrap()
}

fn nodal_values(space: &FunctionSpace<f64>, u: fn(&[f64]) -> f64) -> DVector<f64> {
    let coordinates = space.tabulate_dof_coordinates();
    let x: Vec<Vec<f64>> = coordinates
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect();
    DVector::from_iterator(x.len(), x.iter().map(|x| u(x)))
}

fn linear(x: &[f64]) -> f64 {
    1.0 + x.iter().enumerate().map(|(d, x_d)| (d + 1) as f64 * x_d).sum::<f64>()
}

fn quadratic(x: &[f64]) -> f64 {
    1.0 + x[0] * x[0] + 2.0 * x[1] * x[1]
}

#[test]
fn p1_reproduces_linear_solution() {
    let mesh = create_unit_square(4, 3, CellType::Triangle).unwrap();
    let description = ElementDescription::lagrange(CellType::Triangle, 1);
    let u = solve_poisson(mesh, description, linear, |_| 0.0, &mut DenseLu::default());
    let expected = nodal_values(u.space(), linear);
    assert_matrix_eq!(u.values().clone(), expected, comp = abs, tol = 1e-12);
}

#[test]
fn p1_tetrahedra_reproduce_linear_solution() {
    let mesh = create_unit_cube(2, 2, 2, CellType::Tetrahedron).unwrap();
    let description = ElementDescription::lagrange(CellType::Tetrahedron, 1);
    let u = solve_poisson(mesh, description, linear, |_| 0.0, &mut DenseLu::default());
    let expected = nodal_values(u.space(), linear);
    assert_matrix_eq!(u.values().clone(), expected, comp = abs, tol = 1e-12);
}

#[test]
fn p2_reproduces_quadratic_solution() {
    let mesh = create_unit_square(3, 3, CellType::Triangle).unwrap();
    let description = ElementDescription::lagrange(CellType::Triangle, 2);
    let u = solve_poisson(mesh, description, quadratic, |_| -6.0, &mut DenseLu::default());
    let expected = nodal_values(u.space(), quadratic);
    assert_matrix_eq!(u.values().clone(), expected, comp = abs, tol = 1e-11);

    // Between the nodes, too
    let x = [0.3, 0.7];
    let value = u.eval(&x).unwrap();
    assert_scalar_eq!(value[0], quadratic(&x), comp = abs, tol = 1e-11);
}

#[test]
fn q2_reproduces_quadratic_solution() {
    let mesh = create_unit_square(3, 2, CellType::Quadrilateral).unwrap();
    let description = ElementDescription::lagrange(CellType::Quadrilateral, 2);
    let mut cg = ConjugateGradient::default();
    let u = solve_poisson(mesh, description, quadratic, |_| -6.0, &mut cg);
    let expected = nodal_values(u.space(), quadratic);
    assert_matrix_eq!(u.values().clone(), expected, comp = abs, tol = 1e-9);
}

#[test]
fn p2_interval_reproduces_quadratic_solution() {
    let mesh = create_unit_interval(5).unwrap();
    let description = ElementDescription::lagrange(CellType::Interval, 2);
    let u = solve_poisson(mesh, description, |x| x[0] * x[0], |_| -2.0, &mut DenseLu::default());
    let expected = nodal_values(u.space(), |x| x[0] * x[0]);
    assert_matrix_eq!(u.values().clone(), expected, comp = abs, tol = 1e-12);
}
