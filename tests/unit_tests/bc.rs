use super::poisson_forms;
use galerkin::assembly::{apply_lifting_and_bcs, set_bc, Assembler};
use galerkin::mesh::procedural::create_unit_square;
use galerkin::{CellType, DirichletBC, ElementDescription, Error, FunctionSpace};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

fn p1_space(n: usize) -> Arc<FunctionSpace<f64>> {
    let mesh = create_unit_square(n, n, CellType::Triangle).unwrap();
    FunctionSpace::build(Arc::new(mesh), ElementDescription::lagrange(CellType::Triangle, 1)).unwrap()
}

#[test]
fn constrained_rows_and_columns_are_identity() {
    let space = p1_space(3);
    let (a, l) = poisson_forms(&space, |x| x[0] + x[1]);
    let bc = DirichletBC::from_subdomain(space.clone(), |x| x[0] < 1e-12, 2.5);
    assert_eq!(bc.num_dofs(), 4);
    let (matrix, rhs) = Assembler::default()
        .assemble_system(&a, &[], &l, &[], &[bc.clone()])
        .unwrap();

    let dense = DMatrix::from(&matrix);
    for &dof in bc.dofs() {
        for j in 0..dense.ncols() {
            let expected = if j == dof { 1.0 } else { 0.0 };
            assert_eq!(dense[(dof, j)], expected);
            assert_eq!(dense[(j, dof)], expected);
        }
        assert_eq!(rhs[dof], 2.5);
    }
}

#[test]
fn algebraic_elimination_matches_assembled_system() {
    let space = p1_space(4);
    let (a, l) = poisson_forms(&space, |x| 1.0 + x[1]);
    let bcs = vec![
        DirichletBC::from_subdomain_with(space.clone(), |x| x[1] < 1e-12, |x, _| x[0]),
        DirichletBC::from_subdomain(space.clone(), |x| x[0] > 1.0 - 1e-12, -1.0),
    ];
    let assembler = Assembler::default();
    let (expected_matrix, expected_rhs) = assembler.assemble_system(&a, &[], &l, &[], &bcs).unwrap();

    let mut matrix = assembler.assemble_matrix(&a, &[], &[]).unwrap();
    let mut rhs = assembler.assemble_vector(&l, &[]).unwrap();
    apply_lifting_and_bcs(&mut matrix, &mut rhs, &bcs, None, 1.0).unwrap();

    assert_matrix_eq!(DMatrix::from(&matrix), DMatrix::from(&expected_matrix), comp = abs, tol = 1e-12);
    assert_matrix_eq!(rhs, expected_rhs, comp = abs, tol = 1e-12);
}

#[test]
fn lifting_with_guess_and_scale() {
    let space = p1_space(2);
    let (a, _) = poisson_forms(&space, |_| 0.0);
    let bc = DirichletBC::from_dofs(space.clone(), vec![0], vec![3.0]).unwrap();
    let assembler = Assembler::default();
    let matrix = DMatrix::from(&assembler.assemble_matrix(&a, &[], &[]).unwrap());

    let n = space.num_dofs();
    let x0 = DVector::from_fn(n, |i, _| i as f64);
    let mut b = DVector::zeros(n);
    assembler
        .apply_lifting(&mut b, &a, &[], &[bc.clone()], Some(&x0), -1.0)
        .unwrap();
    set_bc(&mut b, [&bc], Some(&x0), -1.0).unwrap();

    // b_i = A_i0 (g - x0_0) for unconstrained rows, b_0 = x0_0 - g
    let mut expected = matrix.column(0) * 3.0;
    expected[0] = -3.0;
    assert_matrix_eq!(b, expected, comp = abs, tol = 1e-12);
}

#[test]
fn out_of_range_boundary_dofs_are_rejected() {
    let bc = DirichletBC::from_dofs(p1_space(2), vec![8], vec![0.0]).unwrap();
    let mut b = DVector::zeros(4);
    let result = set_bc(&mut b, [&bc], None, 1.0);
    assert!(matches!(result, Err(Error::InvalidDof { dof: 8, num_dofs: 4 })));
}
