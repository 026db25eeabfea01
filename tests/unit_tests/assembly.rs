use galerkin::assembly::local::{bilinear_integrand, dot, functional_integrand, linear_integrand, MassKernel};
use galerkin::assembly::{Assembler, PointValues, Shape};
use galerkin::mesh::procedural::{create_unit_cube, create_unit_square};
use galerkin::{CellType, Context, ContextConfig, ElementDescription, Error, FormBuilder, Function, FunctionSpace, Mesh};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use proptest::prelude::*;
use rayon::prelude::*;
use std::sync::Arc;

fn parallel_assembler() -> Assembler<f64> {
    let config = ContextConfig {
        num_threads: Some(3),
        parallel_assembly: true,
        chunk_size: 5,
    };
    Assembler::new(Context::new(config).unwrap())
}

/// A nonlinear diffusion form `int (1 + u^2) grad u . grad v` and its derivative with
/// respect to `u`, on a scalar space.
fn nonlinear_forms(space: &Arc<FunctionSpace<f64>>) -> (galerkin::Form<f64>, galerkin::Form<f64>) {
    let residual = FormBuilder::linear(space.clone())
        .with_coefficient(space.clone())
        .cell_integral(linear_integrand(|p: &PointValues<f64>, v: &Shape<f64>| {
            let u = p.coefficient(0)[0];
            (1.0 + u * u) * dot(p.coefficient_gradient(0, 0), v.gradient) - p.x[0] * v.value
        }))
        .exterior_facet_integral(linear_integrand(|p: &PointValues<f64>, v: &Shape<f64>| p.coefficient(0)[0] * v.value))
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
    (residual, jacobian)
}

fn coefficient(space: &Arc<FunctionSpace<f64>>) -> Function<f64> {
    let mut u = Function::new(space.clone());
    u.interpolate(|x| (x[0] * 3.0).sin() + x[1] * x[1]).unwrap();
    u
}

#[test]
fn repeated_assembly_is_bitwise_identical() {
    let mesh = Arc::new(create_unit_square(5, 4, CellType::Triangle).unwrap());
    let space = FunctionSpace::build(mesh, ElementDescription::lagrange(CellType::Triangle, 2)).unwrap();
    let (residual, jacobian) = nonlinear_forms(&space);
    let u = coefficient(&space);
    let assembler = Assembler::default();

    let b1 = assembler.assemble_vector(&residual, &[&u]).unwrap();
    let b2 = assembler.assemble_vector(&residual, &[&u]).unwrap();
    assert_eq!(b1, b2);

    let a1 = assembler.assemble_matrix(&jacobian, &[&u], &[]).unwrap();
    let a2 = assembler.assemble_matrix(&jacobian, &[&u], &[]).unwrap();
    assert_eq!(a1.pattern(), a2.pattern());
    assert_eq!(a1.values(), a2.values());
}

#[test]
fn serial_and_parallel_assembly_agree_exactly() {
    let mesh = Arc::new(create_unit_square(6, 5, CellType::Quadrilateral).unwrap());
    let space = FunctionSpace::build(mesh, ElementDescription::lagrange(CellType::Quadrilateral, 2)).unwrap();
    let (residual, jacobian) = nonlinear_forms(&space);
    let u = coefficient(&space);
    let serial = Assembler::default();
    let parallel = parallel_assembler();

    assert_eq!(
        serial.assemble_vector(&residual, &[&u]).unwrap(),
        parallel.assemble_vector(&residual, &[&u]).unwrap()
    );
    let a_serial = serial.assemble_matrix(&jacobian, &[&u], &[]).unwrap();
    let a_parallel = parallel.assemble_matrix(&jacobian, &[&u], &[]).unwrap();
    assert_eq!(a_serial.pattern(), a_parallel.pattern());
    assert_eq!(a_serial.values(), a_parallel.values());
    assert!(parallel.context().timing("Assemble matrix").is_some());
}

#[test]
fn kernels_may_run_their_own_parallel_work() {
    let config = ContextConfig {
        num_threads: Some(4),
        parallel_assembly: true,
        chunk_size: 64,
    };
    let assembler = Assembler::new(Context::new(config).unwrap());
    let mesh = Arc::new(create_unit_square(12, 12, CellType::Triangle).unwrap());
    let area = FormBuilder::functional(mesh)
        .cell_integral(functional_integrand(|_: &PointValues<f64>| {
            let sum: usize = (0..2000).into_par_iter().sum();
            sum as f64 / 1999000.0
        }))
        .build()
        .unwrap();

    let value = assembler.assemble_scalar(&area, &[]).unwrap();
    assert_scalar_eq!(value, 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn functionals_integrate_over_cells_and_facets() {
    let mesh = Arc::new(create_unit_cube(2, 3, 2, CellType::Tetrahedron).unwrap());
    let assembler = Assembler::default();

    let volume = FormBuilder::functional(mesh.clone())
        .cell_integral(functional_integrand(|_| 1.0))
        .build()
        .unwrap();
    assert_scalar_eq!(assembler.assemble_scalar(&volume, &[]).unwrap(), 1.0, comp = abs, tol = 1e-13);

    let area = FormBuilder::functional(mesh.clone())
        .exterior_facet_integral(functional_integrand(|_| 1.0))
        .build()
        .unwrap();
    assert_scalar_eq!(assembler.assemble_scalar(&area, &[]).unwrap(), 6.0, comp = abs, tol = 1e-13);

    // Divergence theorem: int x . n ds = 3 * volume
    let flux = FormBuilder::functional(mesh)
        .exterior_facet_integral(functional_integrand(|p: &PointValues<f64>| dot(p.x, p.normal.unwrap())))
        .build()
        .unwrap();
    assert_scalar_eq!(assembler.assemble_scalar(&flux, &[]).unwrap(), 3.0, comp = abs, tol = 1e-12);
}

#[test]
fn mismatched_inputs_are_rejected() {
    let mesh = Arc::new(create_unit_square(2, 2, CellType::Triangle).unwrap());
    let p1 = FunctionSpace::build(mesh.clone(), ElementDescription::lagrange(CellType::Triangle, 1)).unwrap();
    let p2 = FunctionSpace::build(mesh, ElementDescription::lagrange(CellType::Triangle, 2)).unwrap();
    let (residual, jacobian) = nonlinear_forms(&p2);
    let assembler = Assembler::default();

    let missing = assembler.assemble_vector(&residual, &[]);
    assert!(matches!(missing, Err(Error::DimensionMismatch(_))));

    let wrong_space = Function::new(p1);
    let wrong = assembler.assemble_vector(&residual, &[&wrong_space]);
    assert!(matches!(wrong, Err(Error::DimensionMismatch(_))));

    let wrong_rank = assembler.assemble_vector(&jacobian, &[&wrong_space]);
    assert!(matches!(wrong_rank, Err(Error::DimensionMismatch(_))));

    let u = Function::new(p2.clone());
    let mut identity = CsrMatrix::identity(p2.num_dofs());
    let too_sparse = assembler.assemble_matrix_into(&mut identity, &jacobian, &[&u], &[]);
    assert!(matches!(too_sparse, Err(Error::DimensionMismatch(_))));
}

#[test]
fn degenerate_cells_are_reported_by_the_kernel() {
    let coordinates = vec![0.0, 0.0, 1.0, 0.0, 2.0, 0.0];
    let mesh = Arc::new(Mesh::new(CellType::Triangle, 2, coordinates, vec![0, 1, 2]).unwrap());
    let space = FunctionSpace::build(mesh, ElementDescription::lagrange(CellType::Triangle, 1)).unwrap();
    let mass = FormBuilder::bilinear(space.clone(), space)
        .cell_integral(MassKernel::default())
        .build()
        .unwrap();
    let result = Assembler::default().assemble_matrix(&mass, &[], &[]);
    assert!(matches!(result, Err(Error::Kernel(_))));
}

/// The unit square mesh with its cells listed in the given order.
fn permuted_mesh(permutation: &[usize]) -> Mesh<f64> {
    let base = create_unit_square::<f64>(3, 2, CellType::Triangle).unwrap();
    let coordinates = base.coordinates().to_vec();
    let cells = permutation
        .iter()
        .flat_map(|&cell| base.cell_vertices(cell).to_vec())
        .collect();
    Mesh::new(CellType::Triangle, 2, coordinates, cells).unwrap()
}

/// Assembles a P1 load vector and reorders it by mesh vertex.
fn load_vector_by_vertex(mesh: Mesh<f64>, assembler: &Assembler<f64>) -> DVector<f64> {
    let vertices: Vec<Vec<f64>> = (0..mesh.num_vertices())
        .map(|v| mesh.vertex(v).to_vec())
        .collect();
    let space = FunctionSpace::build(Arc::new(mesh), ElementDescription::lagrange(CellType::Triangle, 1)).unwrap();
    let form = FormBuilder::linear(space.clone())
        .cell_integral(linear_integrand(|p: &PointValues<f64>, v: &Shape<f64>| (1.0 + p.x[0] * p.x[1]) * v.value))
        .build()
        .unwrap();
    let b = assembler.assemble_vector(&form, &[]).unwrap();

    let dof_coordinates = space.tabulate_dof_coordinates();
    let mut by_vertex = DVector::zeros(vertices.len());
    for (dof, x) in dof_coordinates.row_iter().enumerate() {
        let vertex = vertices
            .iter()
            .position(|v| (v[0] - x[0]).abs() < 1e-12 && (v[1] - x[1]).abs() < 1e-12)
            .unwrap();
        by_vertex[vertex] = b[dof];
    }
    by_vertex
}

proptest! {
    #[test]
    fn vector_assembly_is_independent_of_cell_order(
        permutation in Just((0..12).collect::<Vec<usize>>()).prop_shuffle(),
        parallel in any::<bool>(),
    ) {
        let assembler = if parallel { parallel_assembler() } else { Assembler::default() };
        let identity: Vec<usize> = (0..12).collect();
        let expected = load_vector_by_vertex(permuted_mesh(&identity), &Assembler::default());
        let b = load_vector_by_vertex(permuted_mesh(&permutation), &assembler);
        assert_matrix_eq!(b, expected, comp = abs, tol = 1e-14);
    }
}
