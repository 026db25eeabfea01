use crate::assembly::buffers::{EntityValues, IntegralType};
use crate::bc::DirichletBC;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::form::{Form, Integral};
use crate::function::Function;
use crate::space::FunctionSpace;
use crate::topology::Topology;
use crate::Real;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use std::cell::RefCell;
use std::sync::Arc;
use thread_local::ThreadLocal;

/// Assembles forms into scalars, dense vectors and CSR matrices.
///
/// Local tensors are computed serially or, if the context enables parallel assembly, in
/// parallel batches with one workspace per thread. Either way, local tensors are added to
/// the global storage in entity order, so assembly is deterministic and serial and parallel
/// assembly produce identical results.
#[derive(Debug)]
pub struct Assembler<T: Real> {
    context: Context,
    workspace: ThreadLocal<RefCell<AssemblyWorkspace<T>>>,
}

impl<T: Real> Default for Assembler<T> {
    fn default() -> Self {
        Self::new(Context::default())
    }
}

#[derive(Debug)]
struct AssemblyWorkspace<T: Real> {
    entity_values: EntityValues<T>,
    cell_coordinates: DMatrix<T>,
    block_sizes: Vec<usize>,
    local_tensor: DMatrix<T>,
}

impl<T: Real> Default for AssemblyWorkspace<T> {
    fn default() -> Self {
        Self {
            entity_values: EntityValues::default(),
            cell_coordinates: DMatrix::zeros(0, 0),
            block_sizes: Vec::new(),
            local_tensor: DMatrix::zeros(0, 0),
        }
    }
}

impl<T: Real> Assembler<T> {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            workspace: ThreadLocal::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn assemble_scalar(&self, form: &Form<T>, coefficients: &[&Function<T>]) -> Result<T> {
        let _timer = self.context.timer("Assemble scalar");
        check_rank(form, 0)?;
        check_coefficients(form, coefficients)?;
        let mut value = T::zero();
        self.visit_local_tensors(form, coefficients, &|_| false, |_, tensor| {
            value += tensor[(0, 0)];
        })?;
        Ok(value)
    }

    pub fn assemble_vector(&self, form: &Form<T>, coefficients: &[&Function<T>]) -> Result<DVector<T>> {
        let test_space = linear_space(form)?;
        let mut b = DVector::zeros(test_space.num_dofs());
        self.assemble_vector_into(&mut b, form, coefficients)?;
        Ok(b)
    }

    /// Adds the assembled vector to `b`.
    pub fn assemble_vector_into(&self, b: &mut DVector<T>, form: &Form<T>, coefficients: &[&Function<T>]) -> Result<()> {
        let _timer = self.context.timer("Assemble vector");
        let test_space = linear_space(form)?;
        check_coefficients(form, coefficients)?;
        check_length("Vector", b.len(), test_space.num_dofs())?;

        let dofmap = test_space.dofmap();
        let mut dofs = Vec::new();
        self.visit_local_tensors(form, coefficients, &|_| false, |cell, tensor| {
            dofmap.populate_cell_dofs(cell, &mut dofs);
            for (i, &dof) in dofs.iter().enumerate() {
                b[dof] += tensor[(i, 0)];
            }
        })?;
        debug!("Assembled vector of length {}", b.len());
        Ok(())
    }

    /// Assembles a bilinear form into a new CSR matrix.
    ///
    /// Rows of DOFs constrained by a boundary condition on the test space and columns of DOFs
    /// constrained on the trial space are zero. Where both apply, the diagonal entry is one.
    pub fn assemble_matrix(
        &self,
        form: &Form<T>,
        coefficients: &[&Function<T>],
        bcs: &[DirichletBC<T>],
    ) -> Result<CsrMatrix<T>> {
        let pattern = self.sparsity_pattern(form)?;
        let values = vec![T::zero(); pattern.nnz()];
        let mut matrix =
            CsrMatrix::try_from_pattern_and_values(pattern, values).expect("Values must match the pattern");
        self.assemble_matrix_into(&mut matrix, form, coefficients, bcs)?;
        Ok(matrix)
    }

    /// Assembles a bilinear form into an existing matrix, overwriting its values.
    ///
    /// The sparsity pattern of the matrix must contain the pattern of the form.
    pub fn assemble_matrix_into(
        &self,
        matrix: &mut CsrMatrix<T>,
        form: &Form<T>,
        coefficients: &[&Function<T>],
        bcs: &[DirichletBC<T>],
    ) -> Result<()> {
        let _timer = self.context.timer("Assemble matrix");
        let (test_space, trial_space) = bilinear_spaces(form)?;
        check_coefficients(form, coefficients)?;
        if matrix.nrows() != test_space.num_dofs() || matrix.ncols() != trial_space.num_dofs() {
            return Err(Error::dimension_mismatch(format!(
                "Matrix is {}x{}, but form has {} test and {} trial DOFs",
                matrix.nrows(),
                matrix.ncols(),
                test_space.num_dofs(),
                trial_space.num_dofs()
            )));
        }
        let row_constrained = constrained_dofs(bcs, test_space)?;
        let column_constrained = constrained_dofs(bcs, trial_space)?;

        matrix.values_mut().fill(T::zero());
        let mut row_dofs = Vec::new();
        let mut column_dofs = Vec::new();
        let mut permutation = Vec::new();
        let mut missing_entry = false;
        self.visit_local_tensors(form, coefficients, &|_| false, |cell, tensor| {
            test_space.dofmap().populate_cell_dofs(cell, &mut row_dofs);
            trial_space.dofmap().populate_cell_dofs(cell, &mut column_dofs);
            permutation.clear();
            permutation.extend(0..column_dofs.len());
            permutation.sort_unstable_by_key(|&j| column_dofs[j]);

            for (i, &row) in row_dofs.iter().enumerate() {
                if row_constrained[row] {
                    continue;
                }
                let mut csr_row = matrix.row_mut(row);
                let (columns, values) = csr_row.cols_and_values_mut();
                let local_row = tensor.row(i);
                let found = add_local_row_to_csr_row(columns, values, &column_dofs, &permutation, &column_constrained, |j| {
                    local_row[j]
                });
                missing_entry |= !found;
            }
        })?;
        if missing_entry {
            return Err(Error::dimension_mismatch(
                "Matrix sparsity pattern does not contain all entries of the form",
            ));
        }

        if Arc::ptr_eq(test_space, trial_space) {
            for dof in (0..matrix.nrows()).filter(|&d| row_constrained[d] && column_constrained[d]) {
                set_diagonal(matrix, dof, T::one())?;
            }
        }
        debug!(
            "Assembled {}x{} matrix with {} non-zeros",
            matrix.nrows(),
            matrix.ncols(),
            matrix.nnz()
        );
        Ok(())
    }

    /// The sparsity pattern of a bilinear form, coupling all test and trial DOFs that share
    /// a cell.
    pub fn sparsity_pattern(&self, form: &Form<T>) -> Result<SparsityPattern> {
        let _timer = self.context.timer("Build sparsity pattern");
        let (test_space, trial_space) = bilinear_spaces(form)?;
        let test_dofmap = test_space.dofmap();
        let trial_dofmap = trial_space.dofmap();

        let num_entries = (0..test_dofmap.num_cells())
            .map(|cell| test_dofmap.cell_dimension(cell) * trial_dofmap.cell_dimension(cell))
            .sum();
        let mut coordinates = Vec::with_capacity(num_entries);
        let mut row_dofs = Vec::new();
        let mut column_dofs = Vec::new();
        for cell in 0..test_dofmap.num_cells() {
            test_dofmap.populate_cell_dofs(cell, &mut row_dofs);
            trial_dofmap.populate_cell_dofs(cell, &mut column_dofs);
            for &i in &row_dofs {
                for &j in &column_dofs {
                    coordinates.push((i, j));
                }
            }
        }

        self.context.install(|| coordinates.par_sort_unstable());
        coordinates.dedup();

        let num_rows = test_space.num_dofs();
        let mut offsets = Vec::with_capacity(num_rows + 1);
        let mut column_indices = Vec::with_capacity(coordinates.len());
        offsets.push(0);
        for (i, j) in coordinates {
            while offsets.len() <= i {
                // Also handles consecutive empty rows
                offsets.push(column_indices.len());
            }
            column_indices.push(j);
        }
        while offsets.len() < num_rows + 1 {
            offsets.push(column_indices.len());
        }

        Ok(
            SparsityPattern::try_from_offsets_and_indices(num_rows, trial_space.num_dofs(), offsets, column_indices)
                .expect("Sorted unique coordinates give a valid pattern"),
        )
    }

    /// Assembles a linear system with boundary conditions eliminated symmetrically: the
    /// matrix has identity rows and columns for constrained DOFs, the right-hand side is
    /// lifted and holds the prescribed values at constrained DOFs.
    pub fn assemble_system(
        &self,
        a: &Form<T>,
        a_coefficients: &[&Function<T>],
        l: &Form<T>,
        l_coefficients: &[&Function<T>],
        bcs: &[DirichletBC<T>],
    ) -> Result<(CsrMatrix<T>, DVector<T>)> {
        let matrix = self.assemble_matrix(a, a_coefficients, bcs)?;
        let mut rhs = self.assemble_vector(l, l_coefficients)?;
        self.apply_lifting(&mut rhs, a, a_coefficients, bcs, None, T::one())?;
        let test_space = linear_space(l)?;
        let test_bcs: Vec<&DirichletBC<T>> = bcs
            .iter()
            .filter(|bc| Arc::ptr_eq(bc.space(), test_space))
            .collect();
        set_bc(&mut rhs, test_bcs, None, T::one())?;
        Ok((matrix, rhs))
    }

    /// Modifies `b` to account for boundary conditions on the trial space of `a`:
    /// `b_i -= scale * sum_j A_ij (g_j - x0_j)` for constrained DOFs `j` and all rows `i` not
    /// constrained on the test space.
    ///
    /// The contributions are computed cell by cell from the local matrices of `a`, so only
    /// cells containing constrained DOFs are visited. Without `x0`, zero is used.
    pub fn apply_lifting(
        &self,
        b: &mut DVector<T>,
        a: &Form<T>,
        coefficients: &[&Function<T>],
        bcs: &[DirichletBC<T>],
        x0: Option<&DVector<T>>,
        scale: T,
    ) -> Result<()> {
        let _timer = self.context.timer("Apply lifting");
        let (test_space, trial_space) = bilinear_spaces(a)?;
        check_coefficients(a, coefficients)?;
        check_length("Vector", b.len(), test_space.num_dofs())?;
        if let Some(x0) = x0 {
            check_length("Lifting guess", x0.len(), trial_space.num_dofs())?;
        }

        let column_constrained = constrained_dofs(bcs, trial_space)?;
        if !column_constrained.iter().any(|&c| c) {
            return Ok(());
        }
        let row_constrained = constrained_dofs(bcs, test_space)?;
        let mut differences = vec![T::zero(); trial_space.num_dofs()];
        for bc in bcs.iter().filter(|bc| Arc::ptr_eq(bc.space(), trial_space)) {
            for (&dof, &g) in bc.dofs().iter().zip(bc.values()) {
                differences[dof] = g - x0.map(|x0| x0[dof]).unwrap_or_else(T::zero);
            }
        }

        let trial_dofmap = trial_space.dofmap();
        let touches_bc = |cell: usize| {
            let bs = trial_dofmap.block_size();
            trial_dofmap
                .cell_nodes(cell)
                .iter()
                .any(|&node| (0..bs).any(|c| column_constrained[bs * node + c]))
        };
        let skip_cell = |cell: usize| !touches_bc(cell);

        let mut row_dofs = Vec::new();
        let mut column_dofs = Vec::new();
        self.visit_local_tensors(a, coefficients, &skip_cell, |cell, tensor| {
            test_space.dofmap().populate_cell_dofs(cell, &mut row_dofs);
            trial_dofmap.populate_cell_dofs(cell, &mut column_dofs);
            for (i, &row) in row_dofs.iter().enumerate() {
                if row_constrained[row] {
                    continue;
                }
                let mut correction = T::zero();
                for (j, &column) in column_dofs.iter().enumerate() {
                    if column_constrained[column] {
                        correction += tensor[(i, j)] * differences[column];
                    }
                }
                b[row] -= scale * correction;
            }
        })
    }

    /// Computes the local tensors of all integration entities of all integrals and passes
    /// them to `sink` in integral and entity order, together with the cell they belong to.
    fn visit_local_tensors(
        &self,
        form: &Form<T>,
        coefficients: &[&Function<T>],
        skip_cell: &(dyn Fn(usize) -> bool + Sync),
        mut sink: impl FnMut(usize, &DMatrix<T>),
    ) -> Result<()> {
        let topology = form.mesh().topology();
        for integral in form.integrals() {
            let entities = integral.entities();
            if self.context.parallel_assembly() {
                for chunk in entities.chunks(self.context.chunk_size()) {
                    let tensors = self.context.install(|| {
                        chunk
                            .par_iter()
                            .map(|&entity| {
                                let (cell, local_facet) = integration_cell(topology, integral.integral_type(), entity);
                                if skip_cell(cell) {
                                    return Ok(None);
                                }
                                // A kernel running rayon work can re-enter on this thread
                                let mut borrowed = self.workspace.get_or_default().try_borrow_mut().ok();
                                let mut fresh = None;
                                let ws = match borrowed.as_deref_mut() {
                                    Some(ws) => ws,
                                    None => fresh.insert(AssemblyWorkspace::default()),
                                };
                                compute_local_tensor(ws, form, integral, entity, cell, local_facet, coefficients)?;
                                Ok(Some((cell, ws.local_tensor.clone())))
                            })
                            .collect::<Result<Vec<_>>>()
                    })?;
                    for (cell, tensor) in tensors.iter().flatten() {
                        sink(*cell, tensor);
                    }
                }
            } else {
                let mut borrowed = self.workspace.get_or_default().try_borrow_mut().ok();
                let mut fresh = None;
                let ws = match borrowed.as_deref_mut() {
                    Some(ws) => ws,
                    None => fresh.insert(AssemblyWorkspace::default()),
                };
                for &entity in entities {
                    let (cell, local_facet) = integration_cell(topology, integral.integral_type(), entity);
                    if skip_cell(cell) {
                        continue;
                    }
                    compute_local_tensor(ws, form, integral, entity, cell, local_facet, coefficients)?;
                    sink(cell, &ws.local_tensor);
                }
            }
        }
        Ok(())
    }
}

/// The cell an entity is integrated on and, for facets, the local index of the facet in it.
fn integration_cell(topology: &Topology, integral_type: IntegralType, entity: usize) -> (usize, Option<usize>) {
    match integral_type {
        IntegralType::Cell => (entity, None),
        IntegralType::ExteriorFacet => {
            let cell = topology.facet_cells(entity)[0];
            let local_facet = topology
                .local_facet_index(cell, entity)
                .expect("Facet must be contained in its attached cell");
            (cell, Some(local_facet))
        }
    }
}

fn compute_local_tensor<T: Real>(
    ws: &mut AssemblyWorkspace<T>,
    form: &Form<T>,
    integral: &Integral<T>,
    entity: usize,
    cell: usize,
    local_facet: Option<usize>,
    coefficients: &[&Function<T>],
) -> Result<()> {
    let values = &mut ws.entity_values;
    values.begin(integral.integral_type(), entity, cell, local_facet, coefficients.len());
    for (i, function) in coefficients.iter().enumerate() {
        let space = function.space();
        let bs = space.block_size();
        let local_dofs = values.coefficient_mut(i).local_dofs_mut();
        local_dofs.clear();
        for &node in space.dofmap().cell_nodes(cell) {
            local_dofs.extend((0..bs).map(|c| function.values()[bs * node + c]));
        }
    }

    form.mesh().populate_cell_coordinates(cell, &mut ws.cell_coordinates);
    ws.block_sizes.clear();
    ws.block_sizes.extend(form.spaces().map(|space| space.block_size()));
    values
        .populate(integral.point_set(local_facet), &ws.cell_coordinates, &ws.block_sizes)
        .map_err(Error::Kernel)?;

    let num_rows = form.test_space().map_or(1, |space| space.dofmap().cell_dimension(cell));
    let num_columns = form.trial_space().map_or(1, |space| space.dofmap().cell_dimension(cell));
    ws.local_tensor.resize_mut(num_rows, num_columns, T::zero());
    ws.local_tensor.fill(T::zero());
    integral
        .kernel()
        .tabulate(values, (&mut ws.local_tensor).into())
        .map_err(Error::Kernel)
}

/// Add a row of a local matrix to the provided row of a CSR matrix.
///
/// `column_dofs`: The global column of each local column.
/// `sorted_permutation`: The local columns, ordered such that the corresponding global columns
///    are sorted.
/// `skip_column`: Global columns that receive no contributions.
///
/// Returns `false` if the CSR row lacks one of the required columns.
fn add_local_row_to_csr_row<T: Real>(
    row_columns: &[usize],
    row_values: &mut [T],
    column_dofs: &[usize],
    sorted_permutation: &[usize],
    skip_column: &[bool],
    local_row: impl Fn(usize) -> T,
) -> bool {
    assert_eq!(column_dofs.len(), sorted_permutation.len());
    let mut csr_col_idx_iter = row_columns.iter().copied().enumerate();

    for &local_column in sorted_permutation {
        let global_column = column_dofs[local_column];
        if skip_column[global_column] {
            continue;
        }
        match csr_col_idx_iter.find(|&(_, csr_column)| csr_column == global_column) {
            Some((idx, _)) => row_values[idx] += local_row(local_column),
            None => return false,
        }
    }
    true
}

fn set_diagonal<T: Real>(matrix: &mut CsrMatrix<T>, dof: usize, value: T) -> Result<()> {
    let mut row = matrix.row_mut(dof);
    let (columns, values) = row.cols_and_values_mut();
    match columns.binary_search(&dof) {
        Ok(idx) => {
            values[idx] = value;
            Ok(())
        }
        Err(_) => Err(Error::dimension_mismatch(format!(
            "Matrix sparsity pattern lacks the diagonal entry of constrained DOF {}",
            dof
        ))),
    }
}

/// Marks the DOFs constrained by boundary conditions on the given space.
fn constrained_dofs<T: Real>(bcs: &[DirichletBC<T>], space: &Arc<FunctionSpace<T>>) -> Result<Vec<bool>> {
    let num_dofs = space.num_dofs();
    let mut constrained = vec![false; num_dofs];
    for bc in bcs.iter().filter(|bc| Arc::ptr_eq(bc.space(), space)) {
        for &dof in bc.dofs() {
            *constrained
                .get_mut(dof)
                .ok_or(Error::InvalidDof { dof, num_dofs })? = true;
        }
    }
    Ok(constrained)
}

fn check_rank<T: Real>(form: &Form<T>, rank: usize) -> Result<()> {
    if form.rank() != rank {
        return Err(Error::dimension_mismatch(format!(
            "Expected a form of rank {}, but got rank {}",
            rank,
            form.rank()
        )));
    }
    Ok(())
}

fn linear_space<T: Real>(form: &Form<T>) -> Result<&Arc<FunctionSpace<T>>> {
    check_rank(form, 1)?;
    Ok(form.test_space().expect("Linear forms have a test space"))
}

fn bilinear_spaces<T: Real>(form: &Form<T>) -> Result<(&Arc<FunctionSpace<T>>, &Arc<FunctionSpace<T>>)> {
    check_rank(form, 2)?;
    let test_space = form.test_space().expect("Bilinear forms have a test space");
    let trial_space = form.trial_space().expect("Bilinear forms have a trial space");
    Ok((test_space, trial_space))
}

/// Coefficients must match the coefficient slots of the form in number, mesh and element.
fn check_coefficients<T: Real>(form: &Form<T>, coefficients: &[&Function<T>]) -> Result<()> {
    if coefficients.len() != form.num_coefficients() {
        return Err(Error::dimension_mismatch(format!(
            "Form has {} coefficients, but {} were provided",
            form.num_coefficients(),
            coefficients.len()
        )));
    }
    for (i, (function, expected)) in coefficients.iter().zip(form.coefficient_spaces()).enumerate() {
        let space = function.space();
        let compatible = Arc::ptr_eq(space, expected)
            || (Arc::ptr_eq(space.mesh(), expected.mesh()) && space.description() == expected.description());
        if !compatible {
            return Err(Error::dimension_mismatch(format!(
                "Coefficient {} does not live in the function space of its slot",
                i
            )));
        }
    }
    Ok(())
}

fn check_length(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(Error::dimension_mismatch(format!(
            "{} has length {}, expected {}",
            what, actual, expected
        )));
    }
    Ok(())
}

/// Sets `b[d] = scale * (g_d - x0_d)` for every DOF `d` constrained to `g_d` by one of the
/// boundary conditions. Without `x0`, zero is used.
pub fn set_bc<'a, T, I>(b: &mut DVector<T>, bcs: I, x0: Option<&DVector<T>>, scale: T) -> Result<()>
where
    T: Real,
    I: IntoIterator<Item = &'a DirichletBC<T>>,
{
    if let Some(x0) = x0 {
        check_length("Boundary value guess", x0.len(), b.len())?;
    }
    let num_dofs = b.len();
    for bc in bcs {
        for (&dof, &g) in bc.dofs().iter().zip(bc.values()) {
            if dof >= num_dofs {
                return Err(Error::InvalidDof { dof, num_dofs });
            }
            let x0_d = x0.map(|x0| x0[dof]).unwrap_or_else(T::zero);
            b[dof] = scale * (g - x0_d);
        }
    }
    Ok(())
}

/// Applies boundary conditions to an assembled square system.
///
/// First lifts the right-hand side, `rhs_i -= scale * A_ij (g_j - x0_j)` for constrained `j`
/// and unconstrained `i`, then replaces the rows and columns of constrained DOFs with those
/// of the identity and sets `rhs_d = scale * (g_d - x0_d)`. The diagonal entries of
/// constrained DOFs must be part of the sparsity pattern.
pub fn apply_lifting_and_bcs<T: Real>(
    matrix: &mut CsrMatrix<T>,
    rhs: &mut DVector<T>,
    bcs: &[DirichletBC<T>],
    x0: Option<&DVector<T>>,
    scale: T,
) -> Result<()> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(Error::dimension_mismatch(format!(
            "Boundary conditions require a square matrix, got {}x{}",
            n,
            matrix.ncols()
        )));
    }
    check_length("Right-hand side", rhs.len(), n)?;
    if let Some(x0) = x0 {
        check_length("Boundary value guess", x0.len(), n)?;
    }

    let mut constrained = vec![false; n];
    let mut differences = vec![T::zero(); n];
    for bc in bcs {
        for (&dof, &g) in bc.dofs().iter().zip(bc.values()) {
            if dof >= n {
                return Err(Error::InvalidDof { dof, num_dofs: n });
            }
            constrained[dof] = true;
            differences[dof] = g - x0.map(|x0| x0[dof]).unwrap_or_else(T::zero);
        }
    }

    for i in 0..n {
        let mut row = matrix.row_mut(i);
        let (columns, values) = row.cols_and_values_mut();
        let mut has_diagonal = false;
        for (&j, a_ij) in columns.iter().zip(values.iter_mut()) {
            if !constrained[i] && constrained[j] {
                rhs[i] -= scale * *a_ij * differences[j];
            }
            if constrained[i] || constrained[j] {
                *a_ij = if i == j { T::one() } else { T::zero() };
            }
            has_diagonal |= i == j;
        }
        if constrained[i] && !has_diagonal {
            return Err(Error::dimension_mismatch(format!(
                "Matrix sparsity pattern lacks the diagonal entry of constrained DOF {}",
                i
            )));
        }
    }
    for i in (0..n).filter(|&i| constrained[i]) {
        rhs[i] = scale * differences[i];
    }
    Ok(())
}
