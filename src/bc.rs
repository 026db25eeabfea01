//! Dirichlet boundary conditions.
use crate::error::{Error, Result};
use crate::mesh::tags::locate_entities_boundary;
use crate::space::FunctionSpace;
use crate::Real;
use itertools::izip;
use std::sync::Arc;

/// Prescribed values for a fixed set of DOFs of a function space.
///
/// The DOFs are sorted, unique and determined once at construction.
#[derive(Debug, Clone)]
pub struct DirichletBC<T: Real> {
    space: Arc<FunctionSpace<T>>,
    dofs: Vec<usize>,
    values: Vec<T>,
}

impl<T: Real> DirichletBC<T> {
    /// Constrains all components of the DOFs on boundary facets whose vertices all satisfy
    /// `predicate` to `value`.
    pub fn from_subdomain(space: Arc<FunctionSpace<T>>, predicate: impl Fn(&[T]) -> bool, value: T) -> Self {
        Self::from_subdomain_with(space, predicate, |_, _| value)
    }

    /// Like [`from_subdomain`](Self::from_subdomain), with the value of each constrained DOF
    /// given by `f(x, component)` at the coordinates `x` of its node.
    pub fn from_subdomain_with(
        space: Arc<FunctionSpace<T>>,
        predicate: impl Fn(&[T]) -> bool,
        f: impl Fn(&[T], usize) -> T,
    ) -> Self {
        let mesh = space.mesh();
        let facets = locate_entities_boundary(mesh, mesh.tdim() - 1, predicate);
        let nodes = facet_closure_nodes(&space, &facets);
        Self::from_nodes(space, nodes, f)
    }

    /// Constrains all components of the DOFs in the closure of the given facets to `value`.
    pub fn from_facets(space: Arc<FunctionSpace<T>>, facets: &[usize], value: T) -> Result<Self> {
        Self::from_facets_with(space, facets, |_, _| value)
    }

    pub fn from_facets_with(
        space: Arc<FunctionSpace<T>>,
        facets: &[usize],
        f: impl Fn(&[T], usize) -> T,
    ) -> Result<Self> {
        let topology = space.mesh().topology();
        let num_facets = topology.num_facets();
        // Facets must exist and belong to a cell; unused vertices are facets of 1D meshes
        let detached = |facet: usize| facet >= num_facets || topology.facet_cells(facet).is_empty();
        if let Some(&index) = facets.iter().find(|&&facet| detached(facet)) {
            return Err(Error::InvalidEntity {
                dim: topology.dim() - 1,
                index,
                num_entities: num_facets,
            });
        }
        let nodes = facet_closure_nodes(&space, facets);
        Ok(Self::from_nodes(space, nodes, f))
    }

    /// Constrains explicitly given DOFs. For repeated DOFs the first value is used.
    pub fn from_dofs(space: Arc<FunctionSpace<T>>, dofs: Vec<usize>, values: Vec<T>) -> Result<Self> {
        if dofs.len() != values.len() {
            return Err(Error::dimension_mismatch(format!(
                "Got {} boundary DOFs but {} values",
                dofs.len(),
                values.len()
            )));
        }
        let num_dofs = space.num_dofs();
        if let Some(&dof) = dofs.iter().find(|&&dof| dof >= num_dofs) {
            return Err(Error::InvalidDof { dof, num_dofs });
        }

        let mut pairs: Vec<(usize, T)> = dofs.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(dof, _)| dof);
        pairs.dedup_by_key(|&mut (dof, _)| dof);
        let (dofs, values) = pairs.into_iter().unzip();
        Ok(Self { space, dofs, values })
    }

    fn from_nodes(space: Arc<FunctionSpace<T>>, nodes: Vec<usize>, f: impl Fn(&[T], usize) -> T) -> Self {
        let bs = space.block_size();
        let coordinates = space.tabulate_dof_coordinates();
        let mut dofs = Vec::with_capacity(bs * nodes.len());
        let mut values = Vec::with_capacity(bs * nodes.len());
        let mut x = Vec::with_capacity(coordinates.ncols());
        for node in nodes {
            x.clear();
            x.extend(coordinates.row(node).iter().copied());
            for c in 0..bs {
                dofs.push(bs * node + c);
                values.push(f(&x, c));
            }
        }
        Self { space, dofs, values }
    }

    pub fn space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn num_dofs(&self) -> usize {
        self.dofs.len()
    }

    /// Overwrites the constrained entries of `x` with the prescribed values.
    pub fn apply_to(&self, x: &mut [T]) -> Result<()> {
        if x.len() != self.space.num_dofs() {
            return Err(Error::dimension_mismatch(format!(
                "Vector has length {}, but the space has {} DOFs",
                x.len(),
                self.space.num_dofs()
            )));
        }
        for (&dof, &value) in izip!(&self.dofs, &self.values) {
            x[dof] = value;
        }
        Ok(())
    }
}

/// Sorted unique nodes in the closure of the given facets.
fn facet_closure_nodes<T: Real>(space: &FunctionSpace<T>, facets: &[usize]) -> Vec<usize> {
    let topology = space.mesh().topology();
    let facet_dim = topology.dim() - 1;
    let mut nodes = Vec::new();
    for &facet in facets {
        let cell = topology.facet_cells(facet)[0];
        let local_facet = topology
            .local_facet_index(cell, facet)
            .expect("Facet must be contained in its attached cell");
        let cell_nodes = space.dofmap().cell_nodes(cell);
        nodes.extend(
            space
                .element()
                .entity_closure_dofs(facet_dim, local_facet)
                .into_iter()
                .map(|local| cell_nodes[local]),
        );
    }
    nodes.sort_unstable();
    nodes.dedup();
    nodes
}
