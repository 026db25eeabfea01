//! Function spaces: a mesh, a finite element and the DOF map connecting them.
use crate::element::{ElementDescription, FiniteElement};
use crate::error::{Error, Result};
use crate::geometry::CoordinateMap;
use crate::mesh::Mesh;
use crate::Real;
use log::debug;
use nalgebra::DMatrix;
use std::sync::Arc;

mod dofmap;

pub use dofmap::DofMap;

#[derive(Debug)]
pub struct FunctionSpace<T: Real> {
    mesh: Arc<Mesh<T>>,
    description: ElementDescription,
    element: FiniteElement<T>,
    dofmap: DofMap,
}

impl<T: Real> FunctionSpace<T> {
    /// Builds the space of the described element on the mesh.
    ///
    /// Fails with [`Error::UnsupportedElement`] if the element is not supported or its cell
    /// type differs from the mesh cell type.
    pub fn build(mesh: Arc<Mesh<T>>, description: ElementDescription) -> Result<Arc<Self>> {
        if description.cell_type != mesh.cell_type() {
            return Err(Error::unsupported(
                description,
                format!("mesh consists of {} cells", mesh.cell_type()),
            ));
        }
        let element = FiniteElement::new(description)?;
        let dofmap = DofMap::build(mesh.topology(), &element, description.block_size);
        debug!(
            "Built function space {} with {} DOFs on {} cells",
            description,
            dofmap.num_dofs(),
            mesh.num_cells()
        );
        Ok(Arc::new(Self {
            mesh,
            description,
            element,
            dofmap,
        }))
    }

    pub fn mesh(&self) -> &Arc<Mesh<T>> {
        &self.mesh
    }

    pub fn description(&self) -> &ElementDescription {
        &self.description
    }

    /// The scalar element of every block component.
    pub fn element(&self) -> &FiniteElement<T> {
        &self.element
    }

    pub fn dofmap(&self) -> &DofMap {
        &self.dofmap
    }

    pub fn block_size(&self) -> usize {
        self.dofmap.block_size()
    }

    pub fn num_dofs(&self) -> usize {
        self.dofmap.num_dofs()
    }

    /// Whether both spaces are defined on the same mesh instance.
    pub fn shares_mesh_with(&self, other: &FunctionSpace<T>) -> bool {
        Arc::ptr_eq(&self.mesh, &other.mesh)
    }

    /// Physical coordinates of all nodes (`num_nodes x gdim`).
    pub fn tabulate_dof_coordinates(&self) -> DMatrix<T> {
        let mesh = &self.mesh;
        let mut coordinates = DMatrix::zeros(self.dofmap.num_nodes(), mesh.gdim());
        let coordinate_map =
            CoordinateMap::new(mesh.cell_type()).expect("Linear coordinate element exists for every mesh cell type");
        let reference_points: Vec<Vec<T>> = self
            .element
            .reference_points()
            .map(|p| p.iter().map(|&x| T::from_f64_const(x)).collect())
            .collect();

        let mut cell_coordinates = DMatrix::zeros(0, 0);
        for cell in 0..mesh.num_cells() {
            mesh.populate_cell_coordinates(cell, &mut cell_coordinates);
            for (xi, &node) in reference_points.iter().zip(self.dofmap.cell_nodes(cell)) {
                let x = coordinate_map.push_forward(&cell_coordinates, xi);
                for (d, x_d) in x.into_iter().enumerate() {
                    coordinates[(node, d)] = x_d;
                }
            }
        }
        coordinates
    }
}
