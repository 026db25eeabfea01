//! Meshes: vertex coordinates together with a [`Topology`].
use crate::adjacency::AdjacencyList;
use crate::cell::CellType;
use crate::error::{Error, Result};
use crate::topology::Topology;
use crate::Real;
use nalgebra::DMatrix;

pub mod procedural;
pub mod tags;

pub use tags::MeshTags;

/// A conforming mesh of a single cell type.
///
/// The geometry is described by the vertices alone (affine simplices, multilinear
/// quadrilaterals and hexahedra). Vertices may live in a space of higher dimension than the
/// cells (`gdim >= tdim`), for example a triangulated surface in 3D.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh<T: Real> {
    gdim: usize,
    /// Row-major `num_vertices x gdim`.
    coordinates: Vec<T>,
    topology: Topology,
}

impl<T: Real> Mesh<T> {
    /// Creates a mesh from row-major vertex coordinates and flat cell connectivity.
    ///
    /// Cell vertices follow the reference cell ordering of [`CellType::reference_vertices`].
    pub fn new(cell_type: CellType, gdim: usize, coordinates: Vec<T>, cells: Vec<usize>) -> Result<Self> {
        let tdim = cell_type.dim();
        if tdim == 0 {
            return Err(Error::InvalidMesh("Meshes of points are not supported".to_string()));
        }
        if gdim < tdim || gdim > 3 {
            return Err(Error::InvalidMesh(format!(
                "Geometric dimension {} is incompatible with {} cells",
                gdim, cell_type
            )));
        }
        if coordinates.len() % gdim != 0 {
            return Err(Error::InvalidMesh(format!(
                "Number of coordinates ({}) is not a multiple of the geometric dimension ({})",
                coordinates.len(),
                gdim
            )));
        }
        if let Some(index) = coordinates.iter().position(|x| !x.is_finite()) {
            return Err(Error::InvalidMesh(format!(
                "Vertex {} has non-finite coordinates",
                index / gdim
            )));
        }
        let nv = cell_type.num_vertices();
        if cells.len() % nv != 0 {
            return Err(Error::InvalidMesh(format!(
                "Cell connectivity of length {} does not describe whole {} cells",
                cells.len(),
                cell_type
            )));
        }

        let num_vertices = coordinates.len() / gdim;
        let topology = Topology::new(cell_type, num_vertices, AdjacencyList::from_uniform(cells, nv))?;
        Ok(Self {
            gdim,
            coordinates,
            topology,
        })
    }

    pub fn cell_type(&self) -> CellType {
        self.topology.cell_type()
    }

    /// Geometric dimension.
    pub fn gdim(&self) -> usize {
        self.gdim
    }

    /// Topological dimension.
    pub fn tdim(&self) -> usize {
        self.topology.dim()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn num_vertices(&self) -> usize {
        self.coordinates.len() / self.gdim
    }

    pub fn num_cells(&self) -> usize {
        self.topology.num_cells()
    }

    pub fn vertex(&self, index: usize) -> &[T] {
        &self.coordinates[self.gdim * index..self.gdim * (index + 1)]
    }

    /// Row-major vertex coordinates.
    pub fn coordinates(&self) -> &[T] {
        &self.coordinates
    }

    pub fn cell_vertices(&self, cell: usize) -> &[usize] {
        self.topology.cell_vertices(cell)
    }

    /// Gathers the vertex coordinates of a cell into the rows of `output` (resized to
    /// `num_cell_vertices x gdim`).
    pub fn populate_cell_coordinates(&self, cell: usize, output: &mut DMatrix<T>) {
        let vertices = self.cell_vertices(cell);
        output.resize_mut(vertices.len(), self.gdim, T::zero());
        for (i, &v) in vertices.iter().enumerate() {
            for (d, &x) in self.vertex(v).iter().enumerate() {
                output[(i, d)] = x;
            }
        }
    }

    pub fn cell_coordinates(&self, cell: usize) -> DMatrix<T> {
        let mut coordinates = DMatrix::zeros(0, 0);
        self.populate_cell_coordinates(cell, &mut coordinates);
        coordinates
    }

    /// Applies a transformation to every vertex. The topology is unchanged.
    pub fn transform_vertices(&mut self, mut transformation: impl FnMut(&mut [T])) {
        for vertex in self.coordinates.chunks_exact_mut(self.gdim) {
            transformation(vertex)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Mesh;
    use crate::cell::CellType;

    #[test]
    fn mesh_construction_validates_input() {
        let coordinates = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        assert!(Mesh::new(CellType::Triangle, 2, coordinates.clone(), vec![0, 1, 2]).is_ok());
        assert!(Mesh::new(CellType::Triangle, 1, coordinates.clone(), vec![0, 1, 2]).is_err());
        assert!(Mesh::new(CellType::Triangle, 2, coordinates.clone(), vec![0, 1]).is_err());
        assert!(Mesh::new(CellType::Triangle, 2, vec![0.0, 0.0, 1.0], vec![0, 1, 2]).is_err());
        assert!(Mesh::new(CellType::Triangle, 2, vec![0.0, 0.0, 1.0, 0.0, f64::NAN, 1.0], vec![0, 1, 2]).is_err());
    }

    #[test]
    fn manifold_meshes_are_allowed() {
        let coordinates = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0];
        let mesh = Mesh::new(CellType::Triangle, 3, coordinates, vec![0, 1, 2]).unwrap();
        assert_eq!(mesh.gdim(), 3);
        assert_eq!(mesh.tdim(), 2);
        assert_eq!(mesh.vertex(2), &[0.0, 1.0, 1.0]);
    }
}
