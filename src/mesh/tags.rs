//! Integer markers on mesh entities and geometric entity location.
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::topology::Topology;
use crate::Real;

/// Integer values attached to a subset of the entities of one dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshTags {
    dim: usize,
    /// Sorted and unique.
    indices: Vec<usize>,
    values: Vec<i32>,
}

impl MeshTags {
    /// Tags entities `indices[i]` of dimension `dim` with `values[i]`.
    ///
    /// Entries are sorted by entity index. Fails if the lengths differ, an index is out of
    /// range or an entity is tagged twice.
    pub fn new<T: Real>(mesh: &Mesh<T>, dim: usize, indices: Vec<usize>, values: Vec<i32>) -> Result<Self> {
        if dim > mesh.tdim() {
            return Err(Error::dimension_mismatch(format!(
                "Cannot tag entities of dimension {} in a mesh of dimension {}",
                dim,
                mesh.tdim()
            )));
        }
        if indices.len() != values.len() {
            return Err(Error::dimension_mismatch(format!(
                "Got {} entity indices but {} values",
                indices.len(),
                values.len()
            )));
        }
        let num_entities = mesh.topology().num_entities(dim);
        if let Some(&index) = indices.iter().find(|&&i| i >= num_entities) {
            return Err(Error::InvalidEntity {
                dim,
                index,
                num_entities,
            });
        }

        let mut entries: Vec<(usize, i32)> = indices.into_iter().zip(values).collect();
        entries.sort_unstable_by_key(|&(index, _)| index);
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(Error::InvalidMesh(format!("Entity {} is tagged more than once", pair[0].0)));
        }
        let (indices, values) = entries.into_iter().unzip();
        Ok(Self { dim, indices, values })
    }

    /// Tags all entities in `indices` with the same value.
    pub fn with_value<T: Real>(mesh: &Mesh<T>, dim: usize, indices: Vec<usize>, value: i32) -> Result<Self> {
        let values = vec![value; indices.len()];
        Self::new(mesh, dim, indices, values)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Entities tagged with `value`, in ascending order.
    pub fn find(&self, value: i32) -> Vec<usize> {
        self.indices
            .iter()
            .zip(&self.values)
            .filter(|(_, &v)| v == value)
            .map(|(&index, _)| index)
            .collect()
    }

    pub fn value(&self, entity: usize) -> Option<i32> {
        self.indices
            .binary_search(&entity)
            .ok()
            .map(|position| self.values[position])
    }
}

/// Entities of dimension `dim` whose vertices all satisfy `marker`, in ascending order.
pub fn locate_entities<T: Real>(mesh: &Mesh<T>, dim: usize, marker: impl Fn(&[T]) -> bool) -> Vec<usize> {
    let vertex_marked: Vec<bool> = (0..mesh.num_vertices())
        .map(|v| marker(mesh.vertex(v)))
        .collect();
    let topology = mesh.topology();
    (0..topology.num_entities(dim))
        .filter(|&e| {
            topology
                .entity_vertices(dim, e)
                .iter()
                .all(|&v| vertex_marked[v])
        })
        .collect()
}

/// Boundary entities of dimension `dim` whose vertices all satisfy `marker`, in ascending order.
///
/// The marker is only evaluated at boundary vertices.
pub fn locate_entities_boundary<T: Real>(mesh: &Mesh<T>, dim: usize, marker: impl Fn(&[T]) -> bool) -> Vec<usize> {
    let topology = mesh.topology();
    let mut vertex_marked = vec![false; mesh.num_vertices()];
    for v in topology.boundary_entities(0) {
        vertex_marked[v] = marker(mesh.vertex(v));
    }
    topology
        .boundary_entities(dim)
        .into_iter()
        .filter(|&e| {
            topology
                .entity_vertices(dim, e)
                .iter()
                .all(|&v| vertex_marked[v])
        })
        .collect()
}

/// Facets on the boundary of the mesh, in ascending order.
pub fn exterior_facet_indices(topology: &Topology) -> Vec<usize> {
    topology.boundary_facets()
}
