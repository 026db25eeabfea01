//! Mesh topology: numbering of sub-entities and the connectivity between entities.
//!
//! All entities are created eagerly when the topology is built. Entities of dimension
//! `0 < d < tdim` are numbered in order of first encounter while visiting cells in ascending
//! order and, within each cell, local entities in reference order. Vertices keep the input
//! numbering and cells keep their input order.
use crate::adjacency::AdjacencyList;
use crate::cell::CellType;
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    cell_type: CellType,
    /// `(d, 0)` connectivity for every `d` in `0..=tdim`.
    entity_vertices: Vec<AdjacencyList>,
    /// `(tdim, d)` connectivity for every `d` in `0..=tdim`.
    cell_entities: Vec<AdjacencyList>,
    /// `(tdim - 1, tdim)` connectivity.
    facet_cells: AdjacencyList,
    /// `(0, tdim)` connectivity.
    vertex_cells: AdjacencyList,
}

impl Topology {
    /// Builds the topology of a mesh with the given cells.
    ///
    /// Fails if a cell has the wrong number of vertices, references a vertex that does not
    /// exist, or contains the same vertex twice.
    pub fn new(cell_type: CellType, num_vertices: usize, cells: AdjacencyList) -> Result<Self> {
        let tdim = cell_type.dim();
        if tdim == 0 {
            return Err(Error::InvalidMesh("Meshes of points are not supported".to_string()));
        }

        for (cell_index, cell) in cells.iter().enumerate() {
            if cell.len() != cell_type.num_vertices() {
                return Err(Error::InvalidMesh(format!(
                    "Cell {} has {} vertices, but a {} has {}",
                    cell_index,
                    cell.len(),
                    cell_type,
                    cell_type.num_vertices()
                )));
            }
            if let Some(&v) = cell.iter().find(|&&v| v >= num_vertices) {
                return Err(Error::InvalidMesh(format!(
                    "Cell {} references vertex {}, but mesh has {} vertices",
                    cell_index, v, num_vertices
                )));
            }
            for (i, v) in cell.iter().enumerate() {
                if cell[i + 1..].contains(v) {
                    return Err(Error::InvalidMesh(format!(
                        "Cell {} contains vertex {} more than once",
                        cell_index, v
                    )));
                }
            }
        }

        let vertex_entities = AdjacencyList::from_uniform((0..num_vertices).collect(), 1);
        let mut entity_vertices = vec![vertex_entities];
        let mut cell_entities = vec![cells.clone()];

        for dim in 1..tdim {
            let (vertices, cell_to_entity) = create_entities(cell_type, &cells, dim);
            entity_vertices.push(vertices);
            cell_entities.push(cell_to_entity);
        }

        entity_vertices.push(cells.clone());
        let num_cells = cells.len();
        cell_entities.push(AdjacencyList::from_uniform((0..num_cells).collect(), 1));

        let num_facets = entity_vertices[tdim - 1].len();
        let facet_cells = cell_entities[tdim - 1].transpose(num_facets);
        let vertex_cells = cells.transpose(num_vertices);

        if let Some((facet, links)) = facet_cells
            .iter()
            .enumerate()
            .find(|(_, links)| links.len() > 2)
        {
            return Err(Error::InvalidMesh(format!(
                "Facet {} is shared by {} cells",
                facet,
                links.len()
            )));
        }

        Ok(Self {
            cell_type,
            entity_vertices,
            cell_entities,
            facet_cells,
            vertex_cells,
        })
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn dim(&self) -> usize {
        self.cell_type.dim()
    }

    pub fn num_entities(&self, dim: usize) -> usize {
        self.entity_vertices[dim].len()
    }

    pub fn num_cells(&self) -> usize {
        self.num_entities(self.dim())
    }

    pub fn num_facets(&self) -> usize {
        self.num_entities(self.dim() - 1)
    }

    pub fn num_vertices(&self) -> usize {
        self.num_entities(0)
    }

    /// Returns the connectivity `(d0, d1)` if it is available.
    ///
    /// Available are `(d, 0)` and `(tdim, d)` for all `d`, as well as `(tdim - 1, tdim)`
    /// and `(0, tdim)`.
    pub fn connectivity(&self, d0: usize, d1: usize) -> Option<&AdjacencyList> {
        let tdim = self.dim();
        if d0 > tdim || d1 > tdim {
            None
        } else if d1 == 0 {
            Some(&self.entity_vertices[d0])
        } else if d0 == tdim {
            Some(&self.cell_entities[d1])
        } else if d1 == tdim && d0 + 1 == tdim {
            Some(&self.facet_cells)
        } else if d0 == 0 && d1 == tdim {
            Some(&self.vertex_cells)
        } else {
            None
        }
    }

    /// Vertices of entity `(dim, index)`, in the local order of the first cell that
    /// contains it.
    pub fn entity_vertices(&self, dim: usize, index: usize) -> &[usize] {
        self.entity_vertices[dim].links(index)
    }

    /// Global indices of the local entities of dimension `dim` of the given cell, in reference
    /// order.
    pub fn cell_entities(&self, cell: usize, dim: usize) -> &[usize] {
        self.cell_entities[dim].links(cell)
    }

    pub fn cell_vertices(&self, cell: usize) -> &[usize] {
        self.cell_entities[0].links(cell)
    }

    pub fn facet_cells(&self, facet: usize) -> &[usize] {
        self.facet_cells.links(facet)
    }

    pub fn vertex_cells(&self, vertex: usize) -> &[usize] {
        self.vertex_cells.links(vertex)
    }

    /// The local index of `facet` in `cell`, if the cell contains the facet.
    pub fn local_facet_index(&self, cell: usize, facet: usize) -> Option<usize> {
        self.cell_entities(cell, self.dim() - 1)
            .iter()
            .position(|&f| f == facet)
    }

    /// Facets attached to exactly one cell, in ascending order.
    pub fn boundary_facets(&self) -> Vec<usize> {
        self.facet_cells
            .iter()
            .enumerate()
            .filter(|(_, cells)| cells.len() == 1)
            .map(|(facet, _)| facet)
            .collect()
    }

    /// Entities of dimension `dim` in the closure of a boundary facet, in ascending order.
    pub fn boundary_entities(&self, dim: usize) -> Vec<usize> {
        let tdim = self.dim();
        let mut is_boundary = vec![false; self.num_entities(dim)];
        for facet in self.boundary_facets() {
            let cell = self.facet_cells(facet)[0];
            if dim == tdim {
                is_boundary[cell] = true;
                continue;
            }
            let local_facet = self
                .local_facet_index(cell, facet)
                .expect("Facet must be contained in its attached cell");
            let cell_entities = self.cell_entities(cell, dim);
            for local_entity in self.cell_type.closure_entities(tdim - 1, local_facet, dim) {
                is_boundary[cell_entities[local_entity]] = true;
            }
        }
        is_boundary
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(|(entity, _)| entity)
            .collect()
    }
}

/// Numbers entities of dimension `dim` by first encounter, returning the `(dim, 0)` and
/// `(tdim, dim)` connectivities.
fn create_entities(cell_type: CellType, cells: &AdjacencyList, dim: usize) -> (AdjacencyList, AdjacencyList) {
    let local_entities = cell_type.entity_vertices(dim);
    let mut entity_indices: FxHashMap<Vec<usize>, usize> = FxHashMap::default();
    let mut entity_vertices = AdjacencyList::new();
    let mut cell_entities = Vec::with_capacity(cells.len() * local_entities.len());

    let mut vertices = Vec::new();
    let mut key = Vec::new();
    for cell in cells.iter() {
        for local_entity in local_entities {
            vertices.clear();
            vertices.extend(local_entity.iter().map(|&v| cell[v]));
            key.clear();
            key.extend_from_slice(&vertices);
            key.sort_unstable();

            let next_index = entity_vertices.len();
            let index = *entity_indices.entry(key.clone()).or_insert(next_index);
            if index == next_index {
                entity_vertices.push(&vertices);
            }
            cell_entities.push(index);
        }
    }

    (
        entity_vertices,
        AdjacencyList::from_uniform(cell_entities, local_entities.len()),
    )
}
