use crate::adjacency::AdjacencyList;
use crate::element::FiniteElement;
use crate::topology::Topology;
use crate::Real;

/// Maps local basis functions of every cell to global nodes.
///
/// Nodes are numbered by visiting cells in ascending order and, within each cell, entities
/// by ascending dimension and ascending local index. The nodes of an entity are numbered
/// consecutively the first time the entity is encountered, so nodes on entities shared
/// between cells are shared. For a blocked space, node `n` carries the global DOFs
/// `block_size * n + c` for the components `c` in `0..block_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    cell_nodes: AdjacencyList,
    num_nodes: usize,
    block_size: usize,
}

impl DofMap {
    /// # Panics
    ///
    /// Panics if the element and the topology have different cell types or the block size
    /// is zero.
    pub fn build<T: Real>(topology: &Topology, element: &FiniteElement<T>, block_size: usize) -> Self {
        assert_eq!(topology.cell_type(), element.cell_type(), "Element must match mesh cells");
        assert!(block_size > 0, "Block size must be positive");
        let tdim = topology.dim();

        let mut first_node: Vec<Vec<Option<usize>>> = (0..=tdim)
            .map(|d| vec![None; topology.num_entities(d)])
            .collect();
        let mut num_nodes = 0;
        let mut cell_nodes = AdjacencyList::new();
        let mut local_nodes = vec![usize::MAX; element.num_dofs()];

        for cell in 0..topology.num_cells() {
            for dim in 0..=tdim {
                for (local_entity, &entity) in topology.cell_entities(cell, dim).iter().enumerate() {
                    let dofs = element.entity_dofs(dim, local_entity);
                    if dofs.is_empty() {
                        continue;
                    }
                    let first = *first_node[dim][entity].get_or_insert_with(|| {
                        let first = num_nodes;
                        num_nodes += dofs.len();
                        first
                    });
                    for (k, &local_dof) in dofs.iter().enumerate() {
                        local_nodes[local_dof] = first + k;
                    }
                }
            }
            debug_assert!(local_nodes.iter().all(|&n| n != usize::MAX));
            cell_nodes.push(&local_nodes);
        }

        Self {
            cell_nodes,
            num_nodes,
            block_size,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_dofs(&self) -> usize {
        self.block_size * self.num_nodes
    }

    pub fn num_cells(&self) -> usize {
        self.cell_nodes.len()
    }

    /// Global nodes of the local basis functions of a cell.
    pub fn cell_nodes(&self, cell: usize) -> &[usize] {
        self.cell_nodes.links(cell)
    }

    pub fn list(&self) -> &AdjacencyList {
        &self.cell_nodes
    }

    /// Number of DOFs per cell, including all block components.
    pub fn cell_dimension(&self, cell: usize) -> usize {
        self.block_size * self.cell_nodes(cell).len()
    }

    /// Writes the global DOFs of a cell into `dofs`, ordered as `block_size * local_node + c`.
    pub fn populate_cell_dofs(&self, cell: usize, dofs: &mut Vec<usize>) {
        let bs = self.block_size;
        dofs.clear();
        dofs.extend(
            self.cell_nodes(cell)
                .iter()
                .flat_map(|&node| (0..bs).map(move |c| bs * node + c)),
        );
    }

    pub fn cell_dofs(&self, cell: usize) -> Vec<usize> {
        let mut dofs = Vec::new();
        self.populate_cell_dofs(cell, &mut dofs);
        dofs
    }
}
