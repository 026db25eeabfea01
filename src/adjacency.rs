//! Compressed storage for graph adjacency (node -> links).
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;

/// Links of every node stored contiguously, delimited by offsets.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyList {
    data: Vec<usize>,
    offsets: Vec<usize>,
}

impl Debug for AdjacencyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Default for AdjacencyList {
    fn default() -> Self {
        Self::new()
    }
}

impl AdjacencyList {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Creates a list in which every node has exactly `links_per_node` links.
    ///
    /// # Panics
    ///
    /// Panics if the length of `data` is not a multiple of `links_per_node`.
    pub fn from_uniform(data: Vec<usize>, links_per_node: usize) -> Self {
        assert!(links_per_node > 0, "Nodes must have at least one link");
        assert_eq!(
            data.len() % links_per_node,
            0,
            "Data length must be a multiple of the number of links per node"
        );
        let offsets = (0..=data.len() / links_per_node)
            .map(|i| i * links_per_node)
            .collect();
        Self { data, offsets }
    }

    pub fn push(&mut self, links: &[usize]) {
        self.data.extend_from_slice(links);
        self.offsets.push(self.data.len());
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, node: usize) -> Option<&[usize]> {
        let begin = *self.offsets.get(node)?;
        let end = *self.offsets.get(node + 1)?;
        self.data.get(begin..end)
    }

    /// Links of the given node.
    ///
    /// # Panics
    ///
    /// Panics if the node is out of bounds.
    pub fn links(&self, node: usize) -> &[usize] {
        &self.data[self.offsets[node]..self.offsets[node + 1]]
    }

    pub fn iter(&self) -> impl '_ + ExactSizeIterator<Item = &[usize]> {
        self.offsets
            .windows(2)
            .map(move |range| &self.data[range[0]..range[1]])
    }

    /// All links of all nodes, in node order.
    pub fn array(&self) -> &[usize] {
        &self.data
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn total_num_links(&self) -> usize {
        self.data.len()
    }

    /// Reverses all links. Node `i` of the result links to every source node that links to
    /// `i`, in ascending order.
    ///
    /// # Panics
    ///
    /// Panics if a link is not smaller than `num_targets`.
    pub fn transpose(&self, num_targets: usize) -> AdjacencyList {
        let mut counts = vec![0; num_targets + 1];
        for &target in &self.data {
            counts[target + 1] += 1;
        }
        for i in 0..num_targets {
            counts[i + 1] += counts[i];
        }
        let offsets = counts.clone();
        let mut positions = counts;
        let mut data = vec![usize::MAX; self.data.len()];
        for (source, links) in self.iter().enumerate() {
            for &target in links {
                data[positions[target]] = source;
                positions[target] += 1;
            }
        }
        Self { data, offsets }
    }
}

impl<'a> From<&'a [Vec<usize>]> for AdjacencyList {
    fn from(nested: &'a [Vec<usize>]) -> Self {
        let mut result = Self::new();
        for links in nested {
            result.push(links);
        }
        result
    }
}

impl From<Vec<Vec<usize>>> for AdjacencyList {
    fn from(nested: Vec<Vec<usize>>) -> Self {
        Self::from(nested.as_slice())
    }
}

impl<'a> From<&'a AdjacencyList> for Vec<Vec<usize>> {
    fn from(list: &'a AdjacencyList) -> Self {
        list.iter().map(|links| links.to_vec()).collect()
    }
}
