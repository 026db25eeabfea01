//! Reference cells.
//!
//! All reference cells live on the unit domain: `[0, 1]^d` for intervals, quadrilaterals and
//! hexahedra, and the unit simplex for triangles and tetrahedra. Vertices of tensor-product
//! cells are numbered with the first coordinate varying fastest. Sub-entities are numbered as
//! in the tables below and this numbering determines the DOF numbering of function spaces.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellType {
    Point,
    Interval,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Hexahedron,
}

type EntityTable = &'static [&'static [usize]];

const POINT_VERTICES: [[f64; 3]; 1] = [[0.0, 0.0, 0.0]];
const INTERVAL_VERTICES: [[f64; 3]; 2] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
const TRIANGLE_VERTICES: [[f64; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const QUADRILATERAL_VERTICES: [[f64; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
const TETRAHEDRON_VERTICES: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];
const HEXAHEDRON_VERTICES: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
];

const VERTICES_1: EntityTable = &[&[0]];
const VERTICES_2: EntityTable = &[&[0], &[1]];
const VERTICES_3: EntityTable = &[&[0], &[1], &[2]];
const VERTICES_4: EntityTable = &[&[0], &[1], &[2], &[3]];
const VERTICES_8: EntityTable = &[&[0], &[1], &[2], &[3], &[4], &[5], &[6], &[7]];

const INTERVAL_CELL: EntityTable = &[&[0, 1]];
const TRIANGLE_EDGES: EntityTable = &[&[1, 2], &[0, 2], &[0, 1]];
const TRIANGLE_CELL: EntityTable = &[&[0, 1, 2]];
const QUADRILATERAL_EDGES: EntityTable = &[&[0, 1], &[0, 2], &[1, 3], &[2, 3]];
const QUADRILATERAL_CELL: EntityTable = &[&[0, 1, 2, 3]];
const TETRAHEDRON_EDGES: EntityTable = &[&[2, 3], &[1, 3], &[1, 2], &[0, 3], &[0, 2], &[0, 1]];
const TETRAHEDRON_FACES: EntityTable = &[&[1, 2, 3], &[0, 2, 3], &[0, 1, 3], &[0, 1, 2]];
const TETRAHEDRON_CELL: EntityTable = &[&[0, 1, 2, 3]];
const HEXAHEDRON_EDGES: EntityTable = &[
    &[0, 1],
    &[0, 2],
    &[0, 4],
    &[1, 3],
    &[1, 5],
    &[2, 3],
    &[2, 6],
    &[3, 7],
    &[4, 5],
    &[4, 6],
    &[5, 7],
    &[6, 7],
];
const HEXAHEDRON_FACES: EntityTable = &[
    &[0, 1, 2, 3],
    &[0, 1, 4, 5],
    &[0, 2, 4, 6],
    &[1, 3, 5, 7],
    &[2, 3, 6, 7],
    &[4, 5, 6, 7],
];
const HEXAHEDRON_CELL: EntityTable = &[&[0, 1, 2, 3, 4, 5, 6, 7]];

impl CellType {
    /// Topological dimension.
    pub fn dim(&self) -> usize {
        match self {
            Self::Point => 0,
            Self::Interval => 1,
            Self::Triangle | Self::Quadrilateral => 2,
            Self::Tetrahedron | Self::Hexahedron => 3,
        }
    }

    pub fn is_simplex(&self) -> bool {
        matches!(self, Self::Point | Self::Interval | Self::Triangle | Self::Tetrahedron)
    }

    pub fn num_vertices(&self) -> usize {
        self.reference_vertices().len()
    }

    /// Vertex coordinates of the reference cell, padded with zeros to three components.
    pub fn reference_vertices(&self) -> &'static [[f64; 3]] {
        match self {
            Self::Point => &POINT_VERTICES,
            Self::Interval => &INTERVAL_VERTICES,
            Self::Triangle => &TRIANGLE_VERTICES,
            Self::Quadrilateral => &QUADRILATERAL_VERTICES,
            Self::Tetrahedron => &TETRAHEDRON_VERTICES,
            Self::Hexahedron => &HEXAHEDRON_VERTICES,
        }
    }

    /// The local vertices of every sub-entity of the given dimension.
    ///
    /// # Panics
    ///
    /// Panics if `dim` exceeds the dimension of the cell.
    pub fn entity_vertices(&self, dim: usize) -> &'static [&'static [usize]] {
        assert!(dim <= self.dim(), "Entity dimension exceeds cell dimension");
        match (self, dim) {
            (Self::Point, _) => VERTICES_1,
            (Self::Interval, 0) => VERTICES_2,
            (Self::Interval, _) => INTERVAL_CELL,
            (Self::Triangle, 0) => VERTICES_3,
            (Self::Triangle, 1) => TRIANGLE_EDGES,
            (Self::Triangle, _) => TRIANGLE_CELL,
            (Self::Quadrilateral, 0) => VERTICES_4,
            (Self::Quadrilateral, 1) => QUADRILATERAL_EDGES,
            (Self::Quadrilateral, _) => QUADRILATERAL_CELL,
            (Self::Tetrahedron, 0) => VERTICES_4,
            (Self::Tetrahedron, 1) => TETRAHEDRON_EDGES,
            (Self::Tetrahedron, 2) => TETRAHEDRON_FACES,
            (Self::Tetrahedron, _) => TETRAHEDRON_CELL,
            (Self::Hexahedron, 0) => VERTICES_8,
            (Self::Hexahedron, 1) => HEXAHEDRON_EDGES,
            (Self::Hexahedron, 2) => HEXAHEDRON_FACES,
            (Self::Hexahedron, _) => HEXAHEDRON_CELL,
        }
    }

    pub fn num_entities(&self, dim: usize) -> usize {
        self.entity_vertices(dim).len()
    }

    /// The cell type of the sub-entities of the given dimension.
    pub fn entity_type(&self, dim: usize) -> CellType {
        assert!(dim <= self.dim(), "Entity dimension exceeds cell dimension");
        match dim {
            0 => Self::Point,
            1 => Self::Interval,
            d if d == self.dim() => *self,
            _ => match self {
                Self::Hexahedron => Self::Quadrilateral,
                _ => Self::Triangle,
            },
        }
    }

    pub fn facet_type(&self) -> CellType {
        self.entity_type(self.dim().saturating_sub(1))
    }

    pub fn num_facets(&self) -> usize {
        if self.dim() == 0 {
            0
        } else {
            self.num_entities(self.dim() - 1)
        }
    }

    /// Lebesgue measure of the reference cell.
    pub fn reference_volume(&self) -> f64 {
        match self {
            Self::Point | Self::Interval | Self::Quadrilateral | Self::Hexahedron => 1.0,
            Self::Triangle => 0.5,
            Self::Tetrahedron => 1.0 / 6.0,
        }
    }

    /// Average of the reference vertices.
    pub fn reference_midpoint(&self) -> [f64; 3] {
        entity_midpoint(self.reference_vertices(), self.entity_vertices(self.dim())[0])
    }

    /// Local sub-entities of dimension `sub_dim` contained in the closure of the local
    /// entity `(dim, index)`, in ascending local order.
    pub fn closure_entities(&self, dim: usize, index: usize, sub_dim: usize) -> Vec<usize> {
        let entity = self.entity_vertices(dim)[index];
        self.entity_vertices(sub_dim)
            .iter()
            .enumerate()
            .filter(|(_, sub_entity)| sub_entity.iter().all(|v| entity.contains(v)))
            .map(|(sub_index, _)| sub_index)
            .collect()
    }
}

impl Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Point => "point",
            Self::Interval => "interval",
            Self::Triangle => "triangle",
            Self::Quadrilateral => "quadrilateral",
            Self::Tetrahedron => "tetrahedron",
            Self::Hexahedron => "hexahedron",
        };
        write!(f, "{}", name)
    }
}

pub(crate) fn entity_midpoint(vertices: &[[f64; 3]], entity: &[usize]) -> [f64; 3] {
    let mut midpoint = [0.0; 3];
    for &v in entity {
        for (m, x) in midpoint.iter_mut().zip(&vertices[v]) {
            *m += x;
        }
    }
    for m in &mut midpoint {
        *m /= entity.len() as f64;
    }
    midpoint
}
