//! Basic procedural mesh generation routines.
//!
//! Vertices are numbered lexicographically with the x index varying fastest, and cells are
//! numbered in the same way by their lowest vertex. Simplicial meshes split every
//! quadrilateral or hexahedron along the diagonal through its lowest and highest vertex.
use crate::cell::CellType;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::Real;

pub fn create_unit_interval<T: Real>(num_cells: usize) -> Result<Mesh<T>> {
    create_interval(num_cells, [T::zero(), T::one()])
}

/// A uniform mesh of the interval `[bounds[0], bounds[1]]`.
pub fn create_interval<T: Real>(num_cells: usize, bounds: [T; 2]) -> Result<Mesh<T>> {
    validate_resolution(&[num_cells])?;
    validate_bounds(&[bounds[0]], &[bounds[1]])?;

    let coordinates = grid_coordinates(&[bounds[0]], &[bounds[1]], &[num_cells]);
    let cells = (0..num_cells).flat_map(|i| [i, i + 1]).collect();
    Mesh::new(CellType::Interval, 1, coordinates, cells)
}

pub fn create_unit_square<T: Real>(nx: usize, ny: usize, cell_type: CellType) -> Result<Mesh<T>> {
    create_rectangle([[T::zero(); 2], [T::one(); 2]], [nx, ny], cell_type)
}

/// A uniform mesh of the axis-aligned rectangle with the given lower and upper corners,
/// made of triangles or quadrilaterals.
pub fn create_rectangle<T: Real>(corners: [[T; 2]; 2], resolution: [usize; 2], cell_type: CellType) -> Result<Mesh<T>> {
    validate_resolution(&resolution)?;
    validate_bounds(&corners[0], &corners[1])?;

    let [nx, ny] = resolution;
    let vertex = |i: usize, j: usize| (nx + 1) * j + i;
    let mut cells = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            let v = [vertex(i, j), vertex(i + 1, j), vertex(i, j + 1), vertex(i + 1, j + 1)];
            match cell_type {
                CellType::Quadrilateral => cells.extend_from_slice(&v),
                CellType::Triangle => {
                    cells.extend_from_slice(&[v[0], v[1], v[3]]);
                    cells.extend_from_slice(&[v[0], v[2], v[3]]);
                }
                _ => return Err(unsupported_cell_type(cell_type, 2)),
            }
        }
    }

    let coordinates = grid_coordinates(&corners[0], &corners[1], &resolution);
    Mesh::new(cell_type, 2, coordinates, cells)
}

pub fn create_unit_cube<T: Real>(nx: usize, ny: usize, nz: usize, cell_type: CellType) -> Result<Mesh<T>> {
    create_box([[T::zero(); 3], [T::one(); 3]], [nx, ny, nz], cell_type)
}

/// A uniform mesh of the axis-aligned box with the given lower and upper corners,
/// made of tetrahedra or hexahedra.
///
/// Each hexahedral block is split into six tetrahedra sharing the block diagonal. All blocks
/// use the same diagonal direction, so the resulting mesh is conforming.
pub fn create_box<T: Real>(corners: [[T; 3]; 2], resolution: [usize; 3], cell_type: CellType) -> Result<Mesh<T>> {
    validate_resolution(&resolution)?;
    validate_bounds(&corners[0], &corners[1])?;

    let [nx, ny, nz] = resolution;
    let vertex = |i: usize, j: usize, k: usize| (nx + 1) * (ny + 1) * k + (nx + 1) * j + i;
    let mut cells = Vec::new();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let v: [usize; 8] = [0, 1, 2, 3, 4, 5, 6, 7].map(|local| {
                    vertex(i + (local & 1), j + ((local >> 1) & 1), k + ((local >> 2) & 1))
                });
                match cell_type {
                    CellType::Hexahedron => cells.extend_from_slice(&v),
                    CellType::Tetrahedron => {
                        for tet in [[0, 1, 3, 7], [0, 1, 5, 7], [0, 2, 3, 7], [0, 2, 6, 7], [0, 4, 5, 7], [0, 4, 6, 7]] {
                            cells.extend(tet.iter().map(|&local| v[local]));
                        }
                    }
                    _ => return Err(unsupported_cell_type(cell_type, 3)),
                }
            }
        }
    }

    let coordinates = grid_coordinates(&corners[0], &corners[1], &resolution);
    Mesh::new(cell_type, 3, coordinates, cells)
}

/// Row-major coordinates of a lexicographically ordered tensor grid.
fn grid_coordinates<T: Real>(lower: &[T], upper: &[T], resolution: &[usize]) -> Vec<T> {
    let dim = resolution.len();
    let num_vertices: usize = resolution.iter().map(|n| n + 1).product();
    let mut coordinates = Vec::with_capacity(num_vertices * dim);
    for index in 0..num_vertices {
        let mut remainder = index;
        for d in 0..dim {
            let i = remainder % (resolution[d] + 1);
            remainder /= resolution[d] + 1;
            let t = T::from_count(i) / T::from_count(resolution[d]);
            coordinates.push(lower[d] + (upper[d] - lower[d]) * t);
        }
    }
    coordinates
}

fn validate_resolution(resolution: &[usize]) -> Result<()> {
    if resolution.iter().any(|&n| n == 0) {
        Err(Error::InvalidMesh(format!(
            "Number of cells must be positive in every direction, got {:?}",
            resolution
        )))
    } else {
        Ok(())
    }
}

fn validate_bounds<T: Real>(lower: &[T], upper: &[T]) -> Result<()> {
    if lower.iter().zip(upper).all(|(l, u)| l < u) {
        Ok(())
    } else {
        Err(Error::InvalidMesh(format!(
            "Lower corner {:?} must be strictly below upper corner {:?}",
            lower, upper
        )))
    }
}

fn unsupported_cell_type(cell_type: CellType, dim: usize) -> Error {
    Error::InvalidMesh(format!("Cannot generate a {}D mesh of {} cells", dim, cell_type))
}
