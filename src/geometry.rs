//! Cell geometry: the P1/Q1 coordinate map, bounding boxes and point location.
use crate::cell::CellType;
use crate::element::{ElementDescription, FiniteElement};
use crate::error::Result;
use crate::mesh::Mesh;
use crate::Real;
use nalgebra::{DMatrix, DMatrixView};
use numeric_literals::replace_float_literals;

/// The map from reference coordinates to physical coordinates of a cell, defined by the
/// first-order Lagrange element on the cell's vertices.
#[derive(Debug, Clone)]
pub struct CoordinateMap<T: Real> {
    element: FiniteElement<T>,
}

impl<T: Real> CoordinateMap<T> {
    pub fn new(cell_type: CellType) -> Result<Self> {
        Ok(Self {
            element: FiniteElement::new(ElementDescription::lagrange(cell_type, 1))?,
        })
    }

    pub fn element(&self) -> &FiniteElement<T> {
        &self.element
    }

    /// Maps `xi` to physical coordinates. `cell_coordinates` holds the cell vertices as rows.
    pub fn push_forward(&self, cell_coordinates: &DMatrix<T>, xi: &[T]) -> Vec<T> {
        let mut psi = vec![T::zero(); self.element.num_dofs()];
        self.element.evaluate_basis(xi, &mut psi);
        (0..cell_coordinates.ncols())
            .map(|d| {
                psi.iter()
                    .enumerate()
                    .fold(T::zero(), |acc, (v, &psi_v)| acc + psi_v * cell_coordinates[(v, d)])
            })
            .collect()
    }

    /// The Jacobian `dx/dxi` (`gdim x tdim`) at `xi`.
    pub fn jacobian(&self, cell_coordinates: &DMatrix<T>, xi: &[T]) -> DMatrix<T> {
        let mut gradients = DMatrix::zeros(self.element.reference_dim(), self.element.num_dofs());
        self.element.evaluate_gradients(xi, (&mut gradients).into());
        jacobian_from_gradients(cell_coordinates, (&gradients).into())
    }

    /// Finds reference coordinates mapped to `x` by Newton iteration.
    ///
    /// Returns `None` if the iteration does not converge or the Jacobian is degenerate. For
    /// manifold cells the result is the reference point of the closest point in the
    /// tangent space.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn pull_back(&self, cell_coordinates: &DMatrix<T>, x: &[T]) -> Option<Vec<T>> {
        let cell_type = self.element.cell_type();
        let tdim = cell_type.dim();
        let midpoint = cell_type.reference_midpoint();
        let mut xi: Vec<T> = midpoint[..tdim].iter().map(|&m| T::from_f64_const(m)).collect();

        let scale = cell_coordinates.abs().max() + 1.0;
        for _ in 0..32 {
            let x_k = self.push_forward(cell_coordinates, &xi);
            let j = self.jacobian(cell_coordinates, &xi);
            let k = pseudo_inverse(&j)?;
            let residual = DMatrix::from_fn(x.len(), 1, |d, _| x[d] - x_k[d]);
            let dxi = k * residual;
            for (xi_d, dxi_d) in xi.iter_mut().zip(dxi.iter()) {
                *xi_d += *dxi_d;
            }
            if dxi.norm() <= 1e-14 * scale {
                return Some(xi);
            }
        }
        None
    }
}

/// `J = X^T dpsi^T` for vertex coordinates `X` (rows) and coordinate element reference
/// gradients `dpsi` (`tdim x num_vertices`).
pub fn jacobian_from_gradients<T: Real>(cell_coordinates: &DMatrix<T>, gradients: DMatrixView<T>) -> DMatrix<T> {
    cell_coordinates.tr_mul(&gradients.transpose())
}

/// `|det J|` for square Jacobians and `sqrt(det(J^T J))` otherwise.
pub fn pseudo_determinant<T: Real>(j: &DMatrix<T>) -> T {
    if j.ncols() == 0 {
        T::one()
    } else if j.is_square() {
        j.determinant().abs()
    } else {
        j.tr_mul(j).determinant().max(T::zero()).sqrt()
    }
}

/// The inverse of a square Jacobian, or the Moore-Penrose pseudo-inverse `(J^T J)^{-1} J^T`
/// of a Jacobian with full column rank.
pub fn pseudo_inverse<T: Real>(j: &DMatrix<T>) -> Option<DMatrix<T>> {
    if j.is_square() {
        j.clone().try_inverse()
    } else {
        j.tr_mul(j).try_inverse().map(|inv| inv * j.transpose())
    }
}

/// Whether `xi` lies in the reference cell, up to the given tolerance.
pub fn reference_cell_contains<T: Real>(cell_type: CellType, xi: &[T], tolerance: T) -> bool {
    let lower_ok = xi.iter().all(|&x| x >= -tolerance);
    if cell_type.is_simplex() {
        let sum = xi.iter().fold(T::zero(), |acc, &x| acc + x);
        lower_ok && sum <= T::one() + tolerance
    } else {
        lower_ok && xi.iter().all(|&x| x <= T::one() + tolerance)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox<T> {
    pub min: Vec<T>,
    pub max: Vec<T>,
}

impl<T: Real> BoundingBox<T> {
    /// The smallest box containing all given points.
    ///
    /// # Panics
    ///
    /// Panics if there are no points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [T]>) -> Self {
        let mut points = points.into_iter();
        let first = points.next().expect("Bounding box requires at least one point");
        let mut bounds = Self {
            min: first.to_vec(),
            max: first.to_vec(),
        };
        for point in points {
            for (d, &x) in point.iter().enumerate() {
                bounds.min[d] = bounds.min[d].min(x);
                bounds.max[d] = bounds.max[d].max(x);
            }
        }
        bounds
    }

    pub fn contains(&self, x: &[T], tolerance: T) -> bool {
        x.iter()
            .zip(self.min.iter().zip(&self.max))
            .all(|(&x, (&min, &max))| x >= min - tolerance && x <= max + tolerance)
    }

    pub fn extents(&self) -> Vec<T> {
        self.max.iter().zip(&self.min).map(|(&max, &min)| max - min).collect()
    }
}

impl<T: Real> Mesh<T> {
    pub fn cell_bounding_box(&self, cell: usize) -> BoundingBox<T> {
        BoundingBox::from_points(self.cell_vertices(cell).iter().map(|&v| self.vertex(v)))
    }

    pub fn bounding_box(&self) -> BoundingBox<T> {
        BoundingBox::from_points((0..self.num_vertices()).map(|v| self.vertex(v)))
    }

    /// Average of the cell's vertices.
    pub fn cell_midpoint(&self, cell: usize) -> Vec<T> {
        let vertices = self.cell_vertices(cell);
        let n = T::from_count(vertices.len());
        (0..self.gdim())
            .map(|d| vertices.iter().fold(T::zero(), |acc, &v| acc + self.vertex(v)[d]) / n)
            .collect()
    }

    /// Finds the lowest-indexed cell containing `x`, together with the reference coordinates of
    /// `x` in that cell.
    ///
    /// # Panics
    ///
    /// Panics if `x` does not have `gdim` components.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn locate_point(&self, x: &[T]) -> Option<(usize, Vec<T>)> {
        assert_eq!(x.len(), self.gdim(), "Point must have the geometric dimension of the mesh");
        let coordinate_map = CoordinateMap::new(self.cell_type()).ok()?;
        let extents = self.bounding_box().extents();
        let scale = extents.iter().fold(T::zero(), |acc, &e| acc.max(e));
        let tolerance = 1e-10 * (scale + 1.0);

        let mut cell_coordinates = DMatrix::zeros(0, 0);
        for cell in 0..self.num_cells() {
            if !self.cell_bounding_box(cell).contains(x, tolerance) {
                continue;
            }
            self.populate_cell_coordinates(cell, &mut cell_coordinates);
            if let Some(xi) = coordinate_map.pull_back(&cell_coordinates, x) {
                if !reference_cell_contains(self.cell_type(), &xi, 1e-10) {
                    continue;
                }
                let mapped = coordinate_map.push_forward(&cell_coordinates, &xi);
                let distance = mapped
                    .iter()
                    .zip(x)
                    .fold(T::zero(), |acc, (&a, &b)| acc + (a - b) * (a - b))
                    .sqrt();
                if distance <= tolerance {
                    return Some((cell, xi));
                }
            }
        }
        None
    }
}
