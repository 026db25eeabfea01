//! Quadrature rules on reference cells and their facets.
use crate::cell::{entity_midpoint, CellType};
use crate::Real;
use galerkin_quadrature as rules;
use nalgebra::DMatrix;

/// A quadrature rule with points stored contiguously (`num_points x dim`).
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule<T> {
    dim: usize,
    weights: Vec<T>,
    points: Vec<T>,
}

impl<T: Real> QuadratureRule<T> {
    /// A rule on the reference cell that integrates polynomials of degree `strength` exactly
    /// (total degree on simplices, degree per variable on tensor-product cells).
    pub fn for_cell(cell_type: CellType, strength: usize) -> Self {
        match cell_type {
            CellType::Point => Self::from_f64_rule(0, &[1.0], &[[0.0; 0]]),
            CellType::Interval => {
                let (w, p) = rules::interval(strength);
                Self::from_f64_rule(1, &w, &p)
            }
            CellType::Triangle => {
                let (w, p) = rules::triangle(strength);
                Self::from_f64_rule(2, &w, &p)
            }
            CellType::Quadrilateral => {
                let (w, p) = rules::quadrilateral(strength);
                Self::from_f64_rule(2, &w, &p)
            }
            CellType::Tetrahedron => {
                let (w, p) = rules::tetrahedron(strength);
                Self::from_f64_rule(3, &w, &p)
            }
            CellType::Hexahedron => {
                let (w, p) = rules::hexahedron(strength);
                Self::from_f64_rule(3, &w, &p)
            }
        }
    }

    fn from_f64_rule<const D: usize>(dim: usize, weights: &[f64], points: &[[f64; D]]) -> Self {
        Self {
            dim,
            weights: weights.iter().map(|&w| T::from_f64_const(w)).collect(),
            points: points
                .iter()
                .flat_map(|p| p.iter().map(|&x| T::from_f64_const(x)))
                .collect(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn point(&self, index: usize) -> &[T] {
        &self.points[self.dim * index..self.dim * (index + 1)]
    }

    pub fn points(&self) -> impl '_ + Iterator<Item = &[T]> {
        (0..self.num_points()).map(move |i| self.point(i))
    }

    pub fn integrate(&self, f: impl Fn(&[T]) -> T) -> T {
        self.weights
            .iter()
            .zip(self.points())
            .fold(T::zero(), |acc, (&w, xi)| acc + w * f(xi))
    }
}

/// A quadrature rule on one facet of a reference cell, expressed in cell reference coordinates.
#[derive(Debug, Clone)]
pub struct FacetQuadrature<T> {
    /// Points in cell reference coordinates, weights with respect to the reference facet.
    pub rule: QuadratureRule<T>,
    /// Maps reference facet coordinates to cell reference coordinates (`tdim x (tdim - 1)`).
    pub reference_jacobian: DMatrix<T>,
    /// Outward unit normal of the facet on the reference cell.
    pub reference_normal: Vec<T>,
}

/// Facet rules for all local facets of the cell, in local facet order.
pub fn facet_quadratures<T: Real>(cell_type: CellType, strength: usize) -> Vec<FacetQuadrature<T>> {
    let tdim = cell_type.dim();
    let vertices = cell_type.reference_vertices();
    let cell_midpoint = cell_type.reference_midpoint();
    let facet_rule = QuadratureRule::<T>::for_cell(cell_type.facet_type(), strength);

    cell_type
        .entity_vertices(tdim - 1)
        .iter()
        .map(|facet| {
            let origin = vertices[facet[0]];
            let tangents: Vec<[f64; 3]> = facet[1..]
                .iter()
                .take(tdim - 1)
                .map(|&v| [0, 1, 2].map(|d| vertices[v][d] - origin[d]))
                .collect();

            let mut points = Vec::with_capacity(facet_rule.num_points() * tdim);
            for s in facet_rule.points() {
                for d in 0..tdim {
                    let mut x = T::from_f64_const(origin[d]);
                    for (k, t) in tangents.iter().enumerate() {
                        x += s[k] * T::from_f64_const(t[d]);
                    }
                    points.push(x);
                }
            }

            let reference_jacobian =
                DMatrix::from_fn(tdim, tdim - 1, |d, k| T::from_f64_const(tangents[k][d]));

            let facet_midpoint = entity_midpoint(vertices, facet);
            let outward = [0, 1, 2].map(|d| facet_midpoint[d] - cell_midpoint[d]);
            let mut normal = match tdim {
                1 => [1.0, 0.0, 0.0],
                2 => [tangents[0][1], -tangents[0][0], 0.0],
                _ => cross(&tangents[0], &tangents[1]),
            };
            let orientation: f64 = (0..3).map(|d| normal[d] * outward[d]).sum();
            let length = normal.iter().map(|n| n * n).sum::<f64>().sqrt();
            let sign = if orientation < 0.0 { -1.0 } else { 1.0 };
            for n in &mut normal {
                *n *= sign / length;
            }

            FacetQuadrature {
                rule: QuadratureRule {
                    dim: tdim,
                    weights: facet_rule.weights().to_vec(),
                    points,
                },
                reference_jacobian,
                reference_normal: normal[..tdim].iter().map(|&n| T::from_f64_const(n)).collect(),
            }
        })
        .collect()
}

fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
