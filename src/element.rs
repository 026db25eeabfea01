//! Element descriptions and the nodal finite elements they denote.
//!
//! The supported elements form a closed set: continuous Lagrange elements of degree 1 and 2 and
//! discontinuous Lagrange elements of degree 0 to 2, on all reference cells. Bases are nodal
//! with respect to equispaced points and spanned by monomials of bounded total degree on
//! simplices and bounded degree per variable on quadrilaterals and hexahedra.
use crate::cell::{entity_midpoint, CellType};
use crate::error::{Error, Result};
use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementFamily {
    Lagrange,
    DiscontinuousLagrange,
}

/// A (possibly blocked) element: `block_size` copies of a scalar element, one per component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementDescription {
    pub family: ElementFamily,
    pub cell_type: CellType,
    pub degree: usize,
    pub block_size: usize,
}

impl ElementDescription {
    pub fn lagrange(cell_type: CellType, degree: usize) -> Self {
        Self {
            family: ElementFamily::Lagrange,
            cell_type,
            degree,
            block_size: 1,
        }
    }

    pub fn discontinuous_lagrange(cell_type: CellType, degree: usize) -> Self {
        Self {
            family: ElementFamily::DiscontinuousLagrange,
            cell_type,
            degree,
            block_size: 1,
        }
    }

    pub fn with_block_size(self, block_size: usize) -> Self {
        Self { block_size, ..self }
    }

    fn validate(&self) -> Result<()> {
        if self.cell_type.dim() == 0 {
            return Err(Error::unsupported(*self, "elements on points are not supported"));
        }
        if self.block_size == 0 {
            return Err(Error::unsupported(*self, "block size must be positive"));
        }
        let degrees = match self.family {
            ElementFamily::Lagrange => 1..=2,
            ElementFamily::DiscontinuousLagrange => 0..=2,
        };
        if !degrees.contains(&self.degree) {
            return Err(Error::unsupported(
                *self,
                format!("degree must be in {}..={}", degrees.start(), degrees.end()),
            ));
        }
        Ok(())
    }
}

impl Display for ElementDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self.family {
            ElementFamily::Lagrange => "P",
            ElementFamily::DiscontinuousLagrange => "DP",
        };
        write!(f, "{}{}({})", family, self.degree, self.cell_type)?;
        if self.block_size > 1 {
            write!(f, "^{}", self.block_size)?;
        }
        Ok(())
    }
}

/// A scalar nodal finite element on a reference cell.
///
/// Basis function `j` is `phi_j(x) = sum_k C[(k, j)] m_k(x)` for monomials `m_k`, with `C` the
/// inverse of the Vandermonde matrix of the monomials at the nodes.
#[derive(Debug, Clone)]
pub struct FiniteElement<T: Real> {
    description: ElementDescription,
    exponents: Vec<[i32; 3]>,
    coefficients: DMatrix<T>,
    /// Reference coordinates of the nodes, padded to three components.
    nodes: Vec<[f64; 3]>,
    /// `entity_dofs[dim][entity]` lists the local DOFs associated with the entity.
    entity_dofs: Vec<Vec<Vec<usize>>>,
}

impl<T: Real> FiniteElement<T> {
    /// Constructs the scalar element denoted by the description. The block size is ignored.
    pub fn new(description: ElementDescription) -> Result<Self> {
        description.validate()?;
        let cell_type = description.cell_type;
        let tdim = cell_type.dim();
        let degree = description.degree;

        let exponents = monomial_exponents(cell_type, degree);
        let (nodes, entity_dofs) = match description.family {
            ElementFamily::Lagrange => lagrange_nodes(cell_type, degree),
            ElementFamily::DiscontinuousLagrange => {
                let nodes = if degree == 0 {
                    vec![cell_type.reference_midpoint()]
                } else {
                    lagrange_nodes(cell_type, degree).0
                };
                let mut entity_dofs: Vec<Vec<Vec<usize>>> = (0..=tdim)
                    .map(|d| vec![Vec::new(); cell_type.num_entities(d)])
                    .collect();
                entity_dofs[tdim][0] = (0..nodes.len()).collect();
                (nodes, entity_dofs)
            }
        };
        assert_eq!(nodes.len(), exponents.len(), "Node count must match polynomial space dimension");

        let n = nodes.len();
        let vandermonde = DMatrix::from_fn(n, n, |i, k| {
            let xi: Vec<T> = nodes[i][..tdim].iter().map(|&x| T::from_f64_const(x)).collect();
            monomial(&exponents[k], &xi)
        });
        let coefficients = vandermonde
            .try_inverse()
            .ok_or_else(|| Error::unsupported(description, "nodal basis is not unisolvent"))?;

        Ok(Self {
            description: description.with_block_size(1),
            exponents,
            coefficients,
            nodes,
            entity_dofs,
        })
    }

    pub fn description(&self) -> &ElementDescription {
        &self.description
    }

    pub fn cell_type(&self) -> CellType {
        self.description.cell_type
    }

    pub fn degree(&self) -> usize {
        self.description.degree
    }

    pub fn reference_dim(&self) -> usize {
        self.cell_type().dim()
    }

    pub fn num_dofs(&self) -> usize {
        self.nodes.len()
    }

    /// Reference coordinates of the nodes.
    pub fn reference_points(&self) -> impl '_ + Iterator<Item = &[f64]> {
        let tdim = self.reference_dim();
        self.nodes.iter().map(move |node| &node[..tdim])
    }

    /// Local DOFs associated with the local entity `(dim, entity)`.
    pub fn entity_dofs(&self, dim: usize, entity: usize) -> &[usize] {
        &self.entity_dofs[dim][entity]
    }

    /// Local DOFs associated with the local entity `(dim, entity)` or any entity in its closure,
    /// ordered by dimension, then entity.
    pub fn entity_closure_dofs(&self, dim: usize, entity: usize) -> Vec<usize> {
        let cell_type = self.cell_type();
        (0..=dim)
            .flat_map(|sub_dim| {
                cell_type
                    .closure_entities(dim, entity, sub_dim)
                    .into_iter()
                    .map(move |sub_entity| (sub_dim, sub_entity))
            })
            .flat_map(|(sub_dim, sub_entity)| self.entity_dofs(sub_dim, sub_entity).iter().copied())
            .collect()
    }

    /// Evaluates all basis functions at the reference point `xi`.
    ///
    /// # Panics
    ///
    /// Panics if `xi` does not have the reference dimension or `values` does not have length
    /// `num_dofs`.
    pub fn evaluate_basis(&self, xi: &[T], values: &mut [T]) {
        assert_eq!(xi.len(), self.reference_dim());
        assert_eq!(values.len(), self.num_dofs());
        let monomials: Vec<T> = self.exponents.iter().map(|e| monomial(e, xi)).collect();
        for (j, value) in values.iter_mut().enumerate() {
            *value = self
                .coefficients
                .column(j)
                .iter()
                .zip(&monomials)
                .fold(T::zero(), |acc, (&c, &m)| acc + c * m);
        }
    }

    /// Evaluates the reference gradients of all basis functions at `xi` into the columns of
    /// `gradients` (`tdim x num_dofs`).
    pub fn evaluate_gradients(&self, xi: &[T], mut gradients: DMatrixViewMut<T>) {
        let tdim = self.reference_dim();
        assert_eq!(xi.len(), tdim);
        assert_eq!(gradients.nrows(), tdim);
        assert_eq!(gradients.ncols(), self.num_dofs());
        let monomial_gradients: Vec<[T; 3]> = self
            .exponents
            .iter()
            .map(|e| monomial_gradient(e, xi))
            .collect();
        for j in 0..self.num_dofs() {
            for d in 0..tdim {
                gradients[(d, j)] = self
                    .coefficients
                    .column(j)
                    .iter()
                    .zip(&monomial_gradients)
                    .fold(T::zero(), |acc, (&c, m)| acc + c * m[d]);
            }
        }
    }
}

fn monomial_exponents(cell_type: CellType, degree: usize) -> Vec<[i32; 3]> {
    let p = degree as i32;
    let tdim = cell_type.dim();
    let mut exponents = Vec::new();
    let range = |d: usize| if d < tdim { 0..=p } else { 0..=0 };
    for c in range(2) {
        for b in range(1) {
            for a in range(0) {
                let admissible = if cell_type.is_simplex() {
                    a + b + c <= p
                } else {
                    true
                };
                if admissible {
                    exponents.push([a, b, c]);
                }
            }
        }
    }
    exponents
}

fn monomial<T: Real>(exponents: &[i32; 3], xi: &[T]) -> T {
    xi.iter()
        .zip(exponents)
        .fold(T::one(), |acc, (&x, &e)| acc * x.powi(e))
}

fn monomial_gradient<T: Real>(exponents: &[i32; 3], xi: &[T]) -> [T; 3] {
    let mut gradient = [T::zero(); 3];
    for (d, g) in gradient.iter_mut().enumerate().take(xi.len()) {
        if exponents[d] > 0 {
            *g = xi.iter().zip(exponents).enumerate().fold(T::one(), |acc, (k, (&x, &e))| {
                if k == d {
                    acc * T::from_count(e as usize) * x.powi(e - 1)
                } else {
                    acc * x.powi(e)
                }
            });
        }
    }
    gradient
}

/// Nodes of the continuous Lagrange element and their entity association.
///
/// Degree 1 places one node on each vertex. Degree 2 adds one node at the midpoint of every
/// entity of dimension at least one, except for the faces and interiors of simplices, which
/// carry no quadratic nodes.
fn lagrange_nodes(cell_type: CellType, degree: usize) -> (Vec<[f64; 3]>, Vec<Vec<Vec<usize>>>) {
    let tdim = cell_type.dim();
    let vertices = cell_type.reference_vertices();
    let mut nodes = Vec::new();
    let mut entity_dofs = Vec::with_capacity(tdim + 1);

    for dim in 0..=tdim {
        let has_nodes = match (dim, degree) {
            (0, _) => true,
            (1, 2) => true,
            (_, 2) => !cell_type.is_simplex(),
            _ => false,
        };
        let mut dofs_for_dim = Vec::new();
        for entity in cell_type.entity_vertices(dim) {
            if has_nodes {
                dofs_for_dim.push(vec![nodes.len()]);
                nodes.push(entity_midpoint(vertices, entity));
            } else {
                dofs_for_dim.push(Vec::new());
            }
        }
        entity_dofs.push(dofs_for_dim);
    }

    (nodes, entity_dofs)
}
