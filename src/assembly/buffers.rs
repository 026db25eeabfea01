//! Buffers holding basis, geometry and coefficient data at the quadrature points of one
//! integration entity.
use crate::element::FiniteElement;
use crate::geometry::{pseudo_determinant, pseudo_inverse};
use crate::quadrature::QuadratureRule;
use crate::Real;
use eyre::eyre;
use nalgebra::DMatrix;

/// Where an integral is evaluated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IntegralType {
    Cell,
    ExteriorFacet,
}

/// Reference basis values and gradients of one element at the points of one rule.
#[derive(Debug, Clone)]
pub(crate) struct ReferenceTable<T> {
    num_functions: usize,
    tdim: usize,
    /// `[q * n + j]`
    values: Vec<T>,
    /// `[(q * n + j) * tdim + k]`
    gradients: Vec<T>,
}

impl<T: Real> ReferenceTable<T> {
    pub fn tabulate(element: &FiniteElement<T>, rule: &QuadratureRule<T>) -> Self {
        let n = element.num_dofs();
        let tdim = element.reference_dim();
        let mut values = vec![T::zero(); rule.num_points() * n];
        let mut gradients = Vec::with_capacity(rule.num_points() * n * tdim);
        let mut gradient_buffer = DMatrix::zeros(tdim, n);
        for (q, xi) in rule.points().enumerate() {
            element.evaluate_basis(xi, &mut values[q * n..(q + 1) * n]);
            element.evaluate_gradients(xi, (&mut gradient_buffer).into());
            // Column-major storage makes each column one basis gradient
            gradients.extend_from_slice(gradient_buffer.as_slice());
        }
        Self {
            num_functions: n,
            tdim,
            values,
            gradients,
        }
    }

    fn value(&self, q: usize, j: usize) -> T {
        self.values[q * self.num_functions + j]
    }

    fn gradient(&self, q: usize, j: usize) -> &[T] {
        let start = (q * self.num_functions + j) * self.tdim;
        &self.gradients[start..start + self.tdim]
    }
}

/// Everything that is known about a point set before the entity is: the reference rule, the
/// facet mapping and the reference tables of all elements involved.
#[derive(Debug, Clone)]
pub(crate) struct PointSetTables<T> {
    pub rule: QuadratureRule<T>,
    /// Facet parametrization in cell reference coordinates, for facet point sets.
    pub reference_jacobian: Option<DMatrix<T>>,
    pub reference_normal: Option<Vec<T>>,
    pub coordinate: ReferenceTable<T>,
    pub test: Option<ReferenceTable<T>>,
    pub trial: Option<ReferenceTable<T>>,
    pub coefficients: Vec<ReferenceTable<T>>,
}

/// Basis functions of a (possibly blocked) space at the quadrature points of an entity.
#[derive(Debug, Clone)]
pub struct BasisValues<T> {
    num_functions: usize,
    block_size: usize,
    gdim: usize,
    /// `[q * n + j]`
    values: Vec<T>,
    /// `[(q * n + j) * gdim + d]`
    gradients: Vec<T>,
}

impl<T: Real> Default for BasisValues<T> {
    fn default() -> Self {
        Self {
            num_functions: 0,
            block_size: 1,
            gdim: 0,
            values: Vec::new(),
            gradients: Vec::new(),
        }
    }
}

/// One (blocked) basis function at one quadrature point.
///
/// Local DOF `dof = block_size * node + component` is the scalar basis function `node` in
/// component `component` and zero in all other components.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Shape<'a, T> {
    pub dof: usize,
    pub node: usize,
    pub component: usize,
    pub value: T,
    /// Physical gradient of the scalar basis function.
    pub gradient: &'a [T],
}

impl<T: Real> BasisValues<T> {
    /// Number of scalar basis functions.
    pub fn num_functions(&self) -> usize {
        self.num_functions
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of local DOFs including all block components.
    pub fn num_dofs(&self) -> usize {
        self.block_size * self.num_functions
    }

    pub fn value(&self, q: usize, j: usize) -> T {
        self.values[q * self.num_functions + j]
    }

    /// Physical gradient of scalar basis function `j` at point `q`.
    pub fn gradient(&self, q: usize, j: usize) -> &[T] {
        let start = (q * self.num_functions + j) * self.gdim;
        &self.gradients[start..start + self.gdim]
    }

    pub fn shape(&self, q: usize, dof: usize) -> Shape<'_, T> {
        let node = dof / self.block_size;
        Shape {
            dof,
            node,
            component: dof % self.block_size,
            value: self.value(q, node),
            gradient: self.gradient(q, node),
        }
    }

    pub fn shapes(&self, q: usize) -> impl '_ + Iterator<Item = Shape<'_, T>> {
        (0..self.num_dofs()).map(move |dof| self.shape(q, dof))
    }

    fn clear(&mut self) {
        self.num_functions = 0;
        self.values.clear();
        self.gradients.clear();
    }

    fn populate(&mut self, table: &ReferenceTable<T>, block_size: usize, inverse_jacobians: &[DMatrix<T>], gdim: usize) {
        let n = table.num_functions;
        self.num_functions = n;
        self.block_size = block_size;
        self.gdim = gdim;
        self.values.clear();
        self.values.extend_from_slice(&table.values);
        self.gradients.clear();
        for (q, k) in inverse_jacobians.iter().enumerate() {
            for j in 0..n {
                let reference_gradient = table.gradient(q, j);
                for d in 0..gdim {
                    let mut g = T::zero();
                    for (r, &dphi) in reference_gradient.iter().enumerate() {
                        g += k[(r, d)] * dphi;
                    }
                    self.gradients.push(g);
                }
            }
        }
    }
}

/// A coefficient function evaluated at the quadrature points of an entity.
#[derive(Debug, Clone)]
pub struct CoefficientValues<T> {
    block_size: usize,
    gdim: usize,
    local_dofs: Vec<T>,
    /// `[q * bs + c]`
    values: Vec<T>,
    /// `[(q * bs + c) * gdim + d]`
    gradients: Vec<T>,
}

impl<T> Default for CoefficientValues<T> {
    fn default() -> Self {
        Self {
            block_size: 1,
            gdim: 0,
            local_dofs: Vec::new(),
            values: Vec::new(),
            gradients: Vec::new(),
        }
    }
}

impl<T: Real> CoefficientValues<T> {
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Components of the value at point `q`.
    pub fn value(&self, q: usize) -> &[T] {
        &self.values[q * self.block_size..(q + 1) * self.block_size]
    }

    /// Physical gradient of component `c` at point `q`.
    pub fn gradient(&self, q: usize, c: usize) -> &[T] {
        let start = (q * self.block_size + c) * self.gdim;
        &self.gradients[start..start + self.gdim]
    }

    /// Coefficients of the function's local basis functions on the cell.
    pub fn local_dofs(&self) -> &[T] {
        &self.local_dofs
    }

    pub(crate) fn local_dofs_mut(&mut self) -> &mut Vec<T> {
        &mut self.local_dofs
    }

    fn populate(&mut self, basis: &BasisValues<T>, num_points: usize) {
        let bs = basis.block_size;
        let gdim = basis.gdim;
        self.block_size = bs;
        self.gdim = gdim;
        self.values.clear();
        self.values.resize(num_points * bs, T::zero());
        self.gradients.clear();
        self.gradients.resize(num_points * bs * gdim, T::zero());
        for q in 0..num_points {
            for j in 0..basis.num_functions {
                let phi = basis.value(q, j);
                let grad_phi = basis.gradient(q, j);
                for c in 0..bs {
                    let u = self.local_dofs[bs * j + c];
                    self.values[q * bs + c] += u * phi;
                    let start = (q * bs + c) * gdim;
                    for (g, &dphi) in self.gradients[start..start + gdim].iter_mut().zip(grad_phi) {
                        *g += u * dphi;
                    }
                }
            }
        }
    }
}

/// The data of one integration entity at its quadrature points, as seen by a local kernel.
#[derive(Debug, Clone)]
pub struct EntityValues<T> {
    integral_type: IntegralType,
    cell: usize,
    entity: usize,
    local_facet: Option<usize>,
    gdim: usize,
    num_points: usize,
    /// `[q * gdim + d]`
    points: Vec<T>,
    /// Quadrature weights scaled by the measure of the mapping.
    weights: Vec<T>,
    /// `[q * gdim + d]`, facets only.
    normals: Vec<T>,
    test: BasisValues<T>,
    trial: BasisValues<T>,
    coefficients: Vec<CoefficientValues<T>>,
    // Per-point scratch
    inverse_jacobians: Vec<DMatrix<T>>,
    coefficient_basis: BasisValues<T>,
}

impl<T: Real> Default for EntityValues<T> {
    fn default() -> Self {
        Self {
            integral_type: IntegralType::Cell,
            cell: 0,
            entity: 0,
            local_facet: None,
            gdim: 0,
            num_points: 0,
            points: Vec::new(),
            weights: Vec::new(),
            normals: Vec::new(),
            test: BasisValues::default(),
            trial: BasisValues::default(),
            coefficients: Vec::new(),
            inverse_jacobians: Vec::new(),
            coefficient_basis: BasisValues::default(),
        }
    }
}

/// Quadrature point data handed to pointwise integrands.
#[derive(Debug, Copy, Clone)]
pub struct PointValues<'a, T> {
    pub index: usize,
    /// Physical coordinates.
    pub x: &'a [T],
    /// Outward unit normal on exterior facets.
    pub normal: Option<&'a [T]>,
    coefficients: &'a [CoefficientValues<T>],
}

impl<'a, T: Real> PointValues<'a, T> {
    /// Value of coefficient `i`.
    pub fn coefficient(&self, i: usize) -> &'a [T] {
        self.coefficients[i].value(self.index)
    }

    /// Gradient of component `c` of coefficient `i`.
    pub fn coefficient_gradient(&self, i: usize, c: usize) -> &'a [T] {
        self.coefficients[i].gradient(self.index, c)
    }
}

impl<T: Real> EntityValues<T> {
    pub fn integral_type(&self) -> IntegralType {
        self.integral_type
    }

    /// The cell the entity belongs to. For facets, the unique cell attached to the facet.
    pub fn cell(&self) -> usize {
        self.cell
    }

    /// Mesh index of the integration entity (cell or facet).
    pub fn entity(&self) -> usize {
        self.entity
    }

    pub fn local_facet(&self) -> Option<usize> {
        self.local_facet
    }

    pub fn gdim(&self) -> usize {
        self.gdim
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn point(&self, q: usize) -> &[T] {
        &self.points[q * self.gdim..(q + 1) * self.gdim]
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn normal(&self, q: usize) -> Option<&[T]> {
        match self.integral_type {
            IntegralType::Cell => None,
            IntegralType::ExteriorFacet => Some(&self.normals[q * self.gdim..(q + 1) * self.gdim]),
        }
    }

    /// Test basis, empty for functionals.
    pub fn test(&self) -> &BasisValues<T> {
        &self.test
    }

    /// Trial basis, empty for functionals and linear forms.
    pub fn trial(&self) -> &BasisValues<T> {
        &self.trial
    }

    pub fn coefficient(&self, i: usize) -> &CoefficientValues<T> {
        &self.coefficients[i]
    }

    pub fn num_coefficients(&self) -> usize {
        self.coefficients.len()
    }

    pub fn point_values(&self, q: usize) -> PointValues<'_, T> {
        PointValues {
            index: q,
            x: self.point(q),
            normal: self.normal(q),
            coefficients: &self.coefficients,
        }
    }

    pub(crate) fn begin(
        &mut self,
        integral_type: IntegralType,
        entity: usize,
        cell: usize,
        local_facet: Option<usize>,
        num_coefficients: usize,
    ) {
        self.integral_type = integral_type;
        self.entity = entity;
        self.cell = cell;
        self.local_facet = local_facet;
        self.coefficients.resize_with(num_coefficients, Default::default);
    }

    pub(crate) fn coefficient_mut(&mut self, i: usize) -> &mut CoefficientValues<T> {
        &mut self.coefficients[i]
    }

    /// Computes the geometry of the entity and all basis and coefficient values.
    ///
    /// The local DOFs of the coefficients must be set beforehand. `block_sizes` holds the block
    /// sizes of the test space, the trial space and the coefficient spaces, in that order.
    pub(crate) fn populate(
        &mut self,
        tables: &PointSetTables<T>,
        cell_coordinates: &DMatrix<T>,
        block_sizes: &[usize],
    ) -> eyre::Result<()> {
        let gdim = cell_coordinates.ncols();
        let num_points = tables.rule.num_points();
        let num_vertices = cell_coordinates.nrows();
        self.gdim = gdim;
        self.num_points = num_points;
        self.points.clear();
        self.weights.clear();
        self.normals.clear();
        self.inverse_jacobians.clear();

        let tdim = tables.coordinate.tdim;
        for (q, &w) in tables.rule.weights().iter().enumerate() {
            let mut jacobian = DMatrix::zeros(gdim, tdim);
            for d in 0..gdim {
                let mut x = T::zero();
                for v in 0..num_vertices {
                    let x_v = cell_coordinates[(v, d)];
                    x += tables.coordinate.value(q, v) * x_v;
                    for (k, &dpsi) in tables.coordinate.gradient(q, v).iter().enumerate() {
                        jacobian[(d, k)] += x_v * dpsi;
                    }
                }
                self.points.push(x);
            }

            let inverse = pseudo_inverse(&jacobian)
                .ok_or_else(|| eyre!("Degenerate geometry in cell {}", self.cell))?;
            let measure = match &tables.reference_jacobian {
                Some(facet_jacobian) => pseudo_determinant(&(&jacobian * facet_jacobian)),
                None => pseudo_determinant(&jacobian),
            };
            if !(measure > T::zero()) {
                return Err(eyre!("Degenerate geometry in cell {}", self.cell));
            }
            self.weights.push(w * measure);

            if let Some(reference_normal) = &tables.reference_normal {
                let mut normal = vec![T::zero(); gdim];
                for (d, n_d) in normal.iter_mut().enumerate() {
                    for (k, &n_ref) in reference_normal.iter().enumerate() {
                        *n_d += inverse[(k, d)] * n_ref;
                    }
                }
                let length = normal.iter().fold(T::zero(), |acc, &n| acc + n * n).sqrt();
                self.normals.extend(normal.into_iter().map(|n| n / length));
            }
            self.inverse_jacobians.push(inverse);
        }

        let mut block_sizes = block_sizes.iter().copied();
        let mut next_block_size = || block_sizes.next().expect("Block size must be given for every space");
        match &tables.test {
            Some(table) => self
                .test
                .populate(table, next_block_size(), &self.inverse_jacobians, gdim),
            None => self.test.clear(),
        }
        match &tables.trial {
            Some(table) => self
                .trial
                .populate(table, next_block_size(), &self.inverse_jacobians, gdim),
            None => self.trial.clear(),
        }
        for (i, table) in tables.coefficients.iter().enumerate() {
            self.coefficient_basis
                .populate(table, next_block_size(), &self.inverse_jacobians, gdim);
            self.coefficients[i].populate(&self.coefficient_basis, num_points);
        }
        Ok(())
    }
}
