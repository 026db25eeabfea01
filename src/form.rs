//! Variational forms: integrals of local kernels over cells and exterior facets.
use crate::assembly::buffers::{PointSetTables, ReferenceTable};
use crate::assembly::local::LocalKernel;
use crate::error::{Error, Result};
use crate::geometry::CoordinateMap;
use crate::mesh::{Mesh, MeshTags};
use crate::quadrature::{facet_quadratures, QuadratureRule};
use crate::space::FunctionSpace;
use crate::Real;
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

pub use crate::assembly::buffers::IntegralType;

/// One integral of a form: a kernel, the entities it is evaluated on and the quadrature
/// tables it is evaluated with.
pub struct Integral<T: Real> {
    integral_type: IntegralType,
    /// Cells or exterior facets, in ascending order.
    entities: Vec<usize>,
    kernel: Arc<dyn LocalKernel<T>>,
    quadrature_degree: usize,
    /// One point set for cell integrals, one per local facet for facet integrals.
    point_sets: Vec<PointSetTables<T>>,
}

impl<T: Real> Debug for Integral<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Integral")
            .field("integral_type", &self.integral_type)
            .field("num_entities", &self.entities.len())
            .field("quadrature_degree", &self.quadrature_degree)
            .finish_non_exhaustive()
    }
}

impl<T: Real> Integral<T> {
    pub fn integral_type(&self) -> IntegralType {
        self.integral_type
    }

    pub fn entities(&self) -> &[usize] {
        &self.entities
    }

    pub fn kernel(&self) -> &dyn LocalKernel<T> {
        &*self.kernel
    }

    pub fn quadrature_degree(&self) -> usize {
        self.quadrature_degree
    }

    pub(crate) fn point_set(&self, local_facet: Option<usize>) -> &PointSetTables<T> {
        &self.point_sets[local_facet.unwrap_or(0)]
    }
}

/// A form of rank 0 (functional), 1 (linear form) or 2 (bilinear form).
///
/// Coefficient functions are not stored in the form. Functions for the coefficient slots are
/// passed to the assembler in slot order.
#[derive(Debug)]
pub struct Form<T: Real> {
    mesh: Arc<Mesh<T>>,
    test_space: Option<Arc<FunctionSpace<T>>>,
    trial_space: Option<Arc<FunctionSpace<T>>>,
    coefficient_spaces: Vec<Arc<FunctionSpace<T>>>,
    integrals: Vec<Integral<T>>,
}

impl<T: Real> Form<T> {
    pub fn rank(&self) -> usize {
        match (&self.test_space, &self.trial_space) {
            (None, _) => 0,
            (Some(_), None) => 1,
            (Some(_), Some(_)) => 2,
        }
    }

    pub fn mesh(&self) -> &Arc<Mesh<T>> {
        &self.mesh
    }

    pub fn test_space(&self) -> Option<&Arc<FunctionSpace<T>>> {
        self.test_space.as_ref()
    }

    pub fn trial_space(&self) -> Option<&Arc<FunctionSpace<T>>> {
        self.trial_space.as_ref()
    }

    pub fn coefficient_spaces(&self) -> &[Arc<FunctionSpace<T>>] {
        &self.coefficient_spaces
    }

    pub fn num_coefficients(&self) -> usize {
        self.coefficient_spaces.len()
    }

    pub fn integrals(&self) -> &[Integral<T>] {
        &self.integrals
    }

    /// Test, trial and coefficient spaces, in that order.
    pub(crate) fn spaces(&self) -> impl Iterator<Item = &Arc<FunctionSpace<T>>> {
        self.test_space
            .iter()
            .chain(self.trial_space.iter())
            .chain(self.coefficient_spaces.iter())
    }
}

enum Domain {
    All,
    Tagged { dim: usize, entities: Vec<usize> },
}

struct PendingIntegral<T: Real> {
    integral_type: IntegralType,
    domain: Domain,
    kernel: Arc<dyn LocalKernel<T>>,
    quadrature_degree: Option<usize>,
}

/// Builds a [`Form`].
///
/// ```ignore
/// let a = FormBuilder::bilinear(space.clone(), space.clone())
///     .cell_integral(LaplaceKernel::default())
///     .build()?;
/// ```
pub struct FormBuilder<T: Real> {
    mesh: Arc<Mesh<T>>,
    test_space: Option<Arc<FunctionSpace<T>>>,
    trial_space: Option<Arc<FunctionSpace<T>>>,
    coefficient_spaces: Vec<Arc<FunctionSpace<T>>>,
    integrals: Vec<PendingIntegral<T>>,
    default_quadrature_degree: Option<usize>,
}

impl<T: Real> FormBuilder<T> {
    pub fn functional(mesh: Arc<Mesh<T>>) -> Self {
        Self {
            mesh,
            test_space: None,
            trial_space: None,
            coefficient_spaces: Vec::new(),
            integrals: Vec::new(),
            default_quadrature_degree: None,
        }
    }

    pub fn linear(test_space: Arc<FunctionSpace<T>>) -> Self {
        Self {
            test_space: Some(test_space.clone()),
            ..Self::functional(test_space.mesh().clone())
        }
    }

    pub fn bilinear(test_space: Arc<FunctionSpace<T>>, trial_space: Arc<FunctionSpace<T>>) -> Self {
        Self {
            trial_space: Some(trial_space),
            ..Self::linear(test_space)
        }
    }

    /// Appends a coefficient slot.
    pub fn with_coefficient(mut self, space: Arc<FunctionSpace<T>>) -> Self {
        self.coefficient_spaces.push(space);
        self
    }

    /// Integrates the kernel over all cells.
    pub fn cell_integral(self, kernel: impl LocalKernel<T> + 'static) -> Self {
        self.push_integral(IntegralType::Cell, Domain::All, Arc::new(kernel))
    }

    /// Integrates the kernel over the cells tagged with `value`.
    pub fn cell_integral_on(self, kernel: impl LocalKernel<T> + 'static, tags: &MeshTags, value: i32) -> Self {
        let domain = Domain::Tagged {
            dim: tags.dim(),
            entities: tags.find(value),
        };
        self.push_integral(IntegralType::Cell, domain, Arc::new(kernel))
    }

    /// Integrates the kernel over all exterior facets.
    pub fn exterior_facet_integral(self, kernel: impl LocalKernel<T> + 'static) -> Self {
        self.push_integral(IntegralType::ExteriorFacet, Domain::All, Arc::new(kernel))
    }

    /// Integrates the kernel over the exterior facets tagged with `value`. Tagged interior
    /// facets are ignored.
    pub fn exterior_facet_integral_on(self, kernel: impl LocalKernel<T> + 'static, tags: &MeshTags, value: i32) -> Self {
        let domain = Domain::Tagged {
            dim: tags.dim(),
            entities: tags.find(value),
        };
        self.push_integral(IntegralType::ExteriorFacet, domain, Arc::new(kernel))
    }

    /// Adds an integral with a shared kernel.
    pub fn integral_with_shared_kernel(self, integral_type: IntegralType, kernel: Arc<dyn LocalKernel<T>>) -> Self {
        self.push_integral(integral_type, Domain::All, kernel)
    }

    /// Sets the quadrature degree of the most recently added integral. Before any integral is
    /// added, sets the degree used by all integrals that do not set their own.
    ///
    /// By default, the degree is the sum of the degrees of the test, trial and coefficient
    /// elements, and at least one.
    pub fn with_quadrature_degree(mut self, degree: usize) -> Self {
        match self.integrals.last_mut() {
            Some(integral) => integral.quadrature_degree = Some(degree),
            None => self.default_quadrature_degree = Some(degree),
        }
        self
    }

    fn push_integral(mut self, integral_type: IntegralType, domain: Domain, kernel: Arc<dyn LocalKernel<T>>) -> Self {
        self.integrals.push(PendingIntegral {
            integral_type,
            domain,
            kernel,
            quadrature_degree: None,
        });
        self
    }

    pub fn build(self) -> Result<Form<T>> {
        let mesh = self.mesh;
        let topology = mesh.topology();
        let tdim = mesh.tdim();

        let spaces = self
            .test_space
            .iter()
            .chain(self.trial_space.iter())
            .chain(self.coefficient_spaces.iter());
        for space in spaces.clone() {
            if !Arc::ptr_eq(space.mesh(), &mesh) {
                return Err(Error::dimension_mismatch("All spaces of a form must share the same mesh"));
            }
        }

        let default_degree = self.default_quadrature_degree.unwrap_or_else(|| {
            spaces
                .clone()
                .map(|space| space.element().degree())
                .sum::<usize>()
                .max(1)
        });

        let coordinate_map = CoordinateMap::<T>::new(mesh.cell_type())?;
        let tabulate = |rule: QuadratureRule<T>, facet: Option<(nalgebra::DMatrix<T>, Vec<T>)>| {
            let table = |space: &Arc<FunctionSpace<T>>| ReferenceTable::tabulate(space.element(), &rule);
            let (reference_jacobian, reference_normal) = match facet {
                Some((jacobian, normal)) => (Some(jacobian), Some(normal)),
                None => (None, None),
            };
            PointSetTables {
                coordinate: ReferenceTable::tabulate(coordinate_map.element(), &rule),
                test: self.test_space.as_ref().map(table),
                trial: self.trial_space.as_ref().map(table),
                coefficients: self.coefficient_spaces.iter().map(table).collect(),
                reference_jacobian,
                reference_normal,
                rule,
            }
        };

        let mut integrals = Vec::with_capacity(self.integrals.len());
        for pending in self.integrals {
            let quadrature_degree = pending.quadrature_degree.unwrap_or(default_degree);
            let (entity_dim, all_entities) = match pending.integral_type {
                IntegralType::Cell => (tdim, (0..mesh.num_cells()).collect()),
                IntegralType::ExteriorFacet => (tdim - 1, topology.boundary_facets()),
            };

            let entities = match pending.domain {
                Domain::All => all_entities,
                Domain::Tagged { dim, mut entities } => {
                    if dim != entity_dim {
                        return Err(Error::dimension_mismatch(format!(
                            "{:?} integral requires tags of dimension {}, but tags have dimension {}",
                            pending.integral_type, entity_dim, dim
                        )));
                    }
                    let num_entities = topology.num_entities(dim);
                    if let Some(&index) = entities.iter().find(|&&e| e >= num_entities) {
                        return Err(Error::InvalidEntity {
                            dim,
                            index,
                            num_entities,
                        });
                    }
                    if pending.integral_type == IntegralType::ExteriorFacet {
                        entities.retain(|&facet| topology.facet_cells(facet).len() == 1);
                    }
                    entities
                }
            };

            let point_sets = match pending.integral_type {
                IntegralType::Cell => vec![tabulate(
                    QuadratureRule::for_cell(mesh.cell_type(), quadrature_degree),
                    None,
                )],
                IntegralType::ExteriorFacet => facet_quadratures(mesh.cell_type(), quadrature_degree)
                    .into_iter()
                    .map(|facet| tabulate(facet.rule, Some((facet.reference_jacobian, facet.reference_normal))))
                    .collect(),
            };

            integrals.push(Integral {
                integral_type: pending.integral_type,
                entities,
                kernel: pending.kernel,
                quadrature_degree,
                point_sets,
            });
        }

        Ok(Form {
            mesh,
            test_space: self.test_space,
            trial_space: self.trial_space,
            coefficient_spaces: self.coefficient_spaces,
            integrals,
        })
    }
}
