//! Error type shared by the finite element core.
use crate::element::ElementDescription;
use galerkin_sparse::LinearSolveError;
use std::error::Error as StdError;
use std::fmt;
use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Spaces, functions, forms or matrices with incompatible shapes were combined.
    DimensionMismatch(String),
    /// A degree of freedom index is out of range for its function space.
    InvalidDof { dof: usize, num_dofs: usize },
    /// A mesh entity index is out of range.
    InvalidEntity { dim: usize, index: usize, num_entities: usize },
    /// The element description does not name a supported element.
    UnsupportedElement { element: ElementDescription, reason: String },
    /// Mesh input (coordinates or cell connectivity) is inconsistent.
    InvalidMesh(String),
    /// A configuration value could not be honored.
    InvalidConfiguration(String),
    /// The linear solver failed on an assembled system.
    LinearSolveFailure(LinearSolveError),
    /// A local kernel or a user-supplied callback failed.
    Kernel(eyre::Report),
}

impl Error {
    pub(crate) fn dimension_mismatch(message: impl Into<String>) -> Self {
        Self::DimensionMismatch(message.into())
    }

    pub(crate) fn unsupported(element: ElementDescription, reason: impl Into<String>) -> Self {
        Self::UnsupportedElement {
            element,
            reason: reason.into(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch(message) => write!(f, "Dimension mismatch: {}", message),
            Self::InvalidDof { dof, num_dofs } => {
                write!(f, "Invalid DOF {} for space with {} DOFs", dof, num_dofs)
            }
            Self::InvalidEntity {
                dim,
                index,
                num_entities,
            } => write!(
                f,
                "Invalid entity {} of dimension {} (mesh has {} such entities)",
                index, dim, num_entities
            ),
            Self::UnsupportedElement { element, reason } => {
                write!(f, "Unsupported element {}: {}", element, reason)
            }
            Self::InvalidMesh(message) => write!(f, "Invalid mesh: {}", message),
            Self::InvalidConfiguration(message) => write!(f, "Invalid configuration: {}", message),
            Self::LinearSolveFailure(err) => write!(f, "Linear solve failed: {}", err),
            Self::Kernel(err) => write!(f, "Kernel failure: {}", err),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::LinearSolveFailure(err) => Some(err),
            Self::Kernel(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<LinearSolveError> for Error {
    fn from(err: LinearSolveError) -> Self {
        Self::LinearSolveFailure(err)
    }
}
