//! Finite element assembly and nonlinear solves on unstructured meshes.
//!
//! The typical workflow is to build a [`Mesh`](mesh::Mesh), a
//! [`FunctionSpace`](space::FunctionSpace) on it, variational [`Form`](form::Form)s made of
//! local kernels, and then either assemble a linear system with an
//! [`Assembler`](assembly::Assembler) or solve a nonlinear problem with a
//! [`NewtonSolver`](nls::NewtonSolver).
pub mod adjacency;
pub mod assembly;
pub mod bc;
pub mod cell;
pub mod context;
pub mod element;
pub mod error;
pub mod form;
pub mod function;
pub mod geometry;
pub mod mesh;
pub mod nls;
pub mod quadrature;
pub mod space;
pub mod topology;

pub mod optimize {
    pub use galerkin_optimize::*;
}

pub mod sparse {
    pub use galerkin_sparse::*;
}

pub use galerkin_traits::Real;

pub use bc::DirichletBC;
pub use cell::CellType;
pub use context::{Context, ContextConfig};
pub use element::{ElementDescription, ElementFamily};
pub use error::{Error, Result};
pub use form::{Form, FormBuilder};
pub use function::Function;
pub use mesh::{Mesh, MeshTags};
pub use nls::NewtonSolver;
pub use space::FunctionSpace;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
