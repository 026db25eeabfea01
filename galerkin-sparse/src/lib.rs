//! Sparse linear algebra for `galerkin`.
//!
//! The finite element core depends on an external *linear-solve capability*, represented here
//! by the [`LinearSolver`] trait. Two implementations ship with the crate: a dense LU
//! factorization for small or non-symmetric systems, and a (Jacobi-preconditioned) conjugate
//! gradient method for symmetric positive definite systems.
pub mod cg;
pub mod lu;
pub mod operator;

mod solver;

pub use cg::ConjugateGradient;
pub use lu::DenseLu;
pub use operator::{IdentityOperator, JacobiPreconditioner, LinearOperator};
pub use solver::*;

pub extern crate nalgebra_sparse;
