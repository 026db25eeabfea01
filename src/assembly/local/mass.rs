use crate::assembly::buffers::EntityValues;
use crate::assembly::local::LocalKernel;
use crate::Real;
use eyre::eyre;
use nalgebra::DMatrixViewMut;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A wrapper type for a number that represents a *density*.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Density<T>(pub T);

impl<T: Display> Display for Density<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Density({})", self.0)
    }
}

/// The consistent mass matrix `int rho u v`, with the block components decoupled.
///
/// Works for cell and exterior facet integrals alike.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MassKernel<T> {
    pub density: Density<T>,
}

impl<T: Real> Default for MassKernel<T> {
    fn default() -> Self {
        Self {
            density: Density(T::one()),
        }
    }
}

impl<T: Real> MassKernel<T> {
    pub fn with_density(density: T) -> Self {
        Self {
            density: Density(density),
        }
    }
}

impl<T: Real> LocalKernel<T> for MassKernel<T> {
    fn tabulate(&self, values: &EntityValues<T>, mut output: DMatrixViewMut<T>) -> eyre::Result<()> {
        let test = values.test();
        let trial = values.trial();
        if test.block_size() != trial.block_size() {
            return Err(eyre!("Mass kernel requires test and trial spaces of equal block size"));
        }
        let bs = test.block_size();
        let rho = self.density.0;

        for (q, &w) in values.weights().iter().enumerate() {
            for i in 0..test.num_functions() {
                let phi_i = test.value(q, i);
                for j in 0..trial.num_functions() {
                    let contribution = w * rho * phi_i * trial.value(q, j);
                    for c in 0..bs {
                        output[(bs * i + c, bs * j + c)] += contribution;
                    }
                }
            }
        }
        Ok(())
    }
}
