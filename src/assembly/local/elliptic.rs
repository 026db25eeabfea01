use crate::assembly::buffers::EntityValues;
use crate::assembly::local::LocalKernel;
use crate::Real;
use eyre::eyre;
use nalgebra::DMatrixViewMut;

/// The stiffness matrix of `-div(k grad u)` with constant diffusivity `k`, applied to every
/// block component separately.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LaplaceKernel<T> {
    pub diffusivity: T,
}

impl<T: Real> Default for LaplaceKernel<T> {
    fn default() -> Self {
        Self {
            diffusivity: T::one(),
        }
    }
}

impl<T: Real> LaplaceKernel<T> {
    pub fn with_diffusivity(diffusivity: T) -> Self {
        Self { diffusivity }
    }
}

impl<T: Real> LocalKernel<T> for LaplaceKernel<T> {
    fn tabulate(&self, values: &EntityValues<T>, mut output: DMatrixViewMut<T>) -> eyre::Result<()> {
        let test = values.test();
        let trial = values.trial();
        if test.num_dofs() != trial.num_dofs() || output.nrows() != output.ncols() {
            return Err(eyre!("Laplace kernel requires identical test and trial spaces"));
        }
        let bs = test.block_size();
        let n = test.num_functions();

        for (q, &w) in values.weights().iter().enumerate() {
            let scale = w * self.diffusivity;
            for i in 0..n {
                let grad_i = test.gradient(q, i);
                for j in i..n {
                    let grad_j = trial.gradient(q, j);
                    let contraction = grad_i
                        .iter()
                        .zip(grad_j)
                        .fold(T::zero(), |acc, (&a, &b)| acc + a * b);
                    for c in 0..bs {
                        output[(bs * i + c, bs * j + c)] += scale * contraction;
                    }
                }
            }
        }

        // Mirror the upper triangle
        for i in 0..n * bs {
            for j in 0..i {
                output[(i, j)] = output[(j, i)];
            }
        }
        Ok(())
    }
}
