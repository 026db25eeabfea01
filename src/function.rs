//! Finite element functions: coefficient vectors interpreted through a function space.
use crate::error::{Error, Result};
use crate::space::FunctionSpace;
use crate::Real;
use nalgebra::DVector;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Function<T: Real> {
    space: Arc<FunctionSpace<T>>,
    values: DVector<T>,
}

impl<T: Real> Function<T> {
    /// The zero function.
    pub fn new(space: Arc<FunctionSpace<T>>) -> Self {
        let values = DVector::zeros(space.num_dofs());
        Self { space, values }
    }

    pub fn from_vector(space: Arc<FunctionSpace<T>>, values: DVector<T>) -> Result<Self> {
        if values.len() != space.num_dofs() {
            return Err(Error::dimension_mismatch(format!(
                "Function space has {} DOFs, but {} values were given",
                space.num_dofs(),
                values.len()
            )));
        }
        Ok(Self { space, values })
    }

    pub fn space(&self) -> &Arc<FunctionSpace<T>> {
        &self.space
    }

    pub fn values(&self) -> &DVector<T> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DVector<T> {
        &mut self.values
    }

    pub fn into_values(self) -> DVector<T> {
        self.values
    }

    /// Sets the coefficients of a scalar function to the values of `f` at the nodes.
    pub fn interpolate(&mut self, f: impl Fn(&[T]) -> T) -> Result<()> {
        if self.space.block_size() != 1 {
            return Err(Error::dimension_mismatch(format!(
                "Scalar interpolation into a space with block size {}",
                self.space.block_size()
            )));
        }
        self.interpolate_vector(|x, value| value[0] = f(x));
        Ok(())
    }

    /// Sets the coefficients to the values of `f` at the nodes. `f` writes all block
    /// components of the value at `x` into its second argument.
    pub fn interpolate_vector(&mut self, f: impl Fn(&[T], &mut [T])) {
        let bs = self.space.block_size();
        let coordinates = self.space.tabulate_dof_coordinates();
        let mut x = vec![T::zero(); coordinates.ncols()];
        let mut value = vec![T::zero(); bs];
        for node in 0..coordinates.nrows() {
            for (d, x_d) in x.iter_mut().enumerate() {
                *x_d = coordinates[(node, d)];
            }
            f(&x, &mut value);
            for (c, &v) in value.iter().enumerate() {
                self.values[bs * node + c] = v;
            }
        }
    }

    /// Evaluates the function at a physical point.
    ///
    /// Returns the block components of the value, or `None` if the point lies outside the
    /// mesh. Where cells meet, the value in the lowest-indexed containing cell is returned.
    pub fn eval(&self, x: &[T]) -> Option<Vec<T>> {
        let (cell, xi) = self.space.mesh().locate_point(x)?;
        let element = self.space.element();
        let bs = self.space.block_size();
        let mut phi = vec![T::zero(); element.num_dofs()];
        element.evaluate_basis(&xi, &mut phi);

        let mut value = vec![T::zero(); bs];
        for (&node, &phi_i) in self.space.dofmap().cell_nodes(cell).iter().zip(&phi) {
            for (c, v) in value.iter_mut().enumerate() {
                *v += phi_i * self.values[bs * node + c];
            }
        }
        Some(value)
    }
}
