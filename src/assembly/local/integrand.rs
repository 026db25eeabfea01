//! Adapters turning pointwise integrands into local kernels.
//!
//! The integrand is evaluated at every quadrature point (and, for linear and bilinear forms,
//! for every local test and trial DOF), multiplied by the scaled quadrature weight and summed.
use crate::assembly::buffers::{EntityValues, PointValues, Shape};
use crate::assembly::local::LocalKernel;
use crate::Real;
use nalgebra::DMatrixViewMut;
use std::fmt;
use std::fmt::Debug;
use std::marker::PhantomData;

macro_rules! integrand_struct {
    ($name:ident) => {
        pub struct $name<T, F> {
            integrand: F,
            marker: PhantomData<fn() -> T>,
        }

        impl<T, F> $name<T, F> {
            pub fn new(integrand: F) -> Self {
                Self {
                    integrand,
                    marker: PhantomData,
                }
            }
        }

        impl<T, F> Debug for $name<T, F> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

integrand_struct!(FunctionalIntegrand);
integrand_struct!(LinearIntegrand);
integrand_struct!(BilinearIntegrand);

/// `int f(p)` for a functional.
pub fn functional_integrand<T, F>(integrand: F) -> FunctionalIntegrand<T, F>
where
    T: Real,
    F: Fn(&PointValues<T>) -> T + Send + Sync,
{
    FunctionalIntegrand::new(integrand)
}

/// `int f(p, v)` for every test function `v`.
pub fn linear_integrand<T, F>(integrand: F) -> LinearIntegrand<T, F>
where
    T: Real,
    F: Fn(&PointValues<T>, &Shape<T>) -> T + Send + Sync,
{
    LinearIntegrand::new(integrand)
}

/// `int f(p, v, u)` for every test function `v` and trial function `u`.
pub fn bilinear_integrand<T, F>(integrand: F) -> BilinearIntegrand<T, F>
where
    T: Real,
    F: Fn(&PointValues<T>, &Shape<T>, &Shape<T>) -> T + Send + Sync,
{
    BilinearIntegrand::new(integrand)
}

impl<T, F> LocalKernel<T> for FunctionalIntegrand<T, F>
where
    T: Real,
    F: Fn(&PointValues<T>) -> T + Send + Sync,
{
    fn tabulate(&self, values: &EntityValues<T>, mut output: DMatrixViewMut<T>) -> eyre::Result<()> {
        for (q, &w) in values.weights().iter().enumerate() {
            output[(0, 0)] += w * (self.integrand)(&values.point_values(q));
        }
        Ok(())
    }
}

impl<T, F> LocalKernel<T> for LinearIntegrand<T, F>
where
    T: Real,
    F: Fn(&PointValues<T>, &Shape<T>) -> T + Send + Sync,
{
    fn tabulate(&self, values: &EntityValues<T>, mut output: DMatrixViewMut<T>) -> eyre::Result<()> {
        for (q, &w) in values.weights().iter().enumerate() {
            let point = values.point_values(q);
            for v in values.test().shapes(q) {
                output[(v.dof, 0)] += w * (self.integrand)(&point, &v);
            }
        }
        Ok(())
    }
}

impl<T, F> LocalKernel<T> for BilinearIntegrand<T, F>
where
    T: Real,
    F: Fn(&PointValues<T>, &Shape<T>, &Shape<T>) -> T + Send + Sync,
{
    fn tabulate(&self, values: &EntityValues<T>, mut output: DMatrixViewMut<T>) -> eyre::Result<()> {
        for (q, &w) in values.weights().iter().enumerate() {
            let point = values.point_values(q);
            for v in values.test().shapes(q) {
                for u in values.trial().shapes(q) {
                    output[(v.dof, u.dof)] += w * (self.integrand)(&point, &v, &u);
                }
            }
        }
        Ok(())
    }
}

/// Dot product of two gradients.
pub fn dot<T: Real>(a: &[T], b: &[T]) -> T {
    a.iter().zip(b).fold(T::zero(), |acc, (&x, &y)| acc + x * y)
}
