use crate::assembly::buffers::EntityValues;
use crate::assembly::local::LocalKernel;
use crate::Real;
use nalgebra::DMatrixViewMut;
use std::fmt;
use std::fmt::Debug;
use std::marker::PhantomData;

/// The load vector `int f . v` of a source function `f(x, component)`.
///
/// On exterior facets this is a Neumann (traction) term.
pub struct SourceKernel<T, F> {
    source: F,
    marker: PhantomData<fn() -> T>,
}

impl<T, F> SourceKernel<T, F>
where
    T: Real,
    F: Fn(&[T], usize) -> T + Send + Sync,
{
    pub fn new(source: F) -> Self {
        Self {
            source,
            marker: PhantomData,
        }
    }
}

impl<T, F> Debug for SourceKernel<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceKernel").finish_non_exhaustive()
    }
}

/// A source kernel for a constant scalar source.
pub fn constant_source<T: Real>(value: T) -> SourceKernel<T, impl Fn(&[T], usize) -> T + Send + Sync> {
    SourceKernel::new(move |_: &[T], _: usize| value)
}

impl<T, F> LocalKernel<T> for SourceKernel<T, F>
where
    T: Real,
    F: Fn(&[T], usize) -> T + Send + Sync,
{
    fn tabulate(&self, values: &EntityValues<T>, mut output: DMatrixViewMut<T>) -> eyre::Result<()> {
        let test = values.test();
        let bs = test.block_size();
        let mut f = vec![T::zero(); bs];
        for (q, &w) in values.weights().iter().enumerate() {
            let x = values.point(q);
            for (c, f_c) in f.iter_mut().enumerate() {
                *f_c = (self.source)(x, c);
            }
            for i in 0..test.num_functions() {
                let phi_i = test.value(q, i);
                for c in 0..bs {
                    output[(bs * i + c, 0)] += w * f[c] * phi_i;
                }
            }
        }
        Ok(())
    }
}
