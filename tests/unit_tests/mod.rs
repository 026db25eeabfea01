use galerkin::assembly::local::{LaplaceKernel, SourceKernel};
use galerkin::{Form, FormBuilder, FunctionSpace};
use std::sync::Arc;

mod assembly;
mod bc;
mod config;
mod dofmap;
mod newton;
mod poisson;

/// The stiffness form `int grad u . grad v` and the load form `int f v`.
fn poisson_forms(space: &Arc<FunctionSpace<f64>>, f: fn(&[f64]) -> f64) -> (Form<f64>, Form<f64>) {
    let a = FormBuilder::bilinear(space.clone(), space.clone())
        .cell_integral(LaplaceKernel::default())
        .build()
        .unwrap();
    let l = FormBuilder::linear(space.clone())
        .cell_integral(SourceKernel::new(move |x: &[f64], _| f(x)))
        .build()
        .unwrap();
    (a, l)
}
