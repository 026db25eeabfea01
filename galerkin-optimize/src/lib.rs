/// Nonlinear problem abstraction and a closure-based builder
pub mod problem;
/// Newton's method with explicit terminal states
pub mod newton;

mod cancel;

pub use cancel::CancellationToken;
