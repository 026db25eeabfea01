use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A flag shared between a solver and a controller that may ask the solver to stop.
///
/// The solver checks the flag at the start of every iteration, so cancellation takes
/// effect at the next iteration boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clears the flag so that the token can be reused for another solve.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}
