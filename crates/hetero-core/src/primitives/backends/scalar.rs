//! Scalar backend implementation

use crate::numeric::KernelFloat;
use crate::primitives::ComputePrimitives;

/// Scalar backend - portable, always available
#[derive(Clone, Copy, Debug, Default)]
pub struct ScalarBackend;

impl ScalarBackend {
    pub fn new() -> Self {
        Self
    }
}

impl<T: KernelFloat> ComputePrimitives<T> for ScalarBackend {
    fn backend_name(&self) -> &'static str {
        "scalar"
    }
}
