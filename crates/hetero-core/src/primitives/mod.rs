//! CPU compute primitives with per-variant backends
//!
//! CPU-resident kernels are written against [`ComputePrimitives`] and receive a
//! concrete backend chosen from the container's [`CpuVariant`]:
//!
//! - `ScalarBackend` for [`CpuVariant::Generic`]
//! - `Avx2Backend` for [`CpuVariant::Avx2`] (x86_64, `avx2` feature)
//!
//! ```rust
//! use hetero_core::{ComputePrimitives, ScalarBackend};
//!
//! let backend = ScalarBackend::new();
//! let mut y = vec![0.0f64; 3];
//! ComputePrimitives::<f64>::axpy(&backend, 2.0, &[1.0, 2.0, 3.0], &mut y);
//! assert_eq!(y, vec![2.0, 4.0, 6.0]);
//! ```

pub mod backends;
pub mod traits;

pub use backends::{Avx2Backend, ScalarBackend};
pub use traits::{ComputePrimitives, Transpose};

use crate::capability::CpuVariant;

/// Name of the backend a CPU variant maps to on this build
pub fn backend_name_for(variant: CpuVariant) -> &'static str {
    match variant {
        CpuVariant::Avx2 if Avx2Backend::is_available() => "avx2",
        _ => "scalar",
    }
}
