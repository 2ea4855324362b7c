//! Reference linear-algebra kernels on an execution context
//!
//! Each call resolves a cache key from a fixed prefix and the working
//! precision, builds the `blas` program through a fresh kernel factory
//! session, binds its arguments and launches. Statuses from build and launch
//! are returned unchanged.

mod axpy;
mod gemm;

pub use axpy::ReferenceAxpy;
pub use gemm::ReferenceGemm;
pub use hetero_core::Transpose;

use hetero_core::{Error, Precision, Result};

/// Cache-key prefix of the GEMM program
pub const GEMM_CACHE_PREFIX: &str = "__blas_gemm";
/// Cache-key prefix of the AXPY program
pub const AXPY_CACHE_PREFIX: &str = "__blas_axpy";

/// GEMM variant that writes C without reading it (`beta == 0`)
pub const GEMM_OVERWRITE_KERNEL: &str = "blas_gemm_overwrite";
/// GEMM variant that scales and accumulates into C
pub const GEMM_ACCUMULATE_KERNEL: &str = "blas_gemm_accumulate";
/// AXPY entry point
pub const AXPY_KERNEL: &str = "blas_axpy";

/// `<prefix>_<precision tag>`
pub fn cache_key(prefix: &str, precision: Precision) -> String {
    format!("{prefix}_{}", precision.tag())
}

/// Narrow a dimension, stride or offset to a kernel `uint`
fn to_uint(what: &str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        Error::InvalidParameter(format!("{what} = {value} does not fit a 32-bit kernel argument"))
    })
}
