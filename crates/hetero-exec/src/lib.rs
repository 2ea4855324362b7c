//! Device execution for heterogeneous kernels
//!
//! An [`ExecutionContext`] owns a [`Device`], the kernel sources shipped with
//! the crate and a compiled-program cache. Kernels are compiled on first use
//! under a `<prefix>_<precision>` cache key, looked up through a
//! [`KernelFactory`] session and launched over a [`KernelRange`] with
//! positionally bound [`KernelArguments`].
//!
//! The [`HostDevice`] is the reference backend: it validates device source,
//! maps each entry point to native code and runs launches synchronously.
//!
//! # Example
//!
//! ```rust
//! use hetero_exec::{Buffer, ExecutionContext, ReferenceAxpy};
//!
//! let ctx = ExecutionContext::host();
//! let x = Buffer::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0]);
//! let y = Buffer::zeros(5);
//!
//! let status = ReferenceAxpy::new().compute(&ctx, 5, 2.0, &x, 1, &y, 1);
//! assert!(status.is_ok());
//! assert_eq!(y.to_vec(), vec![2.0, 4.0, 6.0, 8.0, 10.0]);
//! ```

pub mod args;
pub mod blas;
pub mod buffer;
pub mod cache;
pub mod context;
pub mod device;
pub mod range;
pub mod source;

pub use args::{BufferArg, DeviceFloat, KernelArgument, KernelArguments, ScalarArg};
pub use blas::{ReferenceAxpy, ReferenceGemm, Transpose};
pub use buffer::{AccessMode, Buffer};
pub use cache::{CacheStats, ProgramCache};
pub use context::{ExecutionContext, KernelFactory};
pub use device::{CompiledProgram, Device, HostDevice, Kernel, KernelHandle, NativeKernel};
pub use range::KernelRange;
pub use source::{KernelSource, KernelSourceTable, BLAS_PROGRAM};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AccessMode, Buffer, DeviceFloat, ExecutionContext, KernelArguments, KernelRange,
        ReferenceAxpy, ReferenceGemm, Transpose,
    };
}
