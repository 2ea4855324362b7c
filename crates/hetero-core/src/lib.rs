//! Core types for heterogeneous kernel dispatch
//!
//! This crate holds everything the execution and algorithm layers agree on:
//!
//! 1. **Precision and capability** - [`KernelFloat`], [`Precision`] and the
//!    [`CapabilityTag`] dispatch key
//! 2. **Status** - the composable [`Status`] aggregate and the [`Error`] descriptors
//! 3. **Tables** - the opaque 2-D [`NumericTable`] view algorithms consume
//! 4. **CPU primitives** - [`ComputePrimitives`] with scalar and AVX2 backends
//! 5. **Execution engines** - sequential / rayon evaluation of index ranges
//!
//! # Example
//!
//! ```rust
//! use hetero_core::{CapabilityTag, CpuVariant, Precision, Target};
//!
//! let tag = CapabilityTag::resolve::<f32>(Target::Cpu(CpuVariant::Generic));
//! assert_eq!(tag.precision, Precision::Single);
//! assert_eq!(tag.to_string(), "float@cpu/generic");
//! ```

pub mod capability;
pub mod error;
pub mod execution;
pub mod numeric;
pub mod primitives;
pub mod table;

pub use error::{Error, ErrorClass, Result, Status};

pub use capability::{CapabilityTag, CpuVariant, DeviceId, Target};
pub use numeric::{precision_from_options, KernelFloat, Precision, FP_TYPE_MACRO};

pub use execution::{Engine, ExecutionEngine, ExecutionStrategy, SequentialEngine};
#[cfg(feature = "parallel")]
pub use execution::ParallelEngine;

pub use primitives::{Avx2Backend, ComputePrimitives, ScalarBackend, Transpose};

pub use table::{HomogenTable, KeyValueCollection, NumericTable, NumericTablePtr};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CapabilityTag, ComputePrimitives, CpuVariant, Error, ErrorClass, HomogenTable,
        KernelFloat, NumericTable, NumericTablePtr, Precision, Result, ScalarBackend, Status,
        Target, Transpose,
    };
}
