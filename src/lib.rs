//! Heterogeneous numerical-kernel execution engine
//!
//! Facade over the workspace crates:
//!
//! - [`hetero_core`]: precision and capability tags, errors and statuses, tables and
//!   CPU primitives
//! - [`hetero_exec`]: device execution context, compiled-kernel cache, argument
//!   binding and the reference GEMM/AXPY kernels
//! - [`hetero_algorithms`]: algorithm containers, descriptor contracts, the
//!   container registry, PCA and cross-entropy loss
//!
//! # Example
//!
//! ```rust
//! use hetero_kernels::prelude::*;
//! use hetero_kernels::hetero_algorithms::pca::{CorrelationParameter, PcaCorrelation, PcaInput, ResultId};
//!
//! let data = HomogenTable::<f64>::from_vec(4, 2, vec![1.0, 2.0, 2.0, 4.1, 3.0, 5.9, 4.0, 8.0])
//!     .unwrap()
//!     .into_ptr();
//! let env = Environment::builder().target(TargetKind::Device).build().unwrap();
//! let mut pca = Batch::<PcaCorrelation>::new::<f64>(
//!     &env,
//!     PcaInput::new(data),
//!     CorrelationParameter::default(),
//! )
//! .unwrap();
//! assert!(pca.compute().is_ok());
//!
//! let eigenvalues = pca.result().values(ResultId::Eigenvalues).unwrap();
//! assert!((eigenvalues.iter().sum::<f64>() - 2.0).abs() < 1e-9);
//! ```

pub use hetero_algorithms;
pub use hetero_core;
pub use hetero_exec;

pub use hetero_algorithms::{
    Algorithm, AlgorithmId, Batch, Container, ContainerRegistry, ContainerState, Environment,
    EnvironmentBuilder, EnvironmentConfig, MethodId, TargetKind,
};
pub use hetero_core::{
    CapabilityTag, CpuVariant, DeviceId, Error, ErrorClass, HomogenTable, KernelFloat,
    NumericTable, NumericTablePtr, Precision, Result, Status, Target,
};
pub use hetero_exec::{Buffer, ExecutionContext, ReferenceAxpy, ReferenceGemm, Transpose};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Batch, Buffer, CapabilityTag, Environment, ExecutionContext, HomogenTable, Precision,
        Status, Target, TargetKind,
    };
}
