//! Algorithm containers on top of the heterogeneous execution layer
//!
//! An algorithm is a marker type naming its input, parameter and result. The
//! user-facing [`Batch`] object owns those three and one [`Container`],
//! which the [`ContainerRegistry`] picks for a `(algorithm, method,
//! capability tag)` key. Every computation runs in the same order:
//!
//! 1. parameter check against the input
//! 2. result allocation in the kernel's working precision
//! 3. result check
//! 4. the kernel
//!
//! A failure at any step stops the sequence and is returned as a [`Status`].
//!
//! Algorithms shipped with the crate:
//!
//! - [`pca`]: principal component analysis (correlation and SVD methods)
//! - [`cross_entropy`]: multinomial cross-entropy loss
//!
//! # Example
//!
//! ```rust
//! use hetero_algorithms::cross_entropy::{
//!     CrossEntropyInput, CrossEntropyLoss, CrossEntropyParameter, ResultId, ResultsToCompute,
//! };
//! use hetero_algorithms::{Batch, Environment};
//! use hetero_core::HomogenTable;
//!
//! // Two classes, one feature, all coefficients zero: loss is ln 2
//! let argument = HomogenTable::<f64>::zeros(4, 1).into_ptr();
//! let data = HomogenTable::<f64>::from_vec(3, 1, vec![0.5, -1.0, 2.0]).unwrap().into_ptr();
//! let labels = HomogenTable::<f64>::from_vec(3, 1, vec![0.0, 1.0, 1.0]).unwrap().into_ptr();
//!
//! let env = Environment::builder().build().unwrap();
//! let mut loss = Batch::<CrossEntropyLoss>::new::<f64>(
//!     &env,
//!     CrossEntropyInput::new(argument, data, labels),
//!     CrossEntropyParameter::new(2, 3).with_results(ResultsToCompute::VALUE),
//! )
//! .unwrap();
//! assert!(loss.compute().is_ok());
//!
//! let value = loss.result().values(ResultId::Value).unwrap()[0];
//! assert!((value - std::f64::consts::LN_2).abs() < 1e-12);
//! ```

pub mod algorithm;
pub mod archive;
pub mod batch;
pub mod container;
pub mod cross_entropy;
pub mod environment;
mod output;
pub mod pca;
pub mod registry;

pub use algorithm::{Algorithm, AlgorithmId, MethodId, ParameterDescriptor, ResultDescriptor};
pub use archive::{Archivable, TableRecord};
pub use batch::Batch;
pub use container::{BatchContainer, Container, ContainerState, Io, Kernel};
pub use environment::{Environment, EnvironmentBuilder, EnvironmentConfig, TargetKind};
pub use registry::{ContainerConstructor, ContainerKey, ContainerRegistry};

pub use hetero_core::Status;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Algorithm, AlgorithmId, Batch, Container, ContainerRegistry, ContainerState, Environment,
        MethodId, ParameterDescriptor, ResultDescriptor,
    };
}
