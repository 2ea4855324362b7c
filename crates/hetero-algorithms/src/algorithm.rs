//! Algorithm identity and the parameter/result descriptor contract
//!
//! An algorithm is a marker type tying together an input, a parameter and a
//! result type. Parameters validate themselves against the input before any
//! storage exists; results allocate storage sized from input and parameter
//! only, then validate what they hold.

use hetero_core::{KernelFloat, Status};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Algorithms known to the container registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmId {
    Pca,
    CrossEntropyLoss,
}

impl AlgorithmId {
    pub fn name(self) -> &'static str {
        match self {
            AlgorithmId::Pca => "pca",
            AlgorithmId::CrossEntropyLoss => "cross_entropy_loss",
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computation methods of the registered algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodId {
    /// PCA through the correlation matrix
    Correlation,
    /// PCA through an SVD of the standardised data
    Svd,
    /// Single dense method
    DefaultDense,
}

impl MethodId {
    pub fn name(self) -> &'static str {
        match self {
            MethodId::Correlation => "correlation",
            MethodId::Svd => "svd",
            MethodId::DefaultDense => "default_dense",
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validation contract of an algorithm parameter
pub trait ParameterDescriptor<I> {
    /// Check internal consistency and compatibility with `input`
    ///
    /// Pure: never allocates or mutates.
    fn check(&self, input: &I, method: MethodId) -> Status;
}

/// Allocation and validation contract of an algorithm result
pub trait ResultDescriptor<I, P> {
    /// Allocate every requested output that is not already present
    ///
    /// Storage is sized from `input` and `parameter` only and uses element
    /// type `T`. Unrequested outputs stay absent.
    fn allocate<T: KernelFloat>(&mut self, input: &I, parameter: &P, method: MethodId) -> Status;

    /// Check that the held outputs have the shapes `parameter` requires
    fn check(&self, input: &I, parameter: &P, method: MethodId) -> Status;
}

/// Marker type naming one (algorithm, method) pair and its descriptor types
pub trait Algorithm: Sized + 'static {
    const ID: AlgorithmId;
    const METHOD: MethodId;

    type Input: Send + Sync + 'static;
    type Parameter: ParameterDescriptor<Self::Input> + Send + Sync + 'static;
    type Result: ResultDescriptor<Self::Input, Self::Parameter> + Default + Send + Sync + 'static;
}
