//! Principal component analysis
//!
//! Two methods share one input and one result type:
//!
//! - [`PcaCorrelation`]: eigen decomposition of the correlation matrix,
//!   registered for the generic CPU, AVX2 CPU and device targets
//! - [`PcaSvd`]: SVD of the standardised observations, CPU only
//!
//! # Example
//!
//! ```rust
//! use hetero_algorithms::pca::{CorrelationParameter, PcaCorrelation, PcaInput, ResultId};
//! use hetero_algorithms::{Batch, Environment};
//! use hetero_core::HomogenTable;
//!
//! let data = HomogenTable::<f64>::from_rows(&[
//!     vec![1.0, 2.0, 0.5],
//!     vec![2.0, 3.9, 0.1],
//!     vec![3.0, 6.1, 0.9],
//!     vec![4.0, 8.0, 0.3],
//! ])
//! .unwrap();
//!
//! let env = Environment::builder().build().unwrap();
//! let mut pca = Batch::<PcaCorrelation>::new::<f64>(
//!     &env,
//!     PcaInput::new(data.into_ptr()),
//!     CorrelationParameter::default(),
//! )
//! .unwrap();
//! assert!(pca.compute().is_ok());
//!
//! let eigenvalues = pca.result().values(ResultId::Eigenvalues).unwrap();
//! assert!((eigenvalues.iter().sum::<f64>() - 3.0).abs() < 1e-9);
//! ```

mod device;
mod kernel;
mod types;

pub use device::DeviceCorrelationKernel;
pub use kernel::{CorrelationKernel, SvdKernel};
pub use types::{
    BaseParameter, CorrelationParameter, DataForTransformKey, InputDataKind, PcaInput, PcaResult,
    PcaResultRecord, ResultCollectionId, ResultId, ResultsToCompute, SvdParameter,
};

use crate::algorithm::{Algorithm, AlgorithmId, MethodId};
use crate::container::{BatchContainer, Container};
use crate::environment::Environment;
use crate::registry::ContainerRegistry;
use hetero_core::{CapabilityTag, CpuVariant, KernelFloat, Result, ScalarBackend, Target};
use hetero_exec::DeviceFloat;

/// PCA through the correlation matrix
#[derive(Debug, Clone, Copy)]
pub struct PcaCorrelation;

impl Algorithm for PcaCorrelation {
    const ID: AlgorithmId = AlgorithmId::Pca;
    const METHOD: MethodId = MethodId::Correlation;
    type Input = PcaInput;
    type Parameter = CorrelationParameter;
    type Result = PcaResult;
}

/// PCA through an SVD
#[derive(Debug, Clone, Copy)]
pub struct PcaSvd;

impl Algorithm for PcaSvd {
    const ID: AlgorithmId = AlgorithmId::Pca;
    const METHOD: MethodId = MethodId::Svd;
    type Input = PcaInput;
    type Parameter = SvdParameter;
    type Result = PcaResult;
}

fn scalar_correlation<T: KernelFloat>(_: &Environment, tag: CapabilityTag) -> Result<Box<dyn Container>> {
    let kernel = CorrelationKernel::<T, _>::new(ScalarBackend::new());
    Ok(Box::new(BatchContainer::<PcaCorrelation, T>::new(tag, Box::new(kernel))))
}

#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
fn avx2_correlation<T: KernelFloat>(_: &Environment, tag: CapabilityTag) -> Result<Box<dyn Container>>
where
    hetero_core::Avx2Backend: hetero_core::ComputePrimitives<T>,
{
    let backend = hetero_core::Avx2Backend::try_new().ok_or_else(|| {
        hetero_core::Error::UnsupportedTarget("avx2 is not available on this machine".into())
    })?;
    let kernel = CorrelationKernel::<T, _>::new(backend);
    Ok(Box::new(BatchContainer::<PcaCorrelation, T>::new(tag, Box::new(kernel))))
}

fn device_correlation<T: DeviceFloat>(env: &Environment, tag: CapabilityTag) -> Result<Box<dyn Container>> {
    let kernel = DeviceCorrelationKernel::<T>::new(env.context().clone());
    Ok(Box::new(BatchContainer::<PcaCorrelation, T>::new(tag, Box::new(kernel))))
}

fn scalar_svd<T: KernelFloat>(_: &Environment, tag: CapabilityTag) -> Result<Box<dyn Container>> {
    let kernel = SvdKernel::<T, _>::new(ScalarBackend::new());
    Ok(Box::new(BatchContainer::<PcaSvd, T>::new(tag, Box::new(kernel))))
}

/// Register every PCA container
pub(crate) fn register(registry: &mut ContainerRegistry) {
    let generic = Target::Cpu(CpuVariant::Generic);
    let device = Target::Device(hetero_core::DeviceId::DEFAULT);

    registry
        .register_precisions(
            AlgorithmId::Pca,
            MethodId::Correlation,
            generic,
            scalar_correlation::<f32>,
            scalar_correlation::<f64>,
        )
        .register_precisions(
            AlgorithmId::Pca,
            MethodId::Correlation,
            device,
            device_correlation::<f32>,
            device_correlation::<f64>,
        )
        .register_precisions(
            AlgorithmId::Pca,
            MethodId::Svd,
            generic,
            scalar_svd::<f32>,
            scalar_svd::<f64>,
        );

    #[cfg(all(target_arch = "x86_64", feature = "avx2"))]
    registry.register_precisions(
        AlgorithmId::Pca,
        MethodId::Correlation,
        Target::Cpu(CpuVariant::Avx2),
        avx2_correlation::<f32>,
        avx2_correlation::<f64>,
    );
}
