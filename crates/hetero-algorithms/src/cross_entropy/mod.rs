//! Multinomial cross-entropy loss
//!
//! Registered for the generic CPU and device targets. An AVX2 request is
//! served by the generic container through registry fallback.

mod device;
mod kernel;
mod types;

pub use device::DeviceCrossEntropyKernel;
pub use kernel::CrossEntropyKernel;
pub use types::{
    CrossEntropyInput, CrossEntropyParameter, CrossEntropyResult, ResultId, ResultsToCompute,
};

use crate::algorithm::{Algorithm, AlgorithmId, MethodId};
use crate::container::{BatchContainer, Container};
use crate::environment::Environment;
use crate::registry::ContainerRegistry;
use hetero_core::{CapabilityTag, CpuVariant, DeviceId, KernelFloat, Result, ScalarBackend, Target};
use hetero_exec::DeviceFloat;

/// Cross-entropy loss, default dense method
#[derive(Debug, Clone, Copy)]
pub struct CrossEntropyLoss;

impl Algorithm for CrossEntropyLoss {
    const ID: AlgorithmId = AlgorithmId::CrossEntropyLoss;
    const METHOD: MethodId = MethodId::DefaultDense;
    type Input = CrossEntropyInput;
    type Parameter = CrossEntropyParameter;
    type Result = CrossEntropyResult;
}

fn cpu_container<T: KernelFloat>(_: &Environment, tag: CapabilityTag) -> Result<Box<dyn Container>> {
    let kernel = CrossEntropyKernel::<T, _>::new(ScalarBackend::new());
    Ok(Box::new(BatchContainer::<CrossEntropyLoss, T>::new(tag, Box::new(kernel))))
}

fn device_container<T: DeviceFloat>(env: &Environment, tag: CapabilityTag) -> Result<Box<dyn Container>> {
    let kernel = DeviceCrossEntropyKernel::<T>::new(env.context().clone());
    Ok(Box::new(BatchContainer::<CrossEntropyLoss, T>::new(tag, Box::new(kernel))))
}

/// Register every cross-entropy container
pub(crate) fn register(registry: &mut ContainerRegistry) {
    registry
        .register_precisions(
            AlgorithmId::CrossEntropyLoss,
            MethodId::DefaultDense,
            Target::Cpu(CpuVariant::Generic),
            cpu_container::<f32>,
            cpu_container::<f64>,
        )
        .register_precisions(
            AlgorithmId::CrossEntropyLoss,
            MethodId::DefaultDense,
            Target::Device(DeviceId::DEFAULT),
            device_container::<f32>,
            device_container::<f64>,
        );
}
