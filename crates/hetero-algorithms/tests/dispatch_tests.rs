//! Container dispatch, registry fallback and shared execution contexts

mod common;

use common::*;
use hetero_algorithms::cross_entropy::{CrossEntropyLoss, CrossEntropyParameter, ResultsToCompute};
use hetero_algorithms::pca::{CorrelationParameter, PcaCorrelation, PcaInput, ResultId};
use hetero_algorithms::{Batch, ContainerRegistry, ContainerState};
use hetero_core::{CapabilityTag, CpuVariant, DeviceId, Error, ErrorClass, Precision, Target};
use hetero_exec::{ExecutionContext, HostDevice, KernelSource, KernelSourceTable, BLAS_PROGRAM};
use std::sync::Arc;
use std::thread;

fn pca<T: hetero_core::KernelFloat>(env: &hetero_algorithms::Environment, seed: u64) -> Batch<PcaCorrelation> {
    Batch::<PcaCorrelation>::new::<T>(
        env,
        PcaInput::new(correlated_data::<T>(30, 4, seed)),
        CorrelationParameter::default(),
    )
    .unwrap()
}

#[test]
fn test_same_tag_selects_same_kernel() {
    let env = cpu_env();
    let first = pca::<f64>(&env, 1);
    let second = pca::<f64>(&env, 2);
    assert_eq!(first.tag(), second.tag());
    assert_eq!(first.kernel_name(), second.kernel_name());
    assert_eq!(first.kernel_name(), "pca_correlation_scalar");
    assert_eq!(first.state(), ContainerState::Ready);
}

#[test]
fn test_precisions_compile_separate_programs() {
    let context = Arc::new(ExecutionContext::host());
    let env = device_env_with(&context);

    let mut single = pca::<f32>(&env, 4);
    let mut double = pca::<f64>(&env, 4);
    assert!(double.compute().is_ok());
    assert!(single.compute().is_ok());
    assert!(double.compute().is_ok());

    assert_eq!(
        context.cached_keys(),
        vec!["__blas_gemm_double".to_string(), "__blas_gemm_float".to_string()]
    );
    assert_eq!(context.compile_count(), 2);
    assert_eq!(
        single.result().get(ResultId::Eigenvalues).unwrap().precision(),
        Precision::Single
    );
}

#[test]
fn test_avx2_request_falls_back_to_generic() {
    let env = cpu_env();
    let tag = CapabilityTag::new(Precision::Double, Target::Cpu(CpuVariant::Avx2));
    let mut batch = Batch::<CrossEntropyLoss>::with_tag(
        &env,
        tag,
        loss_input::<f64>(6, 2, 3, 17),
        CrossEntropyParameter::new(3, 6).with_results(ResultsToCompute::all()),
    )
    .unwrap();
    assert_eq!(batch.tag().target, Target::Cpu(CpuVariant::Generic));
    assert_eq!(batch.kernel_name(), "cross_entropy_cpu");
    assert!(batch.compute().is_ok());
}

#[test]
fn test_unknown_device_id_uses_default_container() {
    let env = device_env();
    let tag = CapabilityTag::new(Precision::Double, Target::Device(DeviceId(7)));
    let mut batch = Batch::<PcaCorrelation>::with_tag(
        &env,
        tag,
        PcaInput::new(correlated_data::<f64>(20, 3, 6)),
        CorrelationParameter::default(),
    )
    .unwrap();
    assert_eq!(batch.tag().target, Target::Device(DeviceId::DEFAULT));
    assert_eq!(batch.kernel_name(), "pca_correlation_device");
    assert!(batch.compute().is_ok());
}

#[test]
fn test_empty_registry_reports_missing_container() {
    let env = cpu_env();
    let registry = ContainerRegistry::new();
    let err = Batch::<PcaCorrelation>::with_registry(
        &registry,
        &env,
        env.tag::<f64>(),
        PcaInput::default(),
        CorrelationParameter::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::ContainerNotRegistered(_)));
    assert_eq!(err.class(), ErrorClass::Programming);
}

#[test]
fn test_compile_failure_is_a_computation_error() {
    let mut sources = KernelSourceTable::empty();
    sources.insert(
        BLAS_PROGRAM,
        KernelSource::new("__kernel void blas_gemm_overwrite(__global fptype *c {", ""),
    );
    let context = Arc::new(ExecutionContext::with_sources(Arc::new(HostDevice::new()), sources));
    let env = device_env_with(&context);

    let mut batch = pca::<f64>(&env, 8);
    let status = batch.compute();
    assert_eq!(status.class(), Some(ErrorClass::Computation));
    assert!(matches!(status.first(), Some(Error::Compile { .. })));
    assert_eq!(batch.state(), ContainerState::Failed);
    assert!(context.cached_keys().is_empty());
}

#[test]
fn test_concurrent_batches_share_one_program() {
    let context = Arc::new(ExecutionContext::host());
    let env = device_env_with(&context);

    let eigenvalues: Vec<Vec<f64>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let env = &env;
                scope.spawn(move || {
                    let mut batch = pca::<f64>(env, 12);
                    assert!(batch.compute().is_ok());
                    batch.result().values(ResultId::Eigenvalues).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for values in &eigenvalues[1..] {
        for (a, b) in eigenvalues[0].iter().zip(values) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }
    assert_eq!(context.compile_count(), 1);
}
