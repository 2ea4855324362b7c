//! Shared utilities for integration tests

#![allow(dead_code)]

pub use approx::assert_relative_eq;

use hetero_algorithms::cross_entropy::CrossEntropyInput;
use hetero_algorithms::{Environment, TargetKind};
use hetero_core::{CpuVariant, HomogenTable, KernelFloat, NumericTablePtr};
use hetero_exec::ExecutionContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Generic CPU environment evaluating sequentially
pub fn cpu_env() -> Environment {
    Environment::builder()
        .cpu_variant(CpuVariant::Generic)
        .parallel(false)
        .build()
        .unwrap()
}

/// Device environment on a fresh host execution context
pub fn device_env() -> Environment {
    Environment::builder().target(TargetKind::Device).build().unwrap()
}

/// Device environment sharing `context`
pub fn device_env_with(context: &Arc<ExecutionContext>) -> Environment {
    Environment::builder()
        .target(TargetKind::Device)
        .context(Arc::clone(context))
        .build()
        .unwrap()
}

/// Reproducible uniform values in [-1, 1)
pub fn random_values(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Row-major table of working type `T` from f64 values
pub fn table<T: KernelFloat>(rows: usize, cols: usize, values: &[f64]) -> NumericTablePtr {
    let values = values.iter().map(|&v| T::from_f64_lossy(v)).collect();
    HomogenTable::<T>::from_vec(rows, cols, values).unwrap().into_ptr()
}

/// Correlated observations: column j mixes a shared factor with noise
pub fn correlated_data<T: KernelFloat>(n: usize, p: usize, seed: u64) -> NumericTablePtr {
    let factor = random_values(n, seed);
    let noise = random_values(n * p, seed + 1);
    let values: Vec<f64> = (0..n * p)
        .map(|idx| {
            let (i, j) = (idx / p, idx % p);
            (j as f64 + 1.0) * factor[i] + 0.5 * noise[idx] + j as f64
        })
        .collect();
    table::<T>(n, p, &values)
}

/// Loss input with `n` observations, `p` features and `classes` classes
pub fn loss_input<T: KernelFloat>(n: usize, p: usize, classes: usize, seed: u64) -> CrossEntropyInput {
    let argument = random_values((p + 1) * classes, seed);
    let data = random_values(n * p, seed + 1);
    let labels: Vec<f64> = (0..n).map(|i| (i * 7 % classes) as f64).collect();
    CrossEntropyInput::new(
        table::<T>((p + 1) * classes, 1, &argument),
        table::<T>(n, p, &data),
        table::<T>(n, 1, &labels),
    )
}
