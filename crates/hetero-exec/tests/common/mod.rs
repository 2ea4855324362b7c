//! Shared utilities for integration tests

#![allow(dead_code)]

pub use approx::assert_relative_eq;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Column-major m x n matrix with `values[i + j*m]`
pub fn col_major(rows: &[&[f64]]) -> Vec<f64> {
    let m = rows.len();
    let n = rows.first().map_or(0, |r| r.len());
    let mut out = vec![0.0; m * n];
    for (i, row) in rows.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            out[i + j * m] = v;
        }
    }
    out
}

/// Transpose of a column-major m x n matrix
pub fn transpose(values: &[f64], m: usize, n: usize) -> Vec<f64> {
    let mut out = vec![0.0; m * n];
    for j in 0..n {
        for i in 0..m {
            out[j + i * n] = values[i + j * m];
        }
    }
    out
}

/// Plain column-major product of an m x k and a k x n matrix
pub fn naive_product(a: &[f64], b: &[f64], m: usize, n: usize, k: usize) -> Vec<f64> {
    let mut c = vec![0.0; m * n];
    for j in 0..n {
        for i in 0..m {
            c[i + j * m] = (0..k).map(|l| a[i + l * m] * b[l + j * k]).sum();
        }
    }
    c
}

/// Reproducible uniform values in [-1, 1)
pub fn random_values(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}
