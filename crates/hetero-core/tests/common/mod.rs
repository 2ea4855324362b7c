//! Shared utilities for integration tests

#![allow(dead_code)]

pub use approx::assert_relative_eq;

/// Array lengths around the SIMD widths of the backends
pub fn edge_case_lengths() -> Vec<usize> {
    vec![
        0,   // Empty
        1,   // Single element
        3,   // Below f64 AVX2 width
        4,   // f64 AVX2 width
        5,   // f64 AVX2 width + 1
        7,   // f32 AVX2 width - 1
        8,   // f32 AVX2 width
        9,   // f32 AVX2 width + 1
        17,  // Power of 2 + 1
        31,  // Prime
        64,  // Cache line
        127, // Mersenne prime
    ]
}

pub fn test_data(len: usize) -> Vec<f64> {
    (0..len).map(|i| (i as f64 * 0.37).sin() * 10.0).collect()
}
