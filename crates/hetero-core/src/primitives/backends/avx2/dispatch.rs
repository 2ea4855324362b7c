//! Compile-time type dispatch for AVX2 implementations

use super::ops;

/// Per-type AVX2 entry points
///
/// Implemented for `f32` and `f64`; selecting the implementation is resolved
/// at compile time from the working type.
pub trait Avx2TypeDispatch: Sized {
    fn simd_width() -> usize;

    unsafe fn dot_product_impl(a: &[Self], b: &[Self]) -> Self;

    unsafe fn sum_impl(data: &[Self]) -> Self;

    unsafe fn axpy_impl(a: Self, x: &[Self], y: &mut [Self]);
}

impl Avx2TypeDispatch for f32 {
    fn simd_width() -> usize {
        8
    }

    unsafe fn dot_product_impl(a: &[f32], b: &[f32]) -> f32 {
        ops::dot_product_f32(a, b)
    }

    unsafe fn sum_impl(data: &[f32]) -> f32 {
        ops::sum_f32(data)
    }

    unsafe fn axpy_impl(a: f32, x: &[f32], y: &mut [f32]) {
        ops::axpy_f32(a, x, y)
    }
}

impl Avx2TypeDispatch for f64 {
    fn simd_width() -> usize {
        4
    }

    unsafe fn dot_product_impl(a: &[f64], b: &[f64]) -> f64 {
        ops::dot_product_f64(a, b)
    }

    unsafe fn sum_impl(data: &[f64]) -> f64 {
        ops::sum_f64(data)
    }

    unsafe fn axpy_impl(a: f64, x: &[f64], y: &mut [f64]) {
        ops::axpy_f64(a, x, y)
    }
}
