//! AVX2 backend implementation
//!
//! Operations dispatch at compile time to type-specific intrinsics through
//! [`dispatch::Avx2TypeDispatch`]; the backend can only be constructed after
//! the CPU has been checked for AVX2 + FMA.

#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
mod dispatch;
#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
mod ops;

use crate::numeric::KernelFloat;
use crate::primitives::ComputePrimitives;

/// AVX2 backend for x86_64 processors
#[derive(Clone, Copy, Debug)]
pub struct Avx2Backend {
    _private: (),
}

impl Avx2Backend {
    /// Create an AVX2 backend if this build and CPU support it
    pub fn try_new() -> Option<Self> {
        if Self::is_available() {
            Some(Self { _private: () })
        } else {
            None
        }
    }

    /// Check if AVX2 + FMA are available on this CPU
    pub fn is_available() -> bool {
        #[cfg(all(target_arch = "x86_64", feature = "avx2"))]
        {
            is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
        }
        #[cfg(not(all(target_arch = "x86_64", feature = "avx2")))]
        {
            false
        }
    }
}

#[cfg(all(target_arch = "x86_64", feature = "avx2"))]
impl<T> ComputePrimitives<T> for Avx2Backend
where
    T: KernelFloat + self::dispatch::Avx2TypeDispatch,
{
    fn backend_name(&self) -> &'static str {
        "avx2"
    }

    fn simd_width(&self) -> usize {
        T::simd_width()
    }

    fn dot_product(&self, a: &[T], b: &[T]) -> T {
        // Safety: construction checked CPU support
        unsafe { T::dot_product_impl(a, b) }
    }

    fn sum(&self, data: &[T]) -> T {
        // Safety: construction checked CPU support
        unsafe { T::sum_impl(data) }
    }

    fn axpy(&self, a: T, x: &[T], y: &mut [T]) {
        // Safety: construction checked CPU support
        unsafe { T::axpy_impl(a, x, y) }
    }
}

// Never constructible without AVX2 support; delegates to the defaults.
#[cfg(not(all(target_arch = "x86_64", feature = "avx2")))]
impl<T: KernelFloat> ComputePrimitives<T> for Avx2Backend {
    fn backend_name(&self) -> &'static str {
        "avx2 (unavailable)"
    }
}
