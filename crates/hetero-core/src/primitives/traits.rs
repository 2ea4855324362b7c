//! Unified compute primitives trait

use crate::numeric::KernelFloat;

/// Whether an operand enters a product as stored or transposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transpose {
    NoTrans,
    Trans,
}

impl Transpose {
    /// Whether the operand is transposed
    pub fn is_trans(self) -> bool {
        self == Transpose::Trans
    }
}

/// Low-level vector operations used by CPU kernels
///
/// Default methods are portable scalar loops; SIMD backends override the hot
/// ones. All slices are dense and contiguous.
pub trait ComputePrimitives<T: KernelFloat>: Clone + Send + Sync {
    /// Name of this backend
    fn backend_name(&self) -> &'static str;

    /// Number of elements processed per instruction
    fn simd_width(&self) -> usize {
        1
    }

    /// Dot product over the common prefix of `a` and `b`
    fn dot_product(&self, a: &[T], b: &[T]) -> T {
        a.iter()
            .zip(b.iter())
            .fold(T::zero(), |acc, (&x, &y)| acc + x * y)
    }

    /// Sum of all elements
    fn sum(&self, data: &[T]) -> T {
        data.iter().fold(T::zero(), |acc, &x| acc + x)
    }

    /// `y := a*x + y` over the common prefix
    fn axpy(&self, a: T, x: &[T], y: &mut [T]) {
        for (yi, &xi) in y.iter_mut().zip(x.iter()) {
            *yi += a * xi;
        }
    }

    /// `x := a*x`
    fn scale(&self, a: T, x: &mut [T]) {
        for xi in x.iter_mut() {
            *xi *= a;
        }
    }

    /// Arithmetic mean, zero for empty input
    fn mean(&self, data: &[T]) -> T {
        if data.is_empty() {
            return T::zero();
        }
        self.sum(data) / T::from_f64_lossy(data.len() as f64)
    }

    /// Index of the largest element
    fn argmax(&self, data: &[T]) -> Option<usize> {
        data.iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
    }

    /// Column-major `C := alpha*op(A)*op(B) + beta*C`
    ///
    /// `op(A)` is m x k, `op(B)` is k x n and `C` is m x n; `ld*` are column
    /// strides. With `beta == 0` the prior contents of `C` are never read.
    #[allow(clippy::too_many_arguments)]
    fn gemm(
        &self,
        trans_a: Transpose,
        trans_b: Transpose,
        m: usize,
        n: usize,
        k: usize,
        alpha: T,
        a: &[T],
        lda: usize,
        b: &[T],
        ldb: usize,
        beta: T,
        c: &mut [T],
        ldc: usize,
    ) {
        for j in 0..n {
            for i in 0..m {
                let mut sum = T::zero();
                for l in 0..k {
                    let av = match trans_a {
                        Transpose::NoTrans => a[i + l * lda],
                        Transpose::Trans => a[l + i * lda],
                    };
                    let bv = match trans_b {
                        Transpose::NoTrans => b[l + j * ldb],
                        Transpose::Trans => b[j + l * ldb],
                    };
                    sum += av * bv;
                }
                let ci = i + j * ldc;
                c[ci] = if beta == T::zero() {
                    alpha * sum
                } else {
                    alpha * sum + beta * c[ci]
                };
            }
        }
    }
}
