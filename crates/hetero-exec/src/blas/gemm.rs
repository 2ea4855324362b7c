use super::{cache_key, to_uint, GEMM_ACCUMULATE_KERNEL, GEMM_CACHE_PREFIX, GEMM_OVERWRITE_KERNEL};
use crate::args::{DeviceFloat, KernelArgument, KernelArguments};
use crate::buffer::{AccessMode, Buffer};
use crate::context::ExecutionContext;
use crate::range::KernelRange;
use crate::source::BLAS_PROGRAM;
use hetero_core::{check_status, Result, Status, Transpose};
use std::marker::PhantomData;
use tracing::debug;

/// Column-major `C := alpha*op(A)*op(B) + beta*C` on a device
///
/// `op(A)` is m x k, `op(B)` is k x n and `C` is m x n. `lda`, `ldb` and `ldc`
/// are the column strides of the stored matrices and `offset_*` the index of
/// their first element. With `beta == 0` the overwrite variant runs and C's
/// prior contents are never read, so C may hold garbage.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceGemm<T: DeviceFloat> {
    _marker: PhantomData<T>,
}

impl<T: DeviceFloat> Default for ReferenceGemm<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stride arguments of one GEMM launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GemmLayout {
    a_row: usize,
    a_inner: usize,
    b_inner: usize,
    b_col: usize,
}

impl GemmLayout {
    /// Element `(i, l)` of op(A) sits at `i*a_row + l*a_inner`, element `(l, j)`
    /// of op(B) at `l*b_inner + j*b_col`.
    fn new(trans_a: Transpose, trans_b: Transpose, lda: usize, ldb: usize) -> Self {
        let (a_row, a_inner) = match trans_a {
            Transpose::NoTrans => (1, lda),
            Transpose::Trans => (lda, 1),
        };
        let (b_inner, b_col) = match trans_b {
            Transpose::NoTrans => (1, ldb),
            Transpose::Trans => (ldb, 1),
        };
        Self {
            a_row,
            a_inner,
            b_inner,
            b_col,
        }
    }
}

impl<T: DeviceFloat> ReferenceGemm<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Cache key of this precision's program
    pub fn cache_key() -> String {
        cache_key(GEMM_CACHE_PREFIX, T::PRECISION)
    }

    /// Entry point chosen for `beta`
    pub fn kernel_name(beta: T) -> &'static str {
        if beta == T::zero() {
            GEMM_OVERWRITE_KERNEL
        } else {
            GEMM_ACCUMULATE_KERNEL
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        &self,
        ctx: &ExecutionContext,
        trans_a: Transpose,
        trans_b: Transpose,
        m: usize,
        n: usize,
        k: usize,
        alpha: T,
        a: &Buffer<T>,
        lda: usize,
        offset_a: usize,
        b: &Buffer<T>,
        ldb: usize,
        offset_b: usize,
        beta: T,
        c: &Buffer<T>,
        ldc: usize,
        offset_c: usize,
    ) -> Status {
        let layout = GemmLayout::new(trans_a, trans_b, lda, ldb);
        let uints = [
            ("m", m),
            ("n", n),
            ("k", k),
            ("lda", lda),
            ("ldb", ldb),
            ("ldc", ldc),
            ("offset_a", offset_a),
            ("offset_b", offset_b),
            ("offset_c", offset_c),
        ];
        let status: Status = uints
            .iter()
            .filter_map(|&(what, v)| to_uint(what, v).err())
            .collect();
        check_status!(status);

        let key = Self::cache_key();
        let mut factory = ctx.kernel_factory();
        check_status!(factory.build_from_table(ctx.target(), BLAS_PROGRAM, &key, T::PRECISION));

        let kernel_name = Self::kernel_name(beta);
        let kernel = match factory.get_kernel(kernel_name) {
            Ok(kernel) => kernel,
            Err(e) => return e.into(),
        };
        debug!(kernel = kernel_name, ?trans_a, ?trans_b, m, n, k, "gemm");

        let args = match Self::bind(k, alpha, a, layout, offset_a, b, offset_b, beta, c, ldc, offset_c) {
            Ok(args) => args,
            Err(e) => return e.into(),
        };

        let mut status = Status::ok();
        ctx.run(&KernelRange::two_dim(m, n), &kernel, &args, &mut status);
        status
    }

    #[allow(clippy::too_many_arguments)]
    fn bind(
        k: usize,
        alpha: T,
        a: &Buffer<T>,
        layout: GemmLayout,
        offset_a: usize,
        b: &Buffer<T>,
        offset_b: usize,
        beta: T,
        c: &Buffer<T>,
        ldc: usize,
        offset_c: usize,
    ) -> Result<KernelArguments> {
        let c_mode = if beta == T::zero() {
            AccessMode::Write
        } else {
            AccessMode::ReadWrite
        };

        let mut args = KernelArguments::new(15);
        args.set(0, to_uint("k", k)?)
            .set(1, KernelArgument::Scalar(alpha.scalar_arg()))
            .set_buffer(2, a, AccessMode::Read)
            .set(3, to_uint("lda", layout.a_row)?)
            .set(4, to_uint("lda", layout.a_inner)?)
            .set(5, to_uint("offset_a", offset_a)?)
            .set_buffer(6, b, AccessMode::Read)
            .set(7, to_uint("ldb", layout.b_inner)?)
            .set(8, to_uint("ldb", layout.b_col)?)
            .set(9, to_uint("offset_b", offset_b)?)
            .set(10, KernelArgument::Scalar(beta.scalar_arg()))
            .set_buffer(11, c, c_mode)
            .set(12, 1u32)
            .set(13, to_uint("ldc", ldc)?)
            .set(14, to_uint("offset_c", offset_c)?);
        Ok(args)
    }
}
