use super::{cache_key, to_uint, AXPY_CACHE_PREFIX, AXPY_KERNEL};
use crate::args::{DeviceFloat, KernelArgument, KernelArguments};
use crate::buffer::{AccessMode, Buffer};
use crate::context::ExecutionContext;
use crate::range::KernelRange;
use crate::source::BLAS_PROGRAM;
use hetero_core::{check_status, Error, Status};
use std::marker::PhantomData;
use tracing::debug;

/// `y := a*x + y` over `n` strided elements on a device
///
/// Increments must be positive. Each call accumulates into `y`.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceAxpy<T: DeviceFloat> {
    _marker: PhantomData<T>,
}

impl<T: DeviceFloat> Default for ReferenceAxpy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeviceFloat> ReferenceAxpy<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// Cache key of this precision's program
    pub fn cache_key() -> String {
        cache_key(AXPY_CACHE_PREFIX, T::PRECISION)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        &self,
        ctx: &ExecutionContext,
        n: usize,
        a: T,
        x: &Buffer<T>,
        incx: i32,
        y: &Buffer<T>,
        incy: i32,
    ) -> Status {
        if incx <= 0 || incy <= 0 {
            return Error::InvalidParameter(format!(
                "axpy increments must be positive, got incx={incx} incy={incy}"
            ))
            .into();
        }
        if let Err(e) = to_uint("n", n) {
            return e.into();
        }

        let key = Self::cache_key();
        let mut factory = ctx.kernel_factory();
        check_status!(factory.build_from_table(ctx.target(), BLAS_PROGRAM, &key, T::PRECISION));
        let kernel = match factory.get_kernel(AXPY_KERNEL) {
            Ok(kernel) => kernel,
            Err(e) => return e.into(),
        };
        debug!(n, incx, incy, "axpy");

        let mut args = KernelArguments::new(5);
        args.set(0, KernelArgument::Scalar(a.scalar_arg()))
            .set_buffer(1, x, AccessMode::Read)
            .set(2, incx)
            .set_buffer(3, y, AccessMode::ReadWrite)
            .set(4, incy);

        let mut status = Status::ok();
        ctx.run(&KernelRange::one_dim(n), &kernel, &args, &mut status);
        status
    }
}
