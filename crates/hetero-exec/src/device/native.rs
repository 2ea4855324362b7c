//! Native bodies of the built-in device entry points
//!
//! Argument layouts match `kernels/blas.cl`. Input buffers are snapshotted
//! before the output is locked, so an output may alias an input.

use super::host::NativeKernel;
use crate::args::{DeviceFloat, KernelArguments};
use crate::blas::{AXPY_KERNEL, GEMM_ACCUMULATE_KERNEL, GEMM_OVERWRITE_KERNEL};
use crate::range::KernelRange;
use hetero_core::{Engine, Error, ExecutionEngine, Result};

pub(super) fn builtin() -> [(&'static str, NativeKernel); 3] {
    [
        (
            GEMM_OVERWRITE_KERNEL,
            NativeKernel {
                single: gemm_overwrite::<f32>,
                double: gemm_overwrite::<f64>,
            },
        ),
        (
            GEMM_ACCUMULATE_KERNEL,
            NativeKernel {
                single: gemm_accumulate::<f32>,
                double: gemm_accumulate::<f64>,
            },
        ),
        (
            AXPY_KERNEL,
            NativeKernel {
                single: axpy::<f32>,
                double: axpy::<f64>,
            },
        ),
    ]
}

/// Copy of a buffer the kernel is allowed to read
fn snapshot<T: DeviceFloat>(args: &KernelArguments, index: usize) -> Result<Vec<T>> {
    let (buffer, mode) = args.buffer::<T>(index)?;
    if !mode.is_readable() {
        return Err(Error::ArgumentType {
            index,
            expected: "readable buffer".to_string(),
        });
    }
    Ok(buffer.to_vec())
}

fn index_arg(args: &KernelArguments, index: usize) -> Result<usize> {
    args.uint(index).map(|v| v as usize)
}

/// Ensure `offset + sum((count - 1) * stride)` stays inside a buffer of `len`
fn check_extent(index: usize, len: usize, offset: usize, dims: &[(usize, usize)]) -> Result<()> {
    if dims.iter().any(|&(count, _)| count == 0) {
        return Ok(());
    }
    let last = dims.iter().fold(offset, |acc, &(count, stride)| {
        acc.saturating_add((count - 1).saturating_mul(stride))
    });
    if last >= len {
        return Err(Error::Launch(format!(
            "argument {index} addresses element {last} of a buffer of {len}"
        )));
    }
    Ok(())
}

fn gemm_overwrite<T: DeviceFloat>(
    engine: &Engine,
    range: &KernelRange,
    args: &KernelArguments,
) -> Result<()> {
    gemm::<T>(engine, range, args, false)
}

fn gemm_accumulate<T: DeviceFloat>(
    engine: &Engine,
    range: &KernelRange,
    args: &KernelArguments,
) -> Result<()> {
    gemm::<T>(engine, range, args, true)
}

/// `c[i, j] = alpha * sum_l a[i, l] * b[l, j] (+ beta * c[i, j])` over range `(m, n)`
fn gemm<T: DeviceFloat>(
    engine: &Engine,
    range: &KernelRange,
    args: &KernelArguments,
    accumulate: bool,
) -> Result<()> {
    let (m, n) = range.as_2d()?;
    let k = index_arg(args, 0)?;
    let alpha: T = args.scalar(1)?;
    let a = snapshot::<T>(args, 2)?;
    let (a_row, a_inner, off_a) = (index_arg(args, 3)?, index_arg(args, 4)?, index_arg(args, 5)?);
    let b = snapshot::<T>(args, 6)?;
    let (b_inner, b_col, off_b) = (index_arg(args, 7)?, index_arg(args, 8)?, index_arg(args, 9)?);
    let beta: T = args.scalar(10)?;
    let (c_buffer, c_mode) = args.buffer::<T>(11)?;
    let (c_row, c_col, off_c) = (index_arg(args, 12)?, index_arg(args, 13)?, index_arg(args, 14)?);

    if !c_mode.is_writable() || (accumulate && !c_mode.is_readable()) {
        let expected = if accumulate { "read-write buffer" } else { "writable buffer" };
        return Err(Error::ArgumentType {
            index: 11,
            expected: expected.to_string(),
        });
    }

    check_extent(2, a.len(), off_a, &[(m, a_row), (k, a_inner)])?;
    check_extent(6, b.len(), off_b, &[(k, b_inner), (n, b_col)])?;

    let products = engine.execute_batch(m * n, |idx| {
        let (i, j) = (idx % m, idx / m);
        let mut sum = T::zero();
        for l in 0..k {
            sum += a[off_a + i * a_row + l * a_inner] * b[off_b + l * b_inner + j * b_col];
        }
        alpha * sum
    });

    let mut c = c_buffer.write();
    check_extent(11, c.len(), off_c, &[(m, c_row), (n, c_col)])?;
    for (idx, value) in products.into_iter().enumerate() {
        let ci = off_c + (idx % m) * c_row + (idx / m) * c_col;
        c[ci] = if accumulate { value + beta * c[ci] } else { value };
    }
    Ok(())
}

/// `y[i * incy] += a * x[i * incx]` over range `(n)`
fn axpy<T: DeviceFloat>(engine: &Engine, range: &KernelRange, args: &KernelArguments) -> Result<()> {
    let n = range.as_1d()?;
    let a: T = args.scalar(0)?;
    let x = snapshot::<T>(args, 1)?;
    let incx = args.int(2)?;
    let (y_buffer, y_mode) = args.buffer::<T>(3)?;
    let incy = args.int(4)?;

    if y_mode != crate::AccessMode::ReadWrite {
        return Err(Error::ArgumentType {
            index: 3,
            expected: "read-write buffer".to_string(),
        });
    }
    if incx <= 0 || incy <= 0 {
        return Err(Error::Launch(format!(
            "axpy increments must be positive, got incx={incx} incy={incy}"
        )));
    }
    let (incx, incy) = (incx as usize, incy as usize);
    check_extent(1, x.len(), 0, &[(n, incx)])?;

    let scaled = engine.execute_batch(n, |i| a * x[i * incx]);

    let mut y = y_buffer.write();
    check_extent(3, y.len(), 0, &[(n, incy)])?;
    for (i, v) in scaled.into_iter().enumerate() {
        y[i * incy] += v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessMode, Buffer};

    fn gemm_args(a: &Buffer<f64>, b: &Buffer<f64>, c: &Buffer<f64>, c_mode: AccessMode) -> KernelArguments {
        // 2x2 identity times 2x2, both column-major with ld 2
        let mut args = KernelArguments::new(15);
        args.set(0, 2u32)
            .set(1, 1.0f64)
            .set_buffer(2, a, AccessMode::Read)
            .set(3, 1u32)
            .set(4, 2u32)
            .set(5, 0u32)
            .set_buffer(6, b, AccessMode::Read)
            .set(7, 1u32)
            .set(8, 2u32)
            .set(9, 0u32)
            .set(10, 0.0f64)
            .set_buffer(11, c, c_mode)
            .set(12, 1u32)
            .set(13, 2u32)
            .set(14, 0u32);
        args
    }

    #[test]
    fn test_check_extent() {
        assert!(check_extent(0, 6, 0, &[(2, 1), (3, 2)]).is_ok());
        assert!(check_extent(0, 5, 0, &[(2, 1), (3, 2)]).is_err());
        assert!(check_extent(0, 0, 10, &[(0, 1)]).is_ok());
    }

    #[test]
    fn test_gemm_rejects_read_only_output() {
        let a = Buffer::from_vec(vec![1.0, 0.0, 0.0, 1.0]);
        let b = Buffer::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let c = Buffer::zeros(4);
        let args = gemm_args(&a, &b, &c, AccessMode::Read);
        let err = gemm::<f64>(&Engine::sequential(), &KernelRange::two_dim(2, 2), &args, false)
            .unwrap_err();
        assert!(matches!(err, Error::ArgumentType { index: 11, .. }));

        let args = gemm_args(&a, &b, &c, AccessMode::Write);
        assert!(gemm::<f64>(&Engine::sequential(), &KernelRange::two_dim(2, 2), &args, true).is_err());
        gemm::<f64>(&Engine::sequential(), &KernelRange::two_dim(2, 2), &args, false).unwrap();
        assert_eq!(c.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_gemm_out_of_bounds_is_launch_error() {
        let a = Buffer::from_vec(vec![1.0, 0.0, 0.0]);
        let b = Buffer::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let c = Buffer::zeros(4);
        let args = gemm_args(&a, &b, &c, AccessMode::Write);
        let err = gemm::<f64>(&Engine::sequential(), &KernelRange::two_dim(2, 2), &args, false)
            .unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
        assert_eq!(c.to_vec(), vec![0.0; 4]);
    }

    #[test]
    fn test_axpy_strided() {
        let x = Buffer::from_vec(vec![1.0f32, -1.0, 2.0, -1.0]);
        let y = Buffer::from_vec(vec![0.0f32; 6]);
        let mut args = KernelArguments::new(5);
        args.set(0, 3.0f32)
            .set_buffer(1, &x, AccessMode::Read)
            .set(2, 2i32)
            .set_buffer(3, &y, AccessMode::ReadWrite)
            .set(4, 3i32);
        axpy::<f32>(&Engine::sequential(), &KernelRange::one_dim(2), &args).unwrap();
        assert_eq!(y.to_vec(), vec![3.0, 0.0, 0.0, 6.0, 0.0, 0.0]);

        args.set(2, 0i32);
        assert!(axpy::<f32>(&Engine::sequential(), &KernelRange::one_dim(2), &args).is_err());
    }
}
