//! Device cross-entropy kernel
//!
//! The batch rows are gathered into a row-major `b x p` buffer, which the
//! GEMM reads as the column-major `p x b` matrix `X^T`. The coefficient
//! vector is the column-major `(p + 1) x C` matrix `B` with the intercepts
//! in row 0, so starting at offset 1 with leading dimension `p + 1` it is the
//! `p x C` weight block `W`.
//!
//! ```text
//! Z      = W^T X^T                  C x b    (overwrite)
//! G[1..] = X^T R^T                  p x C    (overwrite, ldc = p + 1)
//! G     += 2 l2 * B_masked                   (axpy)
//! ```
//!
//! `R` holds `(softmax(Z) - onehot(y)) / b`; softmax, the intercept terms and
//! the loss value are evaluated on the host.

use super::kernel::{penalty, softmax_in_place, write_result, LossData};
use super::types::{CrossEntropyInput, CrossEntropyParameter, CrossEntropyResult, ResultId, ResultsToCompute};
use super::CrossEntropyLoss;
use crate::container::Kernel;
use hetero_core::{Status, Transpose};
use hetero_exec::{Buffer, DeviceFloat, ExecutionContext, ReferenceAxpy, ReferenceGemm};
use std::sync::Arc;
use tracing::trace;

type Outcome<T> = std::result::Result<T, Status>;

/// Cross-entropy loss on an execution context
#[derive(Debug, Clone)]
pub struct DeviceCrossEntropyKernel<T: DeviceFloat> {
    context: Arc<ExecutionContext>,
    gemm: ReferenceGemm<T>,
    axpy: ReferenceAxpy<T>,
}

impl<T: DeviceFloat> DeviceCrossEntropyKernel<T> {
    pub fn new(context: Arc<ExecutionContext>) -> Self {
        Self {
            context,
            gemm: ReferenceGemm::new(),
            axpy: ReferenceAxpy::new(),
        }
    }

    fn run(
        &self,
        input: &CrossEntropyInput,
        parameter: &CrossEntropyParameter,
        result: &mut CrossEntropyResult,
    ) -> Outcome<()> {
        let ctx = self.context.as_ref();
        let data = LossData::<T>::load(input, parameter)?;
        let flags = parameter.results_to_compute;
        let (p, classes, stride, b) = (data.p, data.n_classes, data.stride(), data.batch.len());

        let gathered: Vec<T> = data.batch.iter().flat_map(|&i| data.row(i).iter().copied()).collect();
        let x = Buffer::from_vec(gathered);
        let beta = Buffer::from_vec(data.beta.clone());
        let logits = Buffer::zeros(classes * b);

        let status = self.gemm.compute(
            ctx,
            Transpose::Trans,
            Transpose::NoTrans,
            classes,
            b,
            p,
            T::one(),
            &beta,
            stride,
            1,
            &x,
            p,
            0,
            T::zero(),
            &logits,
            classes,
            0,
        );
        status.into_result()?;

        let inv_b = T::from_f64_lossy(1.0 / b as f64);
        let mut residuals = logits.to_vec();
        let mut nll = 0.0;
        for (j, &i) in data.batch.iter().enumerate() {
            let column = &mut residuals[j * classes..(j + 1) * classes];
            for (c, z) in column.iter_mut().enumerate() {
                *z += data.intercept(c, parameter.intercept_flag);
            }
            let label = data.labels[i];
            let true_logit = column[label];
            let (max, log_norm) = softmax_in_place(column);
            nll -= (true_logit - max - log_norm).as_f64();
            column[label] -= T::one();
            column.iter_mut().for_each(|r| *r *= inv_b);
        }

        if flags.contains(ResultsToCompute::GRADIENT) {
            let gradient = Buffer::zeros(classes * stride);
            let r = Buffer::from_vec(residuals);
            let status = self.gemm.compute(
                ctx,
                Transpose::NoTrans,
                Transpose::Trans,
                p,
                classes,
                b,
                T::one(),
                &x,
                p,
                0,
                &r,
                classes,
                0,
                T::zero(),
                &gradient,
                stride,
                1,
            );
            status.into_result()?;

            if parameter.intercept_flag {
                let r = r.read();
                let mut g = gradient.write();
                for c in 0..classes {
                    g[c * stride] = (0..b).fold(T::zero(), |acc, j| acc + r[c + j * classes]);
                }
            }

            if parameter.penalty_l2 > 0.0 {
                let mut masked = data.beta.clone();
                (0..classes).for_each(|c| masked[c * stride] = T::zero());
                let status = self.axpy.compute(
                    ctx,
                    classes * stride,
                    T::from_f64_lossy(2.0 * parameter.penalty_l2),
                    &Buffer::from_vec(masked),
                    1,
                    &gradient,
                    1,
                );
                status.into_result()?;
            }
            write_result(result, ResultId::Gradient, &gradient.to_vec())?;
        }

        if flags.contains(ResultsToCompute::VALUE) {
            let value = nll / b as f64 + penalty(&data, parameter);
            write_result(result, ResultId::Value, &[T::from_f64_lossy(value)])?;
        }
        trace!(batch = b, p, classes, compiles = ctx.compile_count(), "loss computed on device");
        Ok(())
    }
}

impl<T: DeviceFloat> Kernel<CrossEntropyLoss, T> for DeviceCrossEntropyKernel<T> {
    fn name(&self) -> &'static str {
        "cross_entropy_device"
    }

    fn compute(
        &self,
        input: &CrossEntropyInput,
        parameter: &CrossEntropyParameter,
        result: &mut CrossEntropyResult,
    ) -> Status {
        match self.run(input, parameter, result) {
            Ok(()) => Status::ok(),
            Err(status) => status,
        }
    }
}
