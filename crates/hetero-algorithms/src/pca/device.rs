//! Device PCA kernel
//!
//! The cross-product matrix and the column sums run as reference GEMM
//! launches on the environment's execution context:
//!
//! ```text
//! C     = X^T X                     (overwrite)
//! mu    = X^T 1 / n                 (overwrite)
//! C     = C - n * mu mu^T           (accumulate)
//! ```
//!
//! The row-major n x p data buffer is read as the column-major p x n matrix
//! X^T with leading dimension p, so no transpose copy is needed.

use super::kernel::{correlation_from_covariance, eigen_from_correlation, store};
use super::types::{BaseParameter, CorrelationParameter, InputDataKind, PcaInput, PcaResult};
use super::PcaCorrelation;
use crate::container::Kernel;
use hetero_core::table::downcast;
use hetero_core::{Error, Status, Transpose};
use hetero_exec::{Buffer, DeviceFloat, ExecutionContext, ReferenceGemm};
use std::sync::Arc;
use tracing::trace;

/// Device results or the status of the launch that failed
type Outcome<T> = std::result::Result<T, Status>;

/// Covariance (row-major p x p) and per-feature means and variances
struct DeviceMoments {
    covariance: Vec<f64>,
    means: Vec<f64>,
    variances: Vec<f64>,
}

/// PCA through the correlation matrix on an execution context
#[derive(Debug, Clone)]
pub struct DeviceCorrelationKernel<T: DeviceFloat> {
    context: Arc<ExecutionContext>,
    gemm: ReferenceGemm<T>,
}

impl<T: DeviceFloat> DeviceCorrelationKernel<T> {
    pub fn new(context: Arc<ExecutionContext>) -> Self {
        Self {
            context,
            gemm: ReferenceGemm::new(),
        }
    }

    fn cross_product(&self, x: &Buffer<T>, n: usize, p: usize) -> Outcome<(Buffer<T>, Buffer<T>)> {
        let ctx = self.context.as_ref();
        let cross = Buffer::zeros(p * p);
        let mu = Buffer::zeros(p);
        let ones = Buffer::filled(n, T::one());

        let status = self.gemm.compute(
            ctx,
            Transpose::NoTrans,
            Transpose::Trans,
            p,
            p,
            n,
            T::one(),
            x,
            p,
            0,
            x,
            p,
            0,
            T::zero(),
            &cross,
            p,
            0,
        );
        status.into_result()?;

        let status = self.gemm.compute(
            ctx,
            Transpose::NoTrans,
            Transpose::NoTrans,
            p,
            1,
            n,
            T::from_f64_lossy(1.0 / n as f64),
            x,
            p,
            0,
            &ones,
            n,
            0,
            T::zero(),
            &mu,
            p,
            0,
        );
        status.into_result()?;

        let status = self.gemm.compute(
            ctx,
            Transpose::NoTrans,
            Transpose::Trans,
            p,
            p,
            1,
            T::from_f64_lossy(-(n as f64)),
            &mu,
            p,
            0,
            &mu,
            p,
            0,
            T::one(),
            &cross,
            p,
            0,
        );
        status.into_result()?;

        trace!(n, p, compiles = ctx.compile_count(), "cross product computed");
        Ok((cross, mu))
    }

    fn moments(&self, data: Vec<T>, n: usize, p: usize) -> Outcome<DeviceMoments> {
        let (cross, mu) = self.cross_product(&Buffer::from_vec(data), n, p)?;
        let denom = (n - 1) as f64;
        // Symmetric, so the column-major result reads the same row-major
        let covariance: Vec<f64> = cross.read().iter().map(|v| v.as_f64() / denom).collect();
        let variances = (0..p).map(|j| covariance[j * p + j]).collect();
        let means = mu.read().iter().map(|v| v.as_f64()).collect();
        Ok(DeviceMoments {
            covariance,
            means,
            variances,
        })
    }

    fn run(&self, input: &PcaInput, base: &BaseParameter, result: &mut PcaResult) -> Outcome<()> {
        let data = input
            .data()
            .ok_or_else(|| Error::InvalidInput("pca data is not set".into()))?;
        let (n, p) = (data.n_rows(), data.n_columns());
        let values = downcast::<T>(data)?.to_vec();

        if input.kind() == InputDataKind::Correlation {
            let corr: Vec<f64> = values.iter().map(|v| v.as_f64()).collect();
            store::<T>(result, base, eigen_from_correlation(&corr, p), None, None)?;
            return Ok(());
        }

        let m = self.moments(values, n, p)?;
        let corr = correlation_from_covariance(&m.covariance, p);
        store::<T>(
            result,
            base,
            eigen_from_correlation(&corr, p),
            Some(&m.means),
            Some(&m.variances),
        )?;
        Ok(())
    }
}

impl<T: DeviceFloat> Kernel<PcaCorrelation, T> for DeviceCorrelationKernel<T> {
    fn name(&self) -> &'static str {
        "pca_correlation_device"
    }

    fn compute(&self, input: &PcaInput, parameter: &CorrelationParameter, result: &mut PcaResult) -> Status {
        match self.run(input, &parameter.base, result) {
            Ok(()) => Status::ok(),
            Err(status) => status,
        }
    }
}
