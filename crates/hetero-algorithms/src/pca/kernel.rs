//! CPU PCA kernels
//!
//! Moments are computed in the working precision with the backend's
//! primitives; the decomposition itself runs in f64 through nalgebra.

use super::types::{
    BaseParameter, CorrelationParameter, DataForTransformKey, InputDataKind, PcaInput, PcaResult,
    ResultCollectionId, ResultId, ResultsToCompute, SvdParameter,
};
use super::{PcaCorrelation, PcaSvd};
use crate::container::Kernel;
use anyhow::anyhow;
use hetero_core::table::downcast;
use hetero_core::{ComputePrimitives, Error, KernelFloat, KeyValueCollection, Result, Status};
use nalgebra::DMatrix;
use std::cmp::Ordering;
use std::marker::PhantomData;
use tracing::trace;

/// Eigen pairs sorted by descending eigenvalue
pub(crate) struct EigenPairs {
    pub values: Vec<f64>,
    /// One eigenvector per entry, `p` elements each
    pub vectors: Vec<Vec<f64>>,
}

fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].partial_cmp(&values[a]).unwrap_or(Ordering::Equal));
    order
}

/// Eigen decomposition of a row-major p x p symmetric matrix
pub(crate) fn eigen_from_correlation(corr: &[f64], p: usize) -> EigenPairs {
    let matrix = DMatrix::from_fn(p, p, |i, j| corr[i * p + j]);
    let eigen = matrix.symmetric_eigen();
    let values: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
    let order = descending_order(&values);
    EigenPairs {
        values: order.iter().map(|&i| values[i]).collect(),
        vectors: order
            .iter()
            .map(|&i| eigen.eigenvectors.column(i).iter().copied().collect())
            .collect(),
    }
}

/// Flip `vector` so its largest-magnitude element is positive
fn normalize_sign(vector: &mut [f64]) {
    let pivot = vector
        .iter()
        .copied()
        .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap_or(Ordering::Equal));
    if let Some(pivot) = pivot {
        if pivot < 0.0 {
            vector.iter_mut().for_each(|v| *v = -*v);
        }
    }
}

/// Correlation matrix (row-major) from a covariance matrix
///
/// A feature with zero variance is reported as uncorrelated with the others.
pub(crate) fn correlation_from_covariance(cov: &[f64], p: usize) -> Vec<f64> {
    let mut corr = vec![0.0; p * p];
    for i in 0..p {
        for j in 0..p {
            let scale = (cov[i * p + i] * cov[j * p + j]).sqrt();
            corr[i * p + j] = if i == j {
                1.0
            } else if scale > 0.0 {
                cov[i * p + j] / scale
            } else {
                0.0
            };
        }
    }
    corr
}

fn write_table<T: KernelFloat>(result: &PcaResult, id: ResultId, values: &[f64]) -> Result<()> {
    let table = result
        .get(id)
        .ok_or_else(|| Error::NullResult(id.name().to_string()))?;
    let table = downcast::<T>(table)?;
    let mut data = table.write();
    if data.len() != values.len() {
        return Err(Error::size_mismatch(id.name(), data.len(), values.len()));
    }
    for (dst, &src) in data.iter_mut().zip(values) {
        *dst = T::from_f64_lossy(src);
    }
    Ok(())
}

/// Write eigen pairs and moments into the allocated result tables
pub(crate) fn store<T: KernelFloat>(
    result: &mut PcaResult,
    base: &BaseParameter,
    mut pairs: EigenPairs,
    means: Option<&[f64]>,
    variances: Option<&[f64]>,
) -> Result<()> {
    let p = pairs.vectors.first().map_or(0, Vec::len);
    let comps = base.components_for(p);
    pairs.values.truncate(comps);
    pairs.vectors.truncate(comps);
    if base.is_deterministic {
        pairs.vectors.iter_mut().for_each(|v| normalize_sign(v));
    }

    write_table::<T>(result, ResultId::Eigenvalues, &pairs.values)?;
    write_table::<T>(result, ResultId::Eigenvectors, &pairs.vectors.concat())?;

    let flags = base.results_to_compute;
    if let (true, Some(means)) = (flags.contains(ResultsToCompute::MEAN), means) {
        write_table::<T>(result, ResultId::Means, means)?;
    }
    if let (true, Some(variances)) = (flags.contains(ResultsToCompute::VARIANCE), variances) {
        write_table::<T>(result, ResultId::Variances, variances)?;
    }

    let mut collection = KeyValueCollection::new();
    let present = |flag: ResultsToCompute, id: ResultId| {
        if flags.contains(flag) {
            result.get(id).cloned()
        } else {
            None
        }
    };
    collection.insert(DataForTransformKey::Mean, present(ResultsToCompute::MEAN, ResultId::Means));
    collection.insert(
        DataForTransformKey::Variance,
        present(ResultsToCompute::VARIANCE, ResultId::Variances),
    );
    collection.insert(
        DataForTransformKey::Eigenvalue,
        present(ResultsToCompute::EIGENVALUE, ResultId::Eigenvalues),
    );
    result.replace_collection(ResultCollectionId::DataForTransform, collection);
    Ok(())
}

/// Centered columns of a row-major n x p table, with means and variances
struct Moments<T> {
    columns: Vec<Vec<T>>,
    means: Vec<f64>,
    variances: Vec<f64>,
}

fn moments<T: KernelFloat, B: ComputePrimitives<T>>(backend: &B, data: &[T], n: usize, p: usize) -> Moments<T> {
    let denom = T::from_f64_lossy((n - 1) as f64);
    let mut columns = Vec::with_capacity(p);
    let mut means = Vec::with_capacity(p);
    let mut variances = Vec::with_capacity(p);
    for j in 0..p {
        let mut column: Vec<T> = (0..n).map(|i| data[i * p + j]).collect();
        let mean = backend.mean(&column);
        column.iter_mut().for_each(|v| *v -= mean);
        let variance = backend.dot_product(&column, &column) / denom;
        means.push(mean.as_f64());
        variances.push(variance.as_f64());
        columns.push(column);
    }
    Moments {
        columns,
        means,
        variances,
    }
}

fn input_values<T: KernelFloat>(input: &PcaInput) -> Result<(Vec<T>, usize, usize)> {
    let data = input
        .data()
        .ok_or_else(|| Error::InvalidInput("pca data is not set".into()))?;
    let table = downcast::<T>(data)?;
    Ok((table.to_vec(), data.n_rows(), data.n_columns()))
}

/// PCA through the correlation matrix on the CPU
#[derive(Debug, Clone)]
pub struct CorrelationKernel<T, B> {
    backend: B,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: KernelFloat, B: ComputePrimitives<T>> CorrelationKernel<T, B> {
    pub fn new(backend: B) -> Self {
        let name = match backend.backend_name() {
            "avx2" => "pca_correlation_avx2",
            _ => "pca_correlation_scalar",
        };
        Self {
            backend,
            name,
            _marker: PhantomData,
        }
    }

    fn run(&self, input: &PcaInput, base: &BaseParameter, result: &mut PcaResult) -> Result<()> {
        let (data, n, p) = input_values::<T>(input)?;
        if input.kind() == InputDataKind::Correlation {
            let corr: Vec<f64> = data.iter().map(|v| v.as_f64()).collect();
            return store::<T>(result, base, eigen_from_correlation(&corr, p), None, None);
        }

        let m = moments(&self.backend, &data, n, p);
        let denom = T::from_f64_lossy((n - 1) as f64);
        let mut cov = vec![0.0; p * p];
        for i in 0..p {
            for j in i..p {
                let c = (self.backend.dot_product(&m.columns[i], &m.columns[j]) / denom).as_f64();
                cov[i * p + j] = c;
                cov[j * p + i] = c;
            }
        }
        trace!(n, p, backend = self.backend.backend_name(), "covariance computed");
        let corr = correlation_from_covariance(&cov, p);
        store::<T>(result, base, eigen_from_correlation(&corr, p), Some(&m.means), Some(&m.variances))
    }
}

impl<T: KernelFloat, B: ComputePrimitives<T> + 'static> Kernel<PcaCorrelation, T> for CorrelationKernel<T, B> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn compute(&self, input: &PcaInput, parameter: &CorrelationParameter, result: &mut PcaResult) -> Status {
        self.run(input, &parameter.base, result).into()
    }
}

/// PCA through an SVD of the standardised observations on the CPU
#[derive(Debug, Clone)]
pub struct SvdKernel<T, B> {
    backend: B,
    _marker: PhantomData<fn() -> T>,
}

impl<T: KernelFloat, B: ComputePrimitives<T>> SvdKernel<T, B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }

    fn run(&self, input: &PcaInput, base: &BaseParameter, result: &mut PcaResult) -> Result<()> {
        let (data, n, p) = input_values::<T>(input)?;
        let m = moments(&self.backend, &data, n, p);
        let normalized = input.kind() == InputDataKind::Normalized;

        let scales: Vec<f64> = m
            .variances
            .iter()
            .map(|&v| if normalized || v <= 0.0 { 1.0 } else { v.sqrt() })
            .collect();
        let z = DMatrix::from_fn(n, p, |i, j| m.columns[j][i].as_f64() / scales[j]);

        let svd = z.svd(false, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| Error::Other(anyhow!("svd produced no right singular vectors")))?;
        let squares: Vec<f64> = svd
            .singular_values
            .iter()
            .map(|s| s * s / (n - 1) as f64)
            .collect();
        let order = descending_order(&squares);
        let pairs = EigenPairs {
            values: order.iter().map(|&i| squares[i]).collect(),
            vectors: order.iter().map(|&i| v_t.row(i).iter().copied().collect()).collect(),
        };
        trace!(n, p, "svd computed");
        store::<T>(result, base, pairs, Some(&m.means), Some(&m.variances))
    }
}

impl<T: KernelFloat, B: ComputePrimitives<T> + 'static> Kernel<PcaSvd, T> for SvdKernel<T, B> {
    fn name(&self) -> &'static str {
        "pca_svd"
    }

    fn compute(&self, input: &PcaInput, parameter: &SvdParameter, result: &mut PcaResult) -> Status {
        self.run(input, &parameter.base, result).into()
    }
}
