//! CPU cross-entropy kernel and the loss helpers shared with the device kernel
//!
//! For observation `i` and class `c` the logit is
//! `z_ic = b_c0 + sum_j b_cj x_ij` (the intercept `b_c0` is dropped when the
//! model has none). The loss is the mean negative log-softmax of the true
//! class over the batch plus `l2 * sum b_cj^2 + l1 * sum |b_cj|` over the
//! non-intercept coefficients. The gradient carries the L2 term only.

use super::types::{
    CrossEntropyInput, CrossEntropyParameter, CrossEntropyResult, ResultId, ResultsToCompute,
};
use super::CrossEntropyLoss;
use crate::container::Kernel;
use hetero_core::table::downcast;
use hetero_core::{ComputePrimitives, Error, KernelFloat, NumericTablePtr, Result, Status};
use std::marker::PhantomData;
use tracing::trace;

/// Dense views of the loss input in the working precision
pub(crate) struct LossData<T> {
    pub beta: Vec<T>,
    pub x: Vec<T>,
    pub labels: Vec<usize>,
    pub p: usize,
    pub n_classes: usize,
    pub batch: Vec<usize>,
}

fn table<'a>(table: Option<&'a NumericTablePtr>, what: &str) -> Result<&'a NumericTablePtr> {
    table.ok_or_else(|| Error::InvalidInput(format!("{what} is not set")))
}

impl<T: KernelFloat> LossData<T> {
    pub fn load(input: &CrossEntropyInput, parameter: &CrossEntropyParameter) -> Result<Self> {
        let data = table(input.data(), "data")?;
        let beta = downcast::<T>(table(input.argument(), "argument")?)?.to_vec();
        let x = downcast::<T>(data)?.to_vec();
        let raw_labels = downcast::<T>(table(input.dependent_variables(), "dependent variables")?)?.to_vec();

        let labels = raw_labels
            .iter()
            .map(|&v| {
                let v = v.as_f64();
                if v >= 0.0 && v.fract() == 0.0 && (v as usize) < parameter.n_classes {
                    Ok(v as usize)
                } else {
                    Err(Error::InvalidInput(format!(
                        "class label {v} is not in 0..{}",
                        parameter.n_classes
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            beta,
            x,
            labels,
            p: data.n_columns(),
            n_classes: parameter.n_classes,
            batch: parameter.batch(),
        })
    }

    pub fn stride(&self) -> usize {
        self.p + 1
    }

    /// Row `i` of the data
    pub fn row(&self, i: usize) -> &[T] {
        &self.x[i * self.p..(i + 1) * self.p]
    }

    /// Non-intercept coefficients of class `c`
    pub fn weights(&self, c: usize) -> &[T] {
        let start = c * self.stride() + 1;
        &self.beta[start..start + self.p]
    }

    /// Intercept of class `c`, zero without an intercept term
    pub fn intercept(&self, c: usize, intercept_flag: bool) -> T {
        if intercept_flag {
            self.beta[c * self.stride()]
        } else {
            T::zero()
        }
    }
}

/// Softmax of `logits` in place; returns the log of the normaliser after the
/// max shift, so `log p_c = z_c - max - log_norm`
pub(crate) fn softmax_in_place<T: KernelFloat>(logits: &mut [T]) -> (T, T) {
    let max = logits.iter().copied().fold(T::neg_infinity(), T::max);
    let mut norm = T::zero();
    for z in logits.iter_mut() {
        *z = (*z - max).exp();
        norm += *z;
    }
    for z in logits.iter_mut() {
        *z /= norm;
    }
    (max, norm.ln())
}

/// `l2 * sum b^2 + l1 * sum |b|` over the non-intercept coefficients
pub(crate) fn penalty<T: KernelFloat>(data: &LossData<T>, parameter: &CrossEntropyParameter) -> f64 {
    if parameter.penalty_l1 == 0.0 && parameter.penalty_l2 == 0.0 {
        return 0.0;
    }
    (0..data.n_classes)
        .flat_map(|c| data.weights(c).iter())
        .map(|b| {
            let b = b.as_f64();
            parameter.penalty_l2 * b * b + parameter.penalty_l1 * b.abs()
        })
        .sum()
}

/// Write `values` into the allocated result table `id`
pub(crate) fn write_result<T: KernelFloat>(result: &CrossEntropyResult, id: ResultId, values: &[T]) -> Result<()> {
    let table = result
        .get(id)
        .ok_or_else(|| Error::NullResult(id.name().to_string()))?;
    let mut data = downcast::<T>(table)?.write();
    if data.len() != values.len() {
        return Err(Error::size_mismatch(id.name(), data.len(), values.len()));
    }
    data.copy_from_slice(values);
    Ok(())
}

/// Cross-entropy loss on the CPU
#[derive(Debug, Clone)]
pub struct CrossEntropyKernel<T, B> {
    backend: B,
    _marker: PhantomData<fn() -> T>,
}

impl<T: KernelFloat, B: ComputePrimitives<T>> CrossEntropyKernel<T, B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            _marker: PhantomData,
        }
    }

    fn run(&self, input: &CrossEntropyInput, parameter: &CrossEntropyParameter, result: &mut CrossEntropyResult) -> Result<()> {
        let data = LossData::<T>::load(input, parameter)?;
        let flags = parameter.results_to_compute;
        let (p, classes, stride) = (data.p, data.n_classes, data.stride());
        let inv_b = T::from_f64_lossy(1.0 / data.batch.len() as f64);

        let mut nll = 0.0;
        let mut gradient = vec![T::zero(); classes * stride];
        let mut probabilities = vec![T::zero(); classes];

        for &i in &data.batch {
            let row = data.row(i);
            for (c, z) in probabilities.iter_mut().enumerate() {
                *z = data.intercept(c, parameter.intercept_flag)
                    + self.backend.dot_product(data.weights(c), row);
            }
            let label = data.labels[i];
            let true_logit = probabilities[label];
            let (max, log_norm) = softmax_in_place(&mut probabilities);
            nll -= (true_logit - max - log_norm).as_f64();

            if flags.contains(ResultsToCompute::GRADIENT) {
                for (c, &prob) in probabilities.iter().enumerate() {
                    let indicator = if c == label { T::one() } else { T::zero() };
                    let r = (prob - indicator) * inv_b;
                    let block = &mut gradient[c * stride..(c + 1) * stride];
                    if parameter.intercept_flag {
                        block[0] += r;
                    }
                    self.backend.axpy(r, row, &mut block[1..]);
                }
            }
        }

        if flags.contains(ResultsToCompute::GRADIENT) {
            if parameter.penalty_l2 > 0.0 {
                let two_l2 = T::from_f64_lossy(2.0 * parameter.penalty_l2);
                for c in 0..classes {
                    self.backend
                        .axpy(two_l2, data.weights(c), &mut gradient[c * stride + 1..(c + 1) * stride]);
                }
            }
            write_result(result, ResultId::Gradient, &gradient)?;
        }
        if flags.contains(ResultsToCompute::VALUE) {
            let value = nll / data.batch.len() as f64 + penalty(&data, parameter);
            write_result(result, ResultId::Value, &[T::from_f64_lossy(value)])?;
        }
        trace!(batch = data.batch.len(), p, classes, backend = self.backend.backend_name(), "loss computed");
        Ok(())
    }
}

impl<T: KernelFloat, B: ComputePrimitives<T> + 'static> Kernel<CrossEntropyLoss, T> for CrossEntropyKernel<T, B> {
    fn name(&self) -> &'static str {
        "cross_entropy_cpu"
    }

    fn compute(&self, input: &CrossEntropyInput, parameter: &CrossEntropyParameter, result: &mut CrossEntropyResult) -> Status {
        self.run(input, parameter, result).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_softmax_in_place() {
        let mut z = [1.0f64, 2.0, 3.0];
        let (max, log_norm) = softmax_in_place(&mut z);
        assert_eq!(max, 3.0);
        assert_relative_eq!(z.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(z[2].ln(), 3.0 - max - log_norm, epsilon = 1e-12);

        // Large logits stay finite
        let mut z = [1000.0f32, 1000.0];
        softmax_in_place(&mut z);
        assert_eq!(z, [0.5, 0.5]);
    }
}
