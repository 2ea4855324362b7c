//! Cross-entropy loss input, parameter and result

use crate::algorithm::{MethodId, ParameterDescriptor, ResultDescriptor};
use crate::archive::{Archivable, TableRecord};
use crate::output::OutputTables;
use bitflags::bitflags;
use hetero_core::table::check_shape;
use hetero_core::{check_status, Error, KernelFloat, NumericTablePtr, Result, Status};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

bitflags! {
    /// Loss outputs to compute
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResultsToCompute: u64 {
        const GRADIENT = 1 << 0;
        const VALUE = 1 << 1;
    }
}

impl Default for ResultsToCompute {
    fn default() -> Self {
        Self::GRADIENT
    }
}

/// Cross-entropy loss input
#[derive(Debug, Clone, Default)]
pub struct CrossEntropyInput {
    argument: Option<NumericTablePtr>,
    data: Option<NumericTablePtr>,
    dependent_variables: Option<NumericTablePtr>,
}

impl CrossEntropyInput {
    /// `argument` is `(p + 1) * n_classes x 1`, class after class with the
    /// intercept first; `data` is `n x p`; `dependent_variables` is `n x 1`.
    pub fn new(
        argument: NumericTablePtr,
        data: NumericTablePtr,
        dependent_variables: NumericTablePtr,
    ) -> Self {
        Self {
            argument: Some(argument),
            data: Some(data),
            dependent_variables: Some(dependent_variables),
        }
    }

    pub fn argument(&self) -> Option<&NumericTablePtr> {
        self.argument.as_ref()
    }

    pub fn data(&self) -> Option<&NumericTablePtr> {
        self.data.as_ref()
    }

    pub fn dependent_variables(&self) -> Option<&NumericTablePtr> {
        self.dependent_variables.as_ref()
    }

    pub fn set_argument(&mut self, argument: NumericTablePtr) {
        self.argument = Some(argument);
    }

    pub fn set_data(&mut self, data: NumericTablePtr) {
        self.data = Some(data);
    }

    pub fn set_dependent_variables(&mut self, dependent_variables: NumericTablePtr) {
        self.dependent_variables = Some(dependent_variables);
    }

    pub fn n_features(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.n_columns())
    }
}

/// Cross-entropy loss parameter
#[derive(Debug, Clone, PartialEq)]
pub struct CrossEntropyParameter {
    pub n_classes: usize,
    /// Number of observations the loss is defined over
    pub number_of_terms: usize,
    /// Observations to evaluate; `None` uses all of them
    pub batch_indices: Option<Vec<usize>>,
    pub results_to_compute: ResultsToCompute,
    pub penalty_l1: f64,
    pub penalty_l2: f64,
    /// Whether the model has an intercept term per class
    pub intercept_flag: bool,
}

impl CrossEntropyParameter {
    pub fn new(n_classes: usize, number_of_terms: usize) -> Self {
        Self {
            n_classes,
            number_of_terms,
            batch_indices: None,
            results_to_compute: ResultsToCompute::default(),
            penalty_l1: 0.0,
            penalty_l2: 0.0,
            intercept_flag: true,
        }
    }

    pub fn with_results(mut self, results: ResultsToCompute) -> Self {
        self.results_to_compute = results;
        self
    }

    pub fn with_batch_indices(mut self, indices: Vec<usize>) -> Self {
        self.batch_indices = Some(indices);
        self
    }

    pub fn with_penalties(mut self, l1: f64, l2: f64) -> Self {
        self.penalty_l1 = l1;
        self.penalty_l2 = l2;
        self
    }

    pub fn with_intercept(mut self, intercept: bool) -> Self {
        self.intercept_flag = intercept;
        self
    }

    /// Length of the coefficient vector for `n_features` features
    pub fn n_coefficients(&self, n_features: usize) -> usize {
        (n_features + 1) * self.n_classes
    }

    /// Observations evaluated by one computation
    pub fn batch(&self) -> Vec<usize> {
        match &self.batch_indices {
            Some(indices) => indices.clone(),
            None => (0..self.number_of_terms).collect(),
        }
    }
}

fn required<'a>(table: Option<&'a NumericTablePtr>, what: &str, status: &mut Status) -> Option<&'a NumericTablePtr> {
    if table.is_none() {
        status.add(Error::InvalidInput(format!("{what} is not set")));
    }
    table
}

impl ParameterDescriptor<CrossEntropyInput> for CrossEntropyParameter {
    fn check(&self, input: &CrossEntropyInput, _method: MethodId) -> Status {
        let mut status = Status::ok();
        if self.n_classes < 2 {
            status.add(Error::InvalidParameter(format!(
                "n_classes = {} must be at least 2",
                self.n_classes
            )));
        }
        if self.results_to_compute.is_empty() {
            status.add(Error::InvalidParameter("no result requested".into()));
        }
        for (name, value) in [("penalty_l1", self.penalty_l1), ("penalty_l2", self.penalty_l2)] {
            if !value.is_finite() || value < 0.0 {
                status.add(Error::InvalidParameter(format!("{name} = {value} must be a non-negative number")));
            }
        }

        let argument = required(input.argument(), "argument", &mut status);
        let data = required(input.data(), "data", &mut status);
        let labels = required(input.dependent_variables(), "dependent variables", &mut status);
        let (argument, data, labels) = match (argument, data, labels) {
            (Some(a), Some(d), Some(l)) => (a, d, l),
            _ => return status,
        };

        let (n, p) = (data.n_rows(), data.n_columns());
        if n == 0 || p == 0 {
            status.add(Error::empty_input("data"));
            return status;
        }
        if self.number_of_terms != n {
            status.add(Error::InvalidParameter(format!(
                "number_of_terms = {} but data has {n} rows",
                self.number_of_terms
            )));
        }
        if let Err(e) = check_shape(argument, "argument", self.n_coefficients(p), 1) {
            status.add(e);
        }
        if let Err(e) = check_shape(labels, "dependent variables", n, 1) {
            status.add(e);
        }
        match &self.batch_indices {
            Some(indices) if indices.is_empty() => {
                status.add(Error::InvalidParameter("batch_indices is empty".into()));
            }
            Some(indices) => {
                if let Some(bad) = indices.iter().find(|&&i| i >= n) {
                    status.add(Error::InvalidParameter(format!(
                        "batch index {bad} is out of range for {n} observations"
                    )));
                }
            }
            None => {}
        }
        status
    }
}

/// Named loss outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultId {
    /// 1 x 1
    Value,
    /// `(p + 1) * n_classes x 1`
    Gradient,
}

impl ResultId {
    pub fn name(self) -> &'static str {
        match self {
            ResultId::Value => "value",
            ResultId::Gradient => "gradient",
        }
    }
}

/// Cross-entropy loss result
#[derive(Debug, Clone, Default)]
pub struct CrossEntropyResult {
    tables: OutputTables<ResultId>,
}

impl CrossEntropyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ResultId) -> Option<&NumericTablePtr> {
        self.tables.get(id)
    }

    /// Supply storage for `id`; it is filled in place, never reallocated
    pub fn set(&mut self, id: ResultId, table: NumericTablePtr) {
        self.tables.supply(id, table);
    }

    pub fn remove(&mut self, id: ResultId) -> Option<NumericTablePtr> {
        self.tables.remove(id)
    }

    /// Values of a present table, widened to f64
    pub fn values(&self, id: ResultId) -> Option<Vec<f64>> {
        self.get(id).map(|t| t.to_f64_vec())
    }

    fn required(input: &CrossEntropyInput, parameter: &CrossEntropyParameter) -> Vec<(ResultId, usize, usize)> {
        let mut required = Vec::new();
        if parameter.results_to_compute.contains(ResultsToCompute::VALUE) {
            required.push((ResultId::Value, 1, 1));
        }
        if parameter.results_to_compute.contains(ResultsToCompute::GRADIENT) {
            required.push((ResultId::Gradient, parameter.n_coefficients(input.n_features()), 1));
        }
        required
    }
}

impl ResultDescriptor<CrossEntropyInput, CrossEntropyParameter> for CrossEntropyResult {
    fn allocate<T: KernelFloat>(
        &mut self,
        input: &CrossEntropyInput,
        parameter: &CrossEntropyParameter,
        method: MethodId,
    ) -> Status {
        check_status!(parameter.check(input, method));
        self.tables.allocate::<T>(&Self::required(input, parameter));
        Status::ok()
    }

    fn check(&self, input: &CrossEntropyInput, parameter: &CrossEntropyParameter, _method: MethodId) -> Status {
        Self::required(input, parameter)
            .into_iter()
            .filter_map(|(id, rows, cols)| match self.get(id) {
                None => Some(Error::NullResult(id.name().to_string())),
                Some(table) => check_shape(table, id.name(), rows, cols).err(),
            })
            .collect()
    }
}

impl Archivable for CrossEntropyResult {
    const KIND: &'static str = "cross_entropy_result";
    type Record = BTreeMap<ResultId, TableRecord>;

    fn to_record(&self) -> Self::Record {
        self.tables
            .iter()
            .map(|(id, t)| (id, TableRecord::from_table(t)))
            .collect()
    }

    fn from_record(record: Self::Record) -> Result<Self> {
        let mut result = Self::new();
        for (id, table) in record {
            result.tables.adopt(id, table.into_table()?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hetero_core::HomogenTable;

    fn input(n: usize, p: usize, classes: usize) -> CrossEntropyInput {
        CrossEntropyInput::new(
            HomogenTable::<f64>::zeros((p + 1) * classes, 1).into_ptr(),
            HomogenTable::<f64>::zeros(n, p).into_ptr(),
            HomogenTable::<f64>::zeros(n, 1).into_ptr(),
        )
    }

    #[test]
    fn test_valid_parameter() {
        let parameter = CrossEntropyParameter::new(3, 4).with_batch_indices(vec![0, 3]);
        assert!(parameter.check(&input(4, 2, 3), MethodId::DefaultDense).is_ok());
        assert_eq!(parameter.batch(), vec![0, 3]);
        assert_eq!(CrossEntropyParameter::new(3, 4).batch(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_check_reports_each_problem() {
        let parameter = CrossEntropyParameter::new(3, 5)
            .with_batch_indices(vec![1, 9])
            .with_penalties(-1.0, f64::NAN);
        let status = parameter.check(&input(4, 2, 2), MethodId::DefaultDense);
        // l1, l2, number_of_terms, argument shape, batch index
        assert_eq!(status.errors().len(), 5);
        assert!(status
            .errors()
            .iter()
            .any(|e| matches!(e, Error::ShapeMismatch { what, .. } if what == "argument")));
    }

    #[test]
    fn test_missing_inputs() {
        let parameter = CrossEntropyParameter::new(2, 3);
        let status = parameter.check(&CrossEntropyInput::default(), MethodId::DefaultDense);
        assert_eq!(status.errors().len(), 3);
    }

    #[test]
    fn test_allocate_follows_flags() {
        let input = input(4, 2, 3);
        let parameter = CrossEntropyParameter::new(3, 4).with_results(ResultsToCompute::VALUE);
        let mut result = CrossEntropyResult::new();
        assert!(result.allocate::<f32>(&input, &parameter, MethodId::DefaultDense).is_ok());
        assert!(result.get(ResultId::Value).is_some());
        assert!(result.get(ResultId::Gradient).is_none());

        let parameter = parameter.with_results(ResultsToCompute::all());
        assert!(!result.check(&input, &parameter, MethodId::DefaultDense).is_ok());
        assert!(result.allocate::<f32>(&input, &parameter, MethodId::DefaultDense).is_ok());
        let gradient = result.get(ResultId::Gradient).unwrap();
        assert_eq!((gradient.n_rows(), gradient.n_columns()), (9, 1));
    }

    #[test]
    fn test_allocate_gated_by_check() {
        let parameter = CrossEntropyParameter::new(1, 4);
        let mut result = CrossEntropyResult::new();
        assert!(!result
            .allocate::<f64>(&input(4, 2, 1), &parameter, MethodId::DefaultDense)
            .is_ok());
        assert!(result.get(ResultId::Gradient).is_none());
    }
}
