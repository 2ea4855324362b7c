//! PCA input, parameters and result

use crate::algorithm::{MethodId, ParameterDescriptor, ResultDescriptor};
use crate::archive::{Archivable, TableRecord};
use crate::output::OutputTables;
use bitflags::bitflags;
use hetero_core::table::check_shape;
use hetero_core::{Error, KernelFloat, KeyValueCollection, NumericTablePtr, Result, Status};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

bitflags! {
    /// Optional PCA outputs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResultsToCompute: u64 {
        /// Per-feature means
        const MEAN = 1 << 0;
        /// Per-feature variances
        const VARIANCE = 1 << 1;
        /// Eigenvalues in the data-for-transform collection
        const EIGENVALUE = 1 << 2;
    }
}

impl Default for ResultsToCompute {
    fn default() -> Self {
        Self::empty()
    }
}

/// What the input table holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputDataKind {
    /// Raw observations, one row each
    #[default]
    NonNormalized,
    /// Observations already centered and scaled
    Normalized,
    /// A precomputed p x p correlation matrix
    Correlation,
}

/// PCA input
#[derive(Debug, Clone, Default)]
pub struct PcaInput {
    data: Option<NumericTablePtr>,
    kind: InputDataKind,
}

impl PcaInput {
    /// Raw observations
    pub fn new(data: NumericTablePtr) -> Self {
        Self {
            data: Some(data),
            kind: InputDataKind::NonNormalized,
        }
    }

    /// A precomputed correlation matrix
    pub fn correlation(matrix: NumericTablePtr) -> Self {
        Self {
            data: Some(matrix),
            kind: InputDataKind::Correlation,
        }
    }

    pub fn with_kind(mut self, kind: InputDataKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn data(&self) -> Option<&NumericTablePtr> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: NumericTablePtr) {
        self.data = Some(data);
    }

    pub fn kind(&self) -> InputDataKind {
        self.kind
    }

    /// Number of features
    pub fn n_features(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.n_columns())
    }
}

/// Settings shared by every PCA method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseParameter {
    pub results_to_compute: ResultsToCompute,
    /// Number of principal components; 0 keeps all features
    pub n_components: usize,
    /// Make each eigenvector's largest-magnitude element positive
    pub is_deterministic: bool,
}

impl BaseParameter {
    pub fn with_results(mut self, results: ResultsToCompute) -> Self {
        self.results_to_compute = results;
        self
    }

    pub fn with_n_components(mut self, n_components: usize) -> Self {
        self.n_components = n_components;
        self
    }

    pub fn deterministic(mut self, is_deterministic: bool) -> Self {
        self.is_deterministic = is_deterministic;
        self
    }

    /// Components produced for `n_features` features
    pub fn components_for(&self, n_features: usize) -> usize {
        if self.n_components == 0 {
            n_features
        } else {
            self.n_components
        }
    }
}

/// Parameter of the correlation method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationParameter {
    pub base: BaseParameter,
}

impl CorrelationParameter {
    pub fn new(base: BaseParameter) -> Self {
        Self { base }
    }
}

/// Parameter of the SVD method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SvdParameter {
    pub base: BaseParameter,
}

impl SvdParameter {
    pub fn new(base: BaseParameter) -> Self {
        Self { base }
    }
}

/// Validation shared by both methods
pub(crate) fn check_base(input: &PcaInput, base: &BaseParameter, method: MethodId) -> Status {
    let data = match input.data() {
        Some(data) => data,
        None => return Error::InvalidInput("pca data is not set".into()).into(),
    };
    let (n, p) = (data.n_rows(), data.n_columns());
    if n == 0 || p == 0 {
        return Error::empty_input("pca data").into();
    }

    let mut status = Status::ok();
    if input.kind() == InputDataKind::Correlation {
        if method == MethodId::Svd {
            status.add(Error::InvalidInput(
                "svd method needs observations, not a correlation matrix".into(),
            ));
        }
        if n != p {
            status.add(Error::size_mismatch("correlation matrix", format!("{p}x{p}"), format!("{n}x{p}")));
        }
        let moments = ResultsToCompute::MEAN | ResultsToCompute::VARIANCE;
        if base.results_to_compute.intersects(moments) {
            status.add(Error::InvalidParameter(
                "means and variances cannot be computed from a correlation matrix".into(),
            ));
        }
    } else if n < 2 {
        status.add(Error::InsufficientData {
            expected: 2,
            actual: n,
        });
    } else if method == MethodId::Svd && n < p {
        status.add(Error::InsufficientData {
            expected: p,
            actual: n,
        });
    }

    if base.n_components > p {
        status.add(Error::InvalidParameter(format!(
            "n_components = {} exceeds the {p} available features",
            base.n_components
        )));
    }
    status
}

impl ParameterDescriptor<PcaInput> for CorrelationParameter {
    fn check(&self, input: &PcaInput, method: MethodId) -> Status {
        check_base(input, &self.base, method)
    }
}

impl ParameterDescriptor<PcaInput> for SvdParameter {
    fn check(&self, input: &PcaInput, method: MethodId) -> Status {
        check_base(input, &self.base, method)
    }
}

/// Named PCA output tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultId {
    /// 1 x components, descending
    Eigenvalues,
    /// components x p, one eigenvector per row
    Eigenvectors,
    /// 1 x p
    Means,
    /// 1 x p
    Variances,
}

impl ResultId {
    pub fn name(self) -> &'static str {
        match self {
            ResultId::Eigenvalues => "eigenvalues",
            ResultId::Eigenvectors => "eigenvectors",
            ResultId::Means => "means",
            ResultId::Variances => "variances",
        }
    }
}

/// Named PCA output collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCollectionId {
    /// Tables a later transform step needs
    DataForTransform,
}

/// Keys of the data-for-transform collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataForTransformKey {
    Mean,
    Variance,
    Eigenvalue,
}

/// PCA result
#[derive(Debug, Clone, Default)]
pub struct PcaResult {
    tables: OutputTables<ResultId>,
    data_for_transform: KeyValueCollection<DataForTransformKey>,
}

impl PcaResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table stored under `id`, absent when not computed
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

    pub fn get_collection(&self, id: ResultCollectionId) -> &KeyValueCollection<DataForTransformKey> {
        match id {
            ResultCollectionId::DataForTransform => &self.data_for_transform,
        }
    }

    /// Merge the present entries of `collection`; absent entries are skipped
    pub fn set_collection(
        &mut self,
        id: ResultCollectionId,
        collection: &KeyValueCollection<DataForTransformKey>,
    ) {
        let target = match id {
            ResultCollectionId::DataForTransform => &mut self.data_for_transform,
        };
        for (key, table) in collection.iter() {
            if let Some(table) = table {
                target.insert(key, Some(Arc::clone(table)));
            }
        }
    }

    /// Replace a whole collection, absent entries included
    pub(crate) fn replace_collection(
        &mut self,
        id: ResultCollectionId,
        collection: KeyValueCollection<DataForTransformKey>,
    ) {
        match id {
            ResultCollectionId::DataForTransform => self.data_for_transform = collection,
        }
    }

    /// Values of a present table, widened to f64
    pub fn values(&self, id: ResultId) -> Option<Vec<f64>> {
        self.get(id).map(|t| t.to_f64_vec())
    }

    fn required(base: &BaseParameter, p: usize) -> Vec<(ResultId, usize, usize)> {
        let comps = base.components_for(p);
        let mut required = vec![(ResultId::Eigenvalues, 1, comps), (ResultId::Eigenvectors, comps, p)];
        if base.results_to_compute.contains(ResultsToCompute::MEAN) {
            required.push((ResultId::Means, 1, p));
        }
        if base.results_to_compute.contains(ResultsToCompute::VARIANCE) {
            required.push((ResultId::Variances, 1, p));
        }
        required
    }

    fn allocate_base<T: KernelFloat>(&mut self, input: &PcaInput, base: &BaseParameter, method: MethodId) -> Status {
        hetero_core::check_status!(check_base(input, base, method));
        self.tables.allocate::<T>(&Self::required(base, input.n_features()));
        Status::ok()
    }

    fn check_base(&self, input: &PcaInput, base: &BaseParameter) -> Status {
        Self::required(base, input.n_features())
            .into_iter()
            .filter_map(|(id, rows, cols)| match self.get(id) {
                None => Some(Error::NullResult(id.name().to_string())),
                Some(table) => check_shape(table, id.name(), rows, cols).err(),
            })
            .collect()
    }
}

impl ResultDescriptor<PcaInput, CorrelationParameter> for PcaResult {
    fn allocate<T: KernelFloat>(&mut self, input: &PcaInput, parameter: &CorrelationParameter, method: MethodId) -> Status {
        self.allocate_base::<T>(input, &parameter.base, method)
    }

    fn check(&self, input: &PcaInput, parameter: &CorrelationParameter, _method: MethodId) -> Status {
        self.check_base(input, &parameter.base)
    }
}

impl ResultDescriptor<PcaInput, SvdParameter> for PcaResult {
    fn allocate<T: KernelFloat>(&mut self, input: &PcaInput, parameter: &SvdParameter, method: MethodId) -> Status {
        self.allocate_base::<T>(input, &parameter.base, method)
    }

    fn check(&self, input: &PcaInput, parameter: &SvdParameter, _method: MethodId) -> Status {
        self.check_base(input, &parameter.base)
    }
}

/// Archived form of [`PcaResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaResultRecord {
    pub tables: BTreeMap<ResultId, TableRecord>,
    pub data_for_transform: BTreeMap<DataForTransformKey, TableRecord>,
}

impl Archivable for PcaResult {
    const KIND: &'static str = "pca_result";
    type Record = PcaResultRecord;

    fn to_record(&self) -> PcaResultRecord {
        PcaResultRecord {
            tables: self
                .tables
                .iter()
                .map(|(id, t)| (id, TableRecord::from_table(t)))
                .collect(),
            data_for_transform: self
                .data_for_transform
                .iter()
                .filter_map(|(key, t)| t.map(|t| (key, TableRecord::from_table(t))))
                .collect(),
        }
    }

    fn from_record(record: PcaResultRecord) -> Result<Self> {
        let mut result = PcaResult::new();
        for (id, table) in record.tables {
            result.tables.adopt(id, table.into_table()?);
        }
        for (key, table) in record.data_for_transform {
            result.data_for_transform.insert(key, Some(table.into_table()?));
        }
        Ok(result)
    }
}
