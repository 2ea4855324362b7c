//! Minimal numeric tables
//!
//! Algorithms consume tables as opaque 2-D buffers: a shape, an element
//! precision and row-major element access. Storage sits behind a lock so a
//! result table can be shared with the caller and written by a kernel.

use crate::error::{Error, Result};
use crate::numeric::{KernelFloat, Precision};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shape and precision view of a table
pub trait NumericTable: Debug + Send + Sync {
    /// Number of rows (observations)
    fn n_rows(&self) -> usize;

    /// Number of columns (features)
    fn n_columns(&self) -> usize;

    /// Element precision
    fn precision(&self) -> Precision;

    /// Values widened to f64, row-major
    fn to_f64_vec(&self) -> Vec<f64>;

    /// Dynamic access for downcasting to the concrete table
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a numeric table
pub type NumericTablePtr = Arc<dyn NumericTable>;

/// Downcast a table handle to the dense table of working type `T`
pub fn downcast<T: KernelFloat>(table: &NumericTablePtr) -> Result<&HomogenTable<T>> {
    table
        .as_any()
        .downcast_ref::<HomogenTable<T>>()
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "table holds {} values, kernel works in {}",
                table.precision(),
                T::PRECISION
            ))
        })
}

/// Dense row-major table of one element type
#[derive(Debug)]
pub struct HomogenTable<T: KernelFloat> {
    n_rows: usize,
    n_columns: usize,
    data: RwLock<Vec<T>>,
}

impl<T: KernelFloat> HomogenTable<T> {
    /// Table filled with zeros
    pub fn zeros(n_rows: usize, n_columns: usize) -> Self {
        Self {
            n_rows,
            n_columns,
            data: RwLock::new(vec![T::zero(); n_rows * n_columns]),
        }
    }

    /// Table wrapping row-major values
    pub fn from_vec(n_rows: usize, n_columns: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != n_rows * n_columns {
            return Err(Error::size_mismatch(
                "table data",
                n_rows * n_columns,
                data.len(),
            ));
        }
        Ok(Self {
            n_rows,
            n_columns,
            data: RwLock::new(data),
        })
    }

    /// Table from a slice of equally sized rows
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let n_columns = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != n_columns) {
            return Err(Error::size_mismatch("table row", n_columns, bad.len()));
        }
        let data = rows.iter().flatten().copied().collect();
        Self::from_vec(rows.len(), n_columns, data)
    }

    /// Wrap into a shared handle
    pub fn into_ptr(self) -> NumericTablePtr {
        Arc::new(self)
    }

    /// Read access to the row-major values
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write access to the row-major values
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the row-major values
    pub fn to_vec(&self) -> Vec<T> {
        self.read().clone()
    }

    /// Element at (row, column)
    pub fn get(&self, row: usize, column: usize) -> Option<T> {
        if row >= self.n_rows || column >= self.n_columns {
            return None;
        }
        Some(self.read()[row * self.n_columns + column])
    }
}

impl<T: KernelFloat> NumericTable for HomogenTable<T> {
    fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn n_columns(&self) -> usize {
        self.n_columns
    }

    fn precision(&self) -> Precision {
        T::PRECISION
    }

    fn to_f64_vec(&self) -> Vec<f64> {
        self.read().iter().map(|v| v.as_f64()).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Check a table's shape, recording a mismatch under `what`
pub fn check_shape(
    table: &NumericTablePtr,
    what: &str,
    n_rows: usize,
    n_columns: usize,
) -> Result<()> {
    if table.n_rows() != n_rows || table.n_columns() != n_columns {
        return Err(Error::size_mismatch(
            what,
            format!("{n_rows}x{n_columns}"),
            format!("{}x{}", table.n_rows(), table.n_columns()),
        ));
    }
    Ok(())
}

/// Ordered collection of optional tables keyed by `K`
///
/// An absent entry (`None`) means "not computed", which is distinct from a
/// computed, empty table.
#[derive(Debug, Clone)]
pub struct KeyValueCollection<K: Ord> {
    entries: BTreeMap<K, Option<NumericTablePtr>>,
}

impl<K: Ord> Default for KeyValueCollection<K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> KeyValueCollection<K> {
    /// Empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry; `None` marks it absent
    pub fn insert(&mut self, key: K, value: Option<NumericTablePtr>) {
        self.entries.insert(key, value);
    }

    /// Present table under `key`
    pub fn get(&self, key: K) -> Option<&NumericTablePtr> {
        self.entries.get(&key).and_then(Option::as_ref)
    }

    /// Iterate every entry, present or absent
    pub fn iter(&self) -> impl Iterator<Item = (K, Option<&NumericTablePtr>)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_ref()))
    }

    /// Number of present tables
    pub fn len(&self) -> usize {
        self.entries.values().filter(|v| v.is_some()).count()
    }

    /// Whether no table is present
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
