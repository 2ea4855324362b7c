//! Named output tables of an algorithm result
//!
//! Tables are either allocated here, sized from input and parameter, or
//! supplied by the caller. Allocation keeps exactly the requested ids: stale
//! ids are dropped and library tables whose shape or precision no longer fit
//! are replaced. Caller storage is never replaced, so a misfit surfaces in the
//! result check.

use hetero_core::{HomogenTable, KernelFloat, NumericTablePtr};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

#[derive(Debug, Clone)]
pub(crate) struct OutputTables<K: Ord> {
    tables: BTreeMap<K, NumericTablePtr>,
    allocated: BTreeSet<K>,
}

impl<K: Ord> Default for OutputTables<K> {
    fn default() -> Self {
        Self {
            tables: BTreeMap::new(),
            allocated: BTreeSet::new(),
        }
    }
}

impl<K: Ord + Copy + std::fmt::Debug> OutputTables<K> {
    pub fn get(&self, id: K) -> Option<&NumericTablePtr> {
        self.tables.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &NumericTablePtr)> {
        self.tables.iter().map(|(id, t)| (*id, t))
    }

    /// Store caller-owned storage under `id`
    pub fn supply(&mut self, id: K, table: NumericTablePtr) {
        self.allocated.remove(&id);
        self.tables.insert(id, table);
    }

    /// Store a table as if this module had allocated it
    pub fn adopt(&mut self, id: K, table: NumericTablePtr) {
        self.allocated.insert(id);
        self.tables.insert(id, table);
    }

    pub fn remove(&mut self, id: K) -> Option<NumericTablePtr> {
        self.allocated.remove(&id);
        self.tables.remove(&id)
    }

    /// Make the held ids exactly the `(id, rows, columns)` entries of `required`
    pub fn allocate<T: KernelFloat>(&mut self, required: &[(K, usize, usize)]) {
        let stale: Vec<K> = self
            .tables
            .keys()
            .copied()
            .filter(|id| required.iter().all(|(r, _, _)| r != id))
            .collect();
        for id in stale {
            trace!(?id, "dropping unrequested output");
            self.remove(id);
        }

        for &(id, rows, cols) in required {
            let keep = match self.tables.get(&id) {
                None => false,
                Some(_) if !self.allocated.contains(&id) => true,
                Some(t) => t.n_rows() == rows && t.n_columns() == cols && t.precision() == T::PRECISION,
            };
            if !keep {
                self.adopt(id, HomogenTable::<T>::zeros(rows, cols).into_ptr());
            }
        }
    }
}
