//! Kernel source resource table
//!
//! Device source text ships with the crate and is looked up by program name.
//! Each entry carries default build options that are appended after the
//! precision define.

use hetero_core::{Error, Precision, Result};
use std::collections::BTreeMap;

/// Program name of the reference BLAS kernels
pub const BLAS_PROGRAM: &str = "blas";

const BLAS_SOURCE: &str = include_str!("../kernels/blas.cl");

/// One program's source text and default build options
#[derive(Debug, Clone)]
pub struct KernelSource {
    text: String,
    default_options: String,
}

impl KernelSource {
    pub fn new(text: impl Into<String>, default_options: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            default_options: default_options.into(),
        }
    }

    /// Source text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Options appended to every build of this program
    pub fn default_options(&self) -> &str {
        &self.default_options
    }

    /// Full option string for a build at `precision`
    pub fn options_for(&self, precision: Precision) -> String {
        let define = precision.build_options();
        if self.default_options.is_empty() {
            define
        } else {
            format!("{define} {}", self.default_options)
        }
    }
}

/// Name to source mapping loaded once per execution context
#[derive(Debug, Clone, Default)]
pub struct KernelSourceTable {
    programs: BTreeMap<String, KernelSource>,
}

impl KernelSourceTable {
    /// Table without any program
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table holding the programs shipped with the crate
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.insert(BLAS_PROGRAM, KernelSource::new(BLAS_SOURCE, ""));
        table
    }

    /// Add or replace a program
    pub fn insert(&mut self, name: impl Into<String>, source: KernelSource) -> &mut Self {
        self.programs.insert(name.into(), source);
        self
    }

    /// Program registered under `name`
    pub fn get(&self, name: &str) -> Result<&KernelSource> {
        self.programs
            .get(name)
            .ok_or_else(|| Error::KernelNotFound(format!("no source for program '{name}'")))
    }

    /// Registered program names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_blas_program() {
        let table = KernelSourceTable::builtin();
        let blas = table.get(BLAS_PROGRAM).unwrap();
        assert!(blas.text().contains("__kernel void blas_gemm_overwrite("));
        assert!(blas.text().contains("__kernel void blas_gemm_accumulate("));
        assert!(blas.text().contains("__kernel void blas_axpy("));
        assert_eq!(blas.options_for(Precision::Double), "-D algorithmFPType=double");
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["blas"]);
    }

    #[test]
    fn test_default_options_are_appended() {
        let mut table = KernelSourceTable::empty();
        table.insert("sample", KernelSource::new("__kernel void sample() {}", "-cl-mad-enable"));
        assert_eq!(
            table.get("sample").unwrap().options_for(Precision::Single),
            "-D algorithmFPType=float -cl-mad-enable"
        );
        assert!(matches!(table.get("missing"), Err(Error::KernelNotFound(_))));
    }
}
