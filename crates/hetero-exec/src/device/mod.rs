//! Device abstraction and compiled programs
//!
//! A [`Device`] turns source text into a [`CompiledProgram`] and launches the
//! kernels it exports. Launches are synchronous: when `launch` returns the
//! kernel's writes are visible to the host, or the failure is in the
//! returned error.

pub mod host;
mod native;

pub use host::{HostDevice, NativeKernel};

use crate::args::KernelArguments;
use crate::range::KernelRange;
use hetero_core::{Precision, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Launchable entry point of a compiled program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    name: String,
    precision: Precision,
    cache_key: String,
}

impl Kernel {
    pub fn new(name: impl Into<String>, precision: Precision, cache_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            precision,
            cache_key: cache_key.into(),
        }
    }

    /// Entry-point name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Precision the program was built for
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Cache key of the owning program
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }
}

/// Shared handle to a kernel
pub type KernelHandle = Arc<Kernel>;

/// Result of compiling one program
#[derive(Debug)]
pub struct CompiledProgram {
    cache_key: String,
    precision: Precision,
    kernels: HashMap<String, KernelHandle>,
}

impl CompiledProgram {
    /// Program exporting `entries`, all at `precision`
    pub fn new<I, S>(cache_key: &str, precision: Precision, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kernels = entries
            .into_iter()
            .map(|name| {
                let name = name.into();
                let kernel = Arc::new(Kernel::new(name.clone(), precision, cache_key));
                (name, kernel)
            })
            .collect();
        Self {
            cache_key: cache_key.to_string(),
            precision,
            kernels,
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Kernel exported under `name`
    pub fn kernel(&self, name: &str) -> Option<KernelHandle> {
        self.kernels.get(name).cloned()
    }

    /// Exported entry-point names, sorted
    pub fn kernel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kernels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Backend that compiles and runs device source
pub trait Device: fmt::Debug + Send + Sync {
    /// Human readable device name
    fn name(&self) -> &str;

    /// Compile `source` with `options` into a program stored under `cache_key`
    fn compile(&self, cache_key: &str, source: &str, options: &str) -> Result<CompiledProgram>;

    /// Run `kernel` over `range`, returning once the work is complete
    fn launch(&self, kernel: &Kernel, range: &KernelRange, args: &KernelArguments) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_program_exports() {
        let program = CompiledProgram::new("__sample_float", Precision::Single, ["b", "a"]);
        assert_eq!(program.kernel_names(), vec!["a", "b"]);
        let k = program.kernel("a").unwrap();
        assert_eq!(k.name(), "a");
        assert_eq!(k.precision(), Precision::Single);
        assert_eq!(k.cache_key(), "__sample_float");
        assert!(program.kernel("c").is_none());
    }
}
