//! Device execution context
//!
//! Owns one device, its kernel source table and its compiled-program cache.
//! Kernels obtain programs through a per-call [`KernelFactory`] session and
//! launch them with [`ExecutionContext::run`], which returns only after the
//! device has finished the work or reported a failure.

use crate::args::KernelArguments;
use crate::cache::{CacheStats, ProgramCache};
use crate::device::{CompiledProgram, Device, HostDevice, KernelHandle};
use crate::range::KernelRange;
use crate::source::KernelSourceTable;
use hetero_core::{DeviceId, Error, Precision, Result, Status, Target};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Compiles, caches and launches device kernels
pub struct ExecutionContext {
    device_id: DeviceId,
    device: Arc<dyn Device>,
    sources: KernelSourceTable,
    cache: ProgramCache,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("device_id", &self.device_id)
            .field("device", &self.device.name())
            .field("programs", &self.sources.len())
            .field("cache", &self.cache.stats())
            .finish()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::host()
    }
}

impl ExecutionContext {
    /// Context over `device` with the built-in kernel sources
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self::with_sources(device, KernelSourceTable::builtin())
    }

    /// Context over `device` with an explicit source table
    pub fn with_sources(device: Arc<dyn Device>, sources: KernelSourceTable) -> Self {
        debug!(device = device.name(), programs = sources.len(), "execution context created");
        Self {
            device_id: DeviceId::DEFAULT,
            device,
            sources,
            cache: ProgramCache::new(),
        }
    }

    /// Context over the host reference device
    pub fn host() -> Self {
        Self::new(Arc::new(HostDevice::new()))
    }

    /// Same context answering to a different device id
    pub fn with_device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Build target naming this context's device
    pub fn target(&self) -> Target {
        Target::Device(self.device_id)
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Kernel sources loaded at construction
    pub fn sources(&self) -> &KernelSourceTable {
        &self.sources
    }

    /// New kernel factory session
    pub fn kernel_factory(&self) -> KernelFactory<'_> {
        KernelFactory {
            context: self,
            current: None,
        }
    }

    /// Compile `source` under `cache_key` unless already cached
    pub fn build(&self, target: Target, cache_key: &str, source: &str, options: &str) -> Status {
        self.build_program(target, cache_key, source, options).into()
    }

    fn build_program(
        &self,
        target: Target,
        cache_key: &str,
        source: &str,
        options: &str,
    ) -> Result<Arc<CompiledProgram>> {
        if target != self.target() {
            return Err(Error::UnsupportedTarget(format!(
                "context for {} cannot build for {target}",
                self.target()
            )));
        }
        self.cache.get_or_build(cache_key, || {
            debug!(cache_key, options, device = self.device.name(), "compiling program");
            self.device.compile(cache_key, source, options)
        })
    }

    /// Cached program for `cache_key`
    pub fn program(&self, cache_key: &str) -> Option<Arc<CompiledProgram>> {
        self.cache.get(cache_key)
    }

    /// Launch `kernel` over `range`, recording any failure in `status`
    ///
    /// Unbound argument slots are reported without launching.
    #[instrument(level = "trace", skip_all, fields(kernel = kernel.name(), range = %range))]
    pub fn run(
        &self,
        range: &KernelRange,
        kernel: &KernelHandle,
        args: &KernelArguments,
        status: &mut Status,
    ) {
        if let Err(e) = args.validate() {
            status.add(e);
            return;
        }
        trace!(device = self.device.name(), "launching");
        if let Err(e) = self.device.launch(kernel, range, args) {
            debug!(kernel = kernel.name(), error = %e, "launch failed");
            status.add(e);
        }
    }

    /// Number of compilations attempted
    pub fn compile_count(&self) -> usize {
        self.cache.compile_count()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Sorted cache keys of the compiled programs
    pub fn cached_keys(&self) -> Vec<String> {
        self.cache.keys()
    }
}

/// Per-call session resolving kernels in the program it last built
///
/// Sessions never share state, so programs of different precisions that
/// export the same entry names cannot be confused.
#[derive(Debug)]
pub struct KernelFactory<'a> {
    context: &'a ExecutionContext,
    current: Option<Arc<CompiledProgram>>,
}

impl KernelFactory<'_> {
    /// Build (or find) a program and make it the session's current program
    pub fn build(&mut self, target: Target, cache_key: &str, source: &str, options: &str) -> Status {
        match self.context.build_program(target, cache_key, source, options) {
            Ok(program) => {
                self.current = Some(program);
                Status::ok()
            }
            Err(e) => {
                self.current = None;
                e.into()
            }
        }
    }

    /// Build a program from the context's source table at `precision`
    pub fn build_from_table(
        &mut self,
        target: Target,
        program: &str,
        cache_key: &str,
        precision: Precision,
    ) -> Status {
        let source = match self.context.sources().get(program) {
            Ok(source) => source,
            Err(e) => return e.into(),
        };
        let options = source.options_for(precision);
        self.build(target, cache_key, source.text(), &options)
    }

    /// Kernel `name` from the current program
    pub fn get_kernel(&self, name: &str) -> Result<KernelHandle> {
        let program = self.current.as_ref().ok_or_else(|| {
            Error::KernelNotFound(format!("{name} (no program built in this session)"))
        })?;
        program.kernel(name).ok_or_else(|| {
            Error::KernelNotFound(format!("{name} in program '{}'", program.cache_key()))
        })
    }

    /// Current program, if a build succeeded
    pub fn current(&self) -> Option<&Arc<CompiledProgram>> {
        self.current.as_ref()
    }
}
