//! Host reference device
//!
//! Runs device programs on the CPU. "Compiling" checks the source text for
//! balanced brackets, collects every `__kernel void <name>(` entry point and
//! binds each one to a native Rust implementation; an entry without one is a
//! compile error. Launches evaluate the range through an [`Engine`] and
//! return after all work items have finished.

use super::{native, CompiledProgram, Device, Kernel};
use crate::args::KernelArguments;
use crate::range::KernelRange;
use hetero_core::{precision_from_options, Engine, Error, Precision, Result, FP_TYPE_MACRO};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// Native body of a kernel entry point
pub type NativeFn = fn(&Engine, &KernelRange, &KernelArguments) -> Result<()>;

/// Native implementations of one entry point, per precision
#[derive(Clone, Copy)]
pub struct NativeKernel {
    pub single: NativeFn,
    pub double: NativeFn,
}

impl NativeKernel {
    fn for_precision(&self, precision: Precision) -> NativeFn {
        match precision {
            Precision::Single => self.single,
            Precision::Double => self.double,
        }
    }
}

impl fmt::Debug for NativeKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeKernel")
    }
}

/// Reference device executing on the host CPU
#[derive(Debug)]
pub struct HostDevice {
    engine: Engine,
    natives: HashMap<String, NativeKernel>,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    /// Device with the built-in BLAS entry points and an automatic engine
    pub fn new() -> Self {
        Self::with_engine(Engine::auto())
    }

    /// Device evaluating ranges through `engine`
    pub fn with_engine(engine: Engine) -> Self {
        let mut device = Self {
            engine,
            natives: HashMap::new(),
        };
        for (name, kernel) in native::builtin() {
            device.natives.insert(name.to_string(), kernel);
        }
        device
    }

    /// Bind an additional entry point name to native code
    pub fn with_native(mut self, name: impl Into<String>, kernel: NativeKernel) -> Self {
        self.natives.insert(name.into(), kernel);
        self
    }

    /// Engine used to evaluate launch ranges
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Device for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn compile(&self, cache_key: &str, source: &str, options: &str) -> Result<CompiledProgram> {
        let precision = precision_from_options(options).ok_or_else(|| {
            Error::compile(
                cache_key,
                format!("build options '{options}' do not define {FP_TYPE_MACRO}"),
            )
        })?;

        let entries = scan_entry_points(source).map_err(|reason| Error::compile(cache_key, reason))?;
        if entries.is_empty() {
            return Err(Error::compile(cache_key, "source declares no kernel entry points"));
        }
        if let Some(missing) = entries.iter().find(|e| !self.natives.contains_key(e.as_str())) {
            return Err(Error::compile(
                cache_key,
                format!("entry point '{missing}' has no native implementation on this device"),
            ));
        }

        debug!(cache_key, %precision, entries = entries.len(), "host program compiled");
        Ok(CompiledProgram::new(cache_key, precision, entries))
    }

    fn launch(&self, kernel: &Kernel, range: &KernelRange, args: &KernelArguments) -> Result<()> {
        let native = self
            .natives
            .get(kernel.name())
            .ok_or_else(|| Error::KernelNotFound(kernel.name().to_string()))?;
        trace!(kernel = kernel.name(), %range, "host launch");
        (native.for_precision(kernel.precision()))(&self.engine, range, args)
    }
}

/// Strip `//` and `/* */` comments
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn check_brackets(code: &str) -> std::result::Result<(), String> {
    let mut stack = Vec::new();
    for (line_no, line) in code.lines().enumerate() {
        for c in line.chars() {
            match c {
                '{' | '(' | '[' => stack.push(c),
                '}' | ')' | ']' => {
                    let open = match c {
                        '}' => '{',
                        ')' => '(',
                        _ => '[',
                    };
                    if stack.pop() != Some(open) {
                        return Err(format!("unbalanced '{c}' on line {}", line_no + 1));
                    }
                }
                _ => {}
            }
        }
    }
    match stack.last() {
        Some(open) => Err(format!("unclosed '{open}' at end of source")),
        None => Ok(()),
    }
}

/// Names of the `__kernel void <name>(` declarations in `source`
fn scan_entry_points(source: &str) -> std::result::Result<Vec<String>, String> {
    let code = strip_comments(source);
    check_brackets(&code)?;

    let mut entries = Vec::new();
    for decl in code.split("__kernel").skip(1) {
        let rest = decl.trim_start();
        let rest = rest
            .strip_prefix("void")
            .filter(|r| r.starts_with(char::is_whitespace))
            .ok_or_else(|| "kernel entry points must return void".to_string())?
            .trim_start();
        let name_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let (name, tail) = rest.split_at(name_len);
        if name.is_empty() || !tail.trim_start().starts_with('(') {
            return Err("malformed kernel declaration".to_string());
        }
        if entries.iter().any(|e| e == name) {
            return Err(format!("duplicate kernel entry point '{name}'"));
        }
        entries.push(name.to_string());
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{KernelSourceTable, BLAS_PROGRAM};

    #[test]
    fn test_scan_blas_source() {
        let table = KernelSourceTable::builtin();
        let entries = scan_entry_points(table.get(BLAS_PROGRAM).unwrap().text()).unwrap();
        assert_eq!(
            entries,
            vec!["blas_gemm_overwrite", "blas_gemm_accumulate", "blas_axpy"]
        );
    }

    #[test]
    fn test_comments_are_ignored() {
        let src = "// __kernel void ghost(\n/* { */ __kernel void blas_axpy(int a) { }";
        assert_eq!(scan_entry_points(src).unwrap(), vec!["blas_axpy"]);
    }

    #[test]
    fn test_malformed_sources() {
        assert!(scan_entry_points("__kernel void f(int a) {").unwrap_err().contains("unclosed"));
        assert!(scan_entry_points("__kernel void f(int a) }").unwrap_err().contains("unbalanced"));
        assert!(scan_entry_points("__kernel int f() {}").is_err());
        assert!(scan_entry_points("__kernel void f() {} __kernel void f() {}")
            .unwrap_err()
            .contains("duplicate"));
    }

    #[test]
    fn test_compile_requires_precision_define() {
        let device = HostDevice::with_engine(Engine::sequential());
        let err = device
            .compile("__k", "__kernel void blas_axpy() {}", "-cl-fast-relaxed-math")
            .unwrap_err();
        assert!(matches!(err, Error::Compile { .. }));
        assert!(err.to_string().contains(FP_TYPE_MACRO));
    }

    #[test]
    fn test_compile_rejects_unknown_entry() {
        let device = HostDevice::with_engine(Engine::sequential());
        let err = device
            .compile("__k_float", "__kernel void mystery() {}", "-D algorithmFPType=float")
            .unwrap_err();
        assert!(err.to_string().contains("mystery"));
        assert!(device
            .compile("__k_float", "/* nothing */", "-D algorithmFPType=float")
            .is_err());
    }

    #[test]
    fn test_compile_and_launch_custom_native() {
        fn fill_ones(_: &Engine, range: &KernelRange, args: &KernelArguments) -> Result<()> {
            let n = range.as_1d()?;
            let (y, _) = args.buffer::<f64>(0)?;
            y.write()[..n].iter_mut().for_each(|v| *v = 1.0);
            Ok(())
        }
        fn unsupported(_: &Engine, _: &KernelRange, _: &KernelArguments) -> Result<()> {
            Err(Error::Launch("single precision not supported".into()))
        }

        let device = HostDevice::with_engine(Engine::sequential()).with_native(
            "fill_ones",
            NativeKernel {
                single: unsupported,
                double: fill_ones,
            },
        );
        let program = device
            .compile("__fill_double", "__kernel void fill_ones(__global double *y) {}", "-D algorithmFPType=double")
            .unwrap();
        let kernel = program.kernel("fill_ones").unwrap();

        let y = crate::Buffer::<f64>::zeros(3);
        let mut args = KernelArguments::new(1);
        args.set_buffer(0, &y, crate::AccessMode::Write);
        device.launch(&kernel, &KernelRange::one_dim(2), &args).unwrap();
        assert_eq!(y.to_vec(), vec![1.0, 1.0, 0.0]);
    }
}
