//! Positional kernel argument binding
//!
//! A [`KernelArguments`] set has a fixed number of slots fixed at
//! construction. Each slot holds a scalar (working-precision float or a
//! 32-bit integer) or a buffer tagged with its [`AccessMode`]. Slots may be
//! rebound; launching with an unbound slot fails with
//! [`Error::UnsetArgument`] before the kernel runs.

use crate::buffer::{AccessMode, Buffer};
use hetero_core::{Error, KernelFloat, Result};

/// Scalar value bound to a slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarArg {
    F32(f32),
    F64(f64),
    U32(u32),
    I32(i32),
}

/// Buffer bound to a slot, by element type
#[derive(Debug, Clone)]
pub enum BufferArg {
    F32(Buffer<f32>),
    F64(Buffer<f64>),
}

/// One bound argument
#[derive(Debug, Clone)]
pub enum KernelArgument {
    Scalar(ScalarArg),
    Buffer(BufferArg, AccessMode),
}

impl KernelArgument {
    fn kind(&self) -> &'static str {
        match self {
            KernelArgument::Scalar(ScalarArg::F32(_)) => "float scalar",
            KernelArgument::Scalar(ScalarArg::F64(_)) => "double scalar",
            KernelArgument::Scalar(ScalarArg::U32(_)) => "uint scalar",
            KernelArgument::Scalar(ScalarArg::I32(_)) => "int scalar",
            KernelArgument::Buffer(BufferArg::F32(_), _) => "float buffer",
            KernelArgument::Buffer(BufferArg::F64(_), _) => "double buffer",
        }
    }
}

/// Element types that can cross the host/device boundary
pub trait DeviceFloat: KernelFloat {
    /// Wrap a scalar of this type
    fn scalar_arg(self) -> ScalarArg;

    /// Unwrap a scalar of this type
    fn from_scalar_arg(arg: &ScalarArg) -> Option<Self>;

    /// Wrap a buffer of this type
    fn buffer_arg(buffer: &Buffer<Self>) -> BufferArg;

    /// Unwrap a buffer of this type
    fn from_buffer_arg(arg: &BufferArg) -> Option<&Buffer<Self>>;
}

impl DeviceFloat for f32 {
    fn scalar_arg(self) -> ScalarArg {
        ScalarArg::F32(self)
    }

    fn from_scalar_arg(arg: &ScalarArg) -> Option<Self> {
        match arg {
            ScalarArg::F32(v) => Some(*v),
            _ => None,
        }
    }

    fn buffer_arg(buffer: &Buffer<Self>) -> BufferArg {
        BufferArg::F32(buffer.clone())
    }

    fn from_buffer_arg(arg: &BufferArg) -> Option<&Buffer<Self>> {
        match arg {
            BufferArg::F32(b) => Some(b),
            _ => None,
        }
    }
}

impl DeviceFloat for f64 {
    fn scalar_arg(self) -> ScalarArg {
        ScalarArg::F64(self)
    }

    fn from_scalar_arg(arg: &ScalarArg) -> Option<Self> {
        match arg {
            ScalarArg::F64(v) => Some(*v),
            _ => None,
        }
    }

    fn buffer_arg(buffer: &Buffer<Self>) -> BufferArg {
        BufferArg::F64(buffer.clone())
    }

    fn from_buffer_arg(arg: &BufferArg) -> Option<&Buffer<Self>> {
        match arg {
            BufferArg::F64(b) => Some(b),
            _ => None,
        }
    }
}

impl From<f32> for KernelArgument {
    fn from(v: f32) -> Self {
        KernelArgument::Scalar(ScalarArg::F32(v))
    }
}

impl From<f64> for KernelArgument {
    fn from(v: f64) -> Self {
        KernelArgument::Scalar(ScalarArg::F64(v))
    }
}

impl From<u32> for KernelArgument {
    fn from(v: u32) -> Self {
        KernelArgument::Scalar(ScalarArg::U32(v))
    }
}

impl From<i32> for KernelArgument {
    fn from(v: i32) -> Self {
        KernelArgument::Scalar(ScalarArg::I32(v))
    }
}

impl<T: DeviceFloat> From<(&Buffer<T>, AccessMode)> for KernelArgument {
    fn from((buffer, mode): (&Buffer<T>, AccessMode)) -> Self {
        KernelArgument::Buffer(T::buffer_arg(buffer), mode)
    }
}

/// Fixed-size positional argument list for one launch
#[derive(Debug, Clone)]
pub struct KernelArguments {
    slots: Vec<Option<KernelArgument>>,
}

impl KernelArguments {
    /// Argument list with `count` unbound slots
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the list has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bind `value` to slot `index`, replacing any previous binding
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the slot count fixed at construction.
    pub fn set(&mut self, index: usize, value: impl Into<KernelArgument>) -> &mut Self {
        assert!(
            index < self.slots.len(),
            "kernel argument index {index} out of range for {} slots",
            self.slots.len()
        );
        self.slots[index] = Some(value.into());
        self
    }

    /// Bind a buffer with an explicit access mode
    pub fn set_buffer<T: DeviceFloat>(
        &mut self,
        index: usize,
        buffer: &Buffer<T>,
        mode: AccessMode,
    ) -> &mut Self {
        self.set(index, (buffer, mode))
    }

    /// Argument bound to slot `index`
    pub fn get(&self, index: usize) -> Option<&KernelArgument> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Lowest unbound slot
    pub fn first_unset(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Fail unless every slot is bound
    pub fn validate(&self) -> Result<()> {
        match self.first_unset() {
            Some(index) => Err(Error::UnsetArgument { index }),
            None => Ok(()),
        }
    }

    fn bound(&self, index: usize) -> Result<&KernelArgument> {
        self.get(index).ok_or(Error::UnsetArgument { index })
    }

    fn wrong_type(&self, index: usize, expected: &str) -> Error {
        let found = self.get(index).map_or("nothing", KernelArgument::kind);
        Error::ArgumentType {
            index,
            expected: format!("{expected}, found {found}"),
        }
    }

    /// Working-precision scalar at `index`
    pub fn scalar<T: DeviceFloat>(&self, index: usize) -> Result<T> {
        match self.bound(index)? {
            KernelArgument::Scalar(s) => {
                T::from_scalar_arg(s).ok_or_else(|| self.wrong_type(index, T::tag()))
            }
            _ => Err(self.wrong_type(index, T::tag())),
        }
    }

    /// Unsigned count, stride or offset at `index`
    pub fn uint(&self, index: usize) -> Result<u32> {
        match self.bound(index)? {
            KernelArgument::Scalar(ScalarArg::U32(v)) => Ok(*v),
            _ => Err(self.wrong_type(index, "uint")),
        }
    }

    /// Signed integer at `index`
    pub fn int(&self, index: usize) -> Result<i32> {
        match self.bound(index)? {
            KernelArgument::Scalar(ScalarArg::I32(v)) => Ok(*v),
            _ => Err(self.wrong_type(index, "int")),
        }
    }

    /// Buffer and access mode at `index`
    pub fn buffer<T: DeviceFloat>(&self, index: usize) -> Result<(&Buffer<T>, AccessMode)> {
        match self.bound(index)? {
            KernelArgument::Buffer(b, mode) => T::from_buffer_arg(b)
                .map(|buf| (buf, *mode))
                .ok_or_else(|| self.wrong_type(index, &format!("{} buffer", T::tag()))),
            _ => Err(self.wrong_type(index, &format!("{} buffer", T::tag()))),
        }
    }
}
