//! Device buffers and access modes

use hetero_core::KernelFloat;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// How a kernel may touch a bound buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    /// Whether the kernel may read the buffer
    pub fn is_readable(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    /// Whether the kernel may write the buffer
    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

/// Shared handle to device-visible storage
///
/// Cloning the handle shares the storage. Kernels borrow a buffer only for
/// the duration of a launch.
#[derive(Debug)]
pub struct Buffer<T: KernelFloat> {
    inner: Arc<RwLock<Vec<T>>>,
}

impl<T: KernelFloat> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: KernelFloat> Buffer<T> {
    /// Buffer owning `data`
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    /// Buffer of `len` zeros
    pub fn zeros(len: usize) -> Self {
        Self::from_vec(vec![T::zero(); len])
    }

    /// Buffer of `len` copies of `value`
    pub fn filled(len: usize, value: T) -> Self {
        Self::from_vec(vec![value; len])
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read access
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write access
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the contents
    pub fn to_vec(&self) -> Vec<T> {
        self.read().clone()
    }

    /// Whether two handles share storage
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: KernelFloat> From<Vec<T>> for Buffer<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}
