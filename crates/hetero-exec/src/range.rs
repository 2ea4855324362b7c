//! Launch index ranges

use hetero_core::{Error, Result};
use std::fmt;

/// Iteration space of one launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelRange {
    /// `n` work items
    OneDim(usize),
    /// `rows x cols` work items; the first index varies fastest
    TwoDim(usize, usize),
}

impl KernelRange {
    pub fn one_dim(n: usize) -> Self {
        KernelRange::OneDim(n)
    }

    pub fn two_dim(rows: usize, cols: usize) -> Self {
        KernelRange::TwoDim(rows, cols)
    }

    /// Number of dimensions
    pub fn dims(&self) -> usize {
        match self {
            KernelRange::OneDim(_) => 1,
            KernelRange::TwoDim(..) => 2,
        }
    }

    /// Total number of work items
    pub fn total(&self) -> usize {
        match *self {
            KernelRange::OneDim(n) => n,
            KernelRange::TwoDim(r, c) => r.saturating_mul(c),
        }
    }

    /// Extent of a 1-D range
    pub fn as_1d(&self) -> Result<usize> {
        match *self {
            KernelRange::OneDim(n) => Ok(n),
            other => Err(Error::Launch(format!("kernel expects a 1-D range, got {other}"))),
        }
    }

    /// Extents of a 2-D range
    pub fn as_2d(&self) -> Result<(usize, usize)> {
        match *self {
            KernelRange::TwoDim(r, c) => Ok((r, c)),
            other => Err(Error::Launch(format!("kernel expects a 2-D range, got {other}"))),
        }
    }
}

impl fmt::Display for KernelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelRange::OneDim(n) => write!(f, "({n})"),
            KernelRange::TwoDim(r, c) => write!(f, "({r}, {c})"),
        }
    }
}
