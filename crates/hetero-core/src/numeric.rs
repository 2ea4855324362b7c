//! Floating-point precision trait for kernel working types
//!
//! Every kernel is instantiated for exactly one working precision. This module
//! ties the Rust element type to the precision tag used in dispatch keys and
//! to the build options passed to device compilers.

use bytemuck::Pod;
use num_traits::{Float, NumAssign, NumCast};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};

/// Floating-point precision of a kernel instantiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit IEEE float
    Single,
    /// 64-bit IEEE float
    Double,
}

impl Precision {
    /// Tag used in cache keys and build options
    pub fn tag(self) -> &'static str {
        match self {
            Precision::Single => "float",
            Precision::Double => "double",
        }
    }

    /// Size of one element in bytes
    pub fn element_size(self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }

    /// Parse a precision tag (`float` / `double`)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "float" => Some(Precision::Single),
            "double" => Some(Precision::Double),
            _ => None,
        }
    }

    /// Build-option string selecting this precision in device source
    pub fn build_options(self) -> String {
        format!("-D {}={}", FP_TYPE_MACRO, self.tag())
    }
}

impl Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Macro name device sources use for the working element type
pub const FP_TYPE_MACRO: &str = "algorithmFPType";

/// Working element type of a kernel
///
/// Implemented for `f32` and `f64` only; the two instantiations never share
/// cache entries or dispatch keys.
pub trait KernelFloat:
    Float + NumAssign + NumCast + Pod + Default + Debug + Display + Send + Sync + 'static
{
    /// Precision this type represents
    const PRECISION: Precision;

    /// Convert from f64, rounding to this precision
    fn from_f64_lossy(value: f64) -> Self;

    /// Widen to f64
    fn as_f64(self) -> f64;

    /// Precision tag (`float` / `double`)
    fn tag() -> &'static str {
        Self::PRECISION.tag()
    }

    /// Build-option string for device compilation
    fn build_options() -> String {
        Self::PRECISION.build_options()
    }
}

impl KernelFloat for f32 {
    const PRECISION: Precision = Precision::Single;

    fn from_f64_lossy(value: f64) -> Self {
        value as f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl KernelFloat for f64 {
    const PRECISION: Precision = Precision::Double;

    fn from_f64_lossy(value: f64) -> Self {
        value
    }

    fn as_f64(self) -> f64 {
        self
    }
}

/// Parse the precision selected by a build-option string
///
/// Looks for `-D algorithmFPType=<tag>` and returns `None` when absent or unknown.
pub fn precision_from_options(options: &str) -> Option<Precision> {
    let needle = format!("{FP_TYPE_MACRO}=");
    options
        .split_whitespace()
        .find_map(|token| token.strip_prefix(needle.as_str()))
        .and_then(Precision::from_tag)
}
