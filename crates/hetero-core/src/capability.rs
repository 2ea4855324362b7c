//! Capability tags: the (precision, target) dispatch key
//!
//! A tag is resolved once (from the working type and the detected or
//! configured target) and then used only as a lookup key.

use crate::numeric::{KernelFloat, Precision};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CPU micro-architecture variant a CPU kernel is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuVariant {
    /// Portable scalar code
    Generic,
    /// x86_64 with AVX2 + FMA
    Avx2,
}

impl CpuVariant {
    /// Best variant supported by this build on this machine
    pub fn detect() -> Self {
        #[cfg(all(target_arch = "x86_64", feature = "avx2"))]
        {
            if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
                return CpuVariant::Avx2;
            }
        }
        CpuVariant::Generic
    }

    /// Whether this variant can run on this machine with this build
    pub fn is_supported(self) -> bool {
        match self {
            CpuVariant::Generic => true,
            CpuVariant::Avx2 => Self::detect() == CpuVariant::Avx2,
        }
    }

    /// Next variant to try when no kernel is registered for this one
    pub fn fallback(self) -> Option<Self> {
        match self {
            CpuVariant::Avx2 => Some(CpuVariant::Generic),
            CpuVariant::Generic => None,
        }
    }

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            CpuVariant::Generic => "generic",
            CpuVariant::Avx2 => "avx2",
        }
    }

    /// Parse a variant name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "generic" | "scalar" => Some(CpuVariant::Generic),
            "avx2" => Some(CpuVariant::Avx2),
            _ => None,
        }
    }
}

/// Identity of an accelerator device within an execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// The default device of an execution context
    pub const DEFAULT: DeviceId = DeviceId(0);
}

/// Where a kernel executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Target {
    /// Host CPU, specialised for a micro-architecture
    Cpu(CpuVariant),
    /// A device reached through an execution context
    Device(DeviceId),
}

impl Target {
    /// CPU target for the detected variant
    pub fn host() -> Self {
        Target::Cpu(CpuVariant::detect())
    }

    /// Whether this target runs through an execution context
    pub fn is_device(&self) -> bool {
        matches!(self, Target::Device(_))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Cpu(v) => write!(f, "cpu/{}", v.name()),
            Target::Device(DeviceId(id)) => write!(f, "device/{id}"),
        }
    }
}

/// Dispatch key combining working precision and target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapabilityTag {
    pub precision: Precision,
    pub target: Target,
}

impl CapabilityTag {
    /// Build a tag from explicit parts
    pub const fn new(precision: Precision, target: Target) -> Self {
        Self { precision, target }
    }

    /// Resolve the tag for working type `T` on `target`
    pub fn resolve<T: KernelFloat>(target: Target) -> Self {
        Self::new(T::PRECISION, target)
    }

    /// Same precision, different target
    pub fn with_target(self, target: Target) -> Self {
        Self::new(self.precision, target)
    }
}

impl fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.precision, self.target)
    }
}
