//! Process environment: target selection and the default execution context
//!
//! Configuration comes from code (builder), from serde (any format) or from
//! `HETERO_*` environment variables. The resolved environment owns the CPU
//! variant kernels are dispatched for and the execution context device
//! kernels run on.

use hetero_core::{CapabilityTag, CpuVariant, Engine, Error, KernelFloat, Result, Target};
use hetero_exec::{ExecutionContext, HostDevice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Environment variable selecting `cpu` or `device`
pub const ENV_TARGET: &str = "HETERO_TARGET";
/// Environment variable selecting `generic`, `avx2` or `auto`
pub const ENV_CPU_VARIANT: &str = "HETERO_CPU_VARIANT";
/// Environment variable enabling parallel evaluation (`true`/`false`/`1`/`0`)
pub const ENV_PARALLEL: &str = "HETERO_PARALLEL";

/// Where algorithm kernels run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Cpu,
    Device,
}

/// User-facing environment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Run kernels on the CPU or through the execution context
    pub target: TargetKind,
    /// Fixed CPU variant; `None` detects the best one
    pub cpu_variant: Option<CpuVariant>,
    /// Evaluate work items in parallel where supported
    pub parallel: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            target: TargetKind::Cpu,
            cpu_variant: None,
            parallel: true,
        }
    }
}

impl EnvironmentConfig {
    /// Configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable lookup; unset keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_TARGET) {
            config.target = match value.trim().to_ascii_lowercase().as_str() {
                "cpu" => TargetKind::Cpu,
                "device" | "gpu" => TargetKind::Device,
                other => {
                    return Err(Error::InvalidParameter(format!(
                        "{ENV_TARGET}={other}: expected cpu or device"
                    )))
                }
            };
        }

        if let Some(value) = lookup(ENV_CPU_VARIANT) {
            let value = value.trim().to_ascii_lowercase();
            config.cpu_variant = if value == "auto" {
                None
            } else {
                Some(CpuVariant::from_name(&value).ok_or_else(|| {
                    Error::InvalidParameter(format!(
                        "{ENV_CPU_VARIANT}={value}: expected generic, avx2 or auto"
                    ))
                })?)
            };
        }

        if let Some(value) = lookup(ENV_PARALLEL) {
            config.parallel = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(Error::InvalidParameter(format!(
                        "{ENV_PARALLEL}={other}: expected a boolean"
                    )))
                }
            };
        }

        Ok(config)
    }
}

/// Resolved environment shared by algorithm objects
#[derive(Clone)]
pub struct Environment {
    config: EnvironmentConfig,
    cpu_variant: CpuVariant,
    context: Arc<ExecutionContext>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("cpu_variant", &self.cpu_variant)
            .field("device", &self.context.device_name())
            .finish()
    }
}

impl Environment {
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// Environment for `config` with a fresh host execution context
    pub fn from_config(config: EnvironmentConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Environment configured from `HETERO_*` variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(EnvironmentConfig::from_env()?)
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// CPU variant CPU kernels are dispatched for
    pub fn cpu_variant(&self) -> CpuVariant {
        self.cpu_variant
    }

    /// Execution context device kernels run on
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Target selected by the configuration
    pub fn target(&self) -> Target {
        match self.config.target {
            TargetKind::Cpu => Target::Cpu(self.cpu_variant),
            TargetKind::Device => self.context.target(),
        }
    }

    /// Dispatch tag for working type `T` on the selected target
    pub fn tag<T: KernelFloat>(&self) -> CapabilityTag {
        CapabilityTag::resolve::<T>(self.target())
    }

    /// Engine honouring the parallelism setting
    pub fn engine(&self) -> Engine {
        Engine::with_parallelism(self.config.parallel)
    }
}

/// Builder for [`Environment`]
#[derive(Default)]
pub struct EnvironmentBuilder {
    config: EnvironmentConfig,
    context: Option<Arc<ExecutionContext>>,
}

impl EnvironmentBuilder {
    /// Replace the whole configuration
    pub fn config(mut self, config: EnvironmentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn target(mut self, target: TargetKind) -> Self {
        self.config.target = target;
        self
    }

    /// Force a CPU variant instead of detecting one
    pub fn cpu_variant(mut self, variant: CpuVariant) -> Self {
        self.config.cpu_variant = Some(variant);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Share an existing execution context
    pub fn context(mut self, context: Arc<ExecutionContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<Environment> {
        let cpu_variant = match self.config.cpu_variant {
            Some(variant) if !variant.is_supported() => {
                return Err(Error::UnsupportedTarget(format!(
                    "cpu variant {} is not available on this machine or build",
                    variant.name()
                )))
            }
            Some(variant) => variant,
            None => CpuVariant::detect(),
        };

        let context = match self.context {
            Some(context) => context,
            None => {
                let engine = Engine::with_parallelism(self.config.parallel);
                Arc::new(ExecutionContext::new(Arc::new(HostDevice::with_engine(engine))))
            }
        };

        debug!(
            target = ?self.config.target,
            cpu_variant = cpu_variant.name(),
            device = context.device_name(),
            "environment resolved"
        );
        Ok(Environment {
            config: self.config,
            cpu_variant,
            context,
        })
    }
}
