//! Container registry
//!
//! Maps `(algorithm, method, capability tag)` to a container constructor.
//! The process-wide registry is built once on first use. A CPU tag without
//! a registration falls back along the CPU variant chain (`avx2 -> generic`);
//! a device tag falls back to the default device id.

use crate::algorithm::{AlgorithmId, MethodId};
use crate::container::Container;
use crate::environment::Environment;
use hetero_core::{CapabilityTag, DeviceId, Error, Precision, Result, Target};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Builds a container for the tag it was registered under
pub type ContainerConstructor = fn(&Environment, CapabilityTag) -> Result<Box<dyn Container>>;

/// Registry lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerKey {
    pub algorithm: AlgorithmId,
    pub method: MethodId,
    pub tag: CapabilityTag,
}

lazy_static! {
    static ref GLOBAL_REGISTRY: ContainerRegistry = ContainerRegistry::builtin();
}

/// Table of container constructors
#[derive(Debug, Default, Clone)]
pub struct ContainerRegistry {
    constructors: HashMap<ContainerKey, ContainerConstructor>,
}

impl ContainerRegistry {
    /// Registry without registrations
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every algorithm shipped with this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::pca::register(&mut registry);
        crate::cross_entropy::register(&mut registry);
        debug!(entries = registry.len(), "container registry built");
        registry
    }

    /// Process-wide registry
    pub fn global() -> &'static ContainerRegistry {
        &GLOBAL_REGISTRY
    }

    /// Register `constructor` for one key, replacing any previous entry
    pub fn register(
        &mut self,
        algorithm: AlgorithmId,
        method: MethodId,
        tag: CapabilityTag,
        constructor: ContainerConstructor,
    ) -> &mut Self {
        self.constructors.insert(
            ContainerKey {
                algorithm,
                method,
                tag,
            },
            constructor,
        );
        self
    }

    /// Register single and double precision constructors for one target
    pub fn register_precisions(
        &mut self,
        algorithm: AlgorithmId,
        method: MethodId,
        target: Target,
        single: ContainerConstructor,
        double: ContainerConstructor,
    ) -> &mut Self {
        self.register(algorithm, method, CapabilityTag::new(Precision::Single, target), single)
            .register(algorithm, method, CapabilityTag::new(Precision::Double, target), double)
    }

    fn next_candidate(tag: CapabilityTag) -> Option<CapabilityTag> {
        match tag.target {
            Target::Cpu(variant) => variant.fallback().map(|v| tag.with_target(Target::Cpu(v))),
            Target::Device(id) if id != DeviceId::DEFAULT => {
                Some(tag.with_target(Target::Device(DeviceId::DEFAULT)))
            }
            Target::Device(_) => None,
        }
    }

    /// Registered tag and constructor serving `tag`, after fallback
    pub fn resolve(
        &self,
        algorithm: AlgorithmId,
        method: MethodId,
        tag: CapabilityTag,
    ) -> Result<(CapabilityTag, ContainerConstructor)> {
        let mut candidate = Some(tag);
        while let Some(current) = candidate {
            let key = ContainerKey {
                algorithm,
                method,
                tag: current,
            };
            if let Some(constructor) = self.constructors.get(&key) {
                if current != tag {
                    warn!(%algorithm, %method, requested = %tag, using = %current, "container fallback");
                }
                return Ok((current, *constructor));
            }
            candidate = Self::next_candidate(current);
        }
        Err(Error::ContainerNotRegistered(format!("{algorithm}/{method} at {tag}")))
    }

    /// Build the container serving `tag`
    pub fn create(
        &self,
        env: &Environment,
        algorithm: AlgorithmId,
        method: MethodId,
        tag: CapabilityTag,
    ) -> Result<Box<dyn Container>> {
        let (resolved, constructor) = self.resolve(algorithm, method, tag)?;
        constructor(env, resolved)
    }

    /// Whether an exact registration exists
    pub fn contains(&self, key: &ContainerKey) -> bool {
        self.constructors.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<ContainerKey> {
        let mut keys: Vec<ContainerKey> = self.constructors.keys().copied().collect();
        keys.sort();
        keys
    }
}
