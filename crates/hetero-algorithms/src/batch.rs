//! Batch algorithm objects
//!
//! A [`Batch`] owns the input, parameter and result of one algorithm and the
//! container the registry selected for its capability tag. Containers only
//! ever see the three objects through untyped handles.

use crate::algorithm::Algorithm;
use crate::container::{Container, ContainerState, Io};
use crate::environment::Environment;
use crate::registry::ContainerRegistry;
use hetero_core::{CapabilityTag, KernelFloat, Result, Status};
use std::fmt;

/// Algorithm `A` computed in batch mode
pub struct Batch<A: Algorithm> {
    input: A::Input,
    parameter: A::Parameter,
    result: A::Result,
    container: Box<dyn Container>,
}

impl<A: Algorithm> Batch<A> {
    /// Batch object working in precision `T` on the environment's target
    pub fn new<T: KernelFloat>(env: &Environment, input: A::Input, parameter: A::Parameter) -> Result<Self> {
        Self::with_tag(env, env.tag::<T>(), input, parameter)
    }

    /// Batch object for an explicit capability tag
    pub fn with_tag(
        env: &Environment,
        tag: CapabilityTag,
        input: A::Input,
        parameter: A::Parameter,
    ) -> Result<Self> {
        Self::with_registry(ContainerRegistry::global(), env, tag, input, parameter)
    }

    /// Batch object whose container comes from `registry`
    pub fn with_registry(
        registry: &ContainerRegistry,
        env: &Environment,
        tag: CapabilityTag,
        input: A::Input,
        parameter: A::Parameter,
    ) -> Result<Self> {
        let container = registry.create(env, A::ID, A::METHOD, tag)?;
        Ok(Self {
            input,
            parameter,
            result: A::Result::default(),
            container,
        })
    }

    /// Validate, allocate and compute into the held result
    pub fn compute(&mut self) -> Status {
        let mut io = Io::new(&self.input, &self.parameter, &mut self.result);
        self.container.compute(&mut io)
    }

    pub fn input(&self) -> &A::Input {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut A::Input {
        &mut self.input
    }

    pub fn parameter(&self) -> &A::Parameter {
        &self.parameter
    }

    pub fn parameter_mut(&mut self) -> &mut A::Parameter {
        &mut self.parameter
    }

    pub fn result(&self) -> &A::Result {
        &self.result
    }

    /// Supply result storage; present outputs are reused by the next compute
    pub fn set_result(&mut self, result: A::Result) {
        self.result = result;
    }

    /// Take the result, leaving an empty one in its place
    pub fn take_result(&mut self) -> A::Result {
        std::mem::take(&mut self.result)
    }

    /// Tag of the container actually serving this object
    pub fn tag(&self) -> CapabilityTag {
        self.container.tag()
    }

    pub fn kernel_name(&self) -> &'static str {
        self.container.kernel_name()
    }

    pub fn state(&self) -> ContainerState {
        self.container.state()
    }
}

impl<A: Algorithm> fmt::Debug for Batch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("algorithm", &A::ID)
            .field("method", &A::METHOD)
            .field("tag", &self.container.tag())
            .field("kernel", &self.container.kernel_name())
            .field("state", &self.container.state())
            .finish()
    }
}
