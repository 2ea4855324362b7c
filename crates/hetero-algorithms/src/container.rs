//! Algorithm containers
//!
//! A container owns exactly one kernel, chosen when the container is built
//! for a capability tag. Every `compute` resolves the untyped input,
//! parameter and result handles, validates, allocates, validates again and
//! only then runs the kernel.
//!
//! A container only exists once its kernel is selected, so it starts out
//! `Ready`:
//!
//! ```text
//! Ready -> Computing -> Computed | Failed
//!   ^                       |
//!   +---- compute again ----+
//! ```

use crate::algorithm::{Algorithm, AlgorithmId, MethodId, ParameterDescriptor, ResultDescriptor};
use hetero_core::{CapabilityTag, Error, KernelFloat, Result, Status};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, instrument, trace};

/// Concrete computation behind a container
pub trait Kernel<A: Algorithm, T: KernelFloat>: Send + Sync {
    /// Short name identifying the implementation
    fn name(&self) -> &'static str;

    /// Compute into `result`, whose storage is already allocated
    fn compute(&self, input: &A::Input, parameter: &A::Parameter, result: &mut A::Result) -> Status;
}

/// Life-cycle state of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    /// Kernel selected, nothing computed yet
    Ready,
    Computing,
    Computed,
    Failed,
}

/// Untyped handles to the objects one `compute` call borrows
pub struct Io<'a> {
    input: &'a dyn Any,
    parameter: &'a dyn Any,
    result: &'a mut dyn Any,
}

impl<'a> Io<'a> {
    pub fn new(input: &'a dyn Any, parameter: &'a dyn Any, result: &'a mut dyn Any) -> Self {
        Self {
            input,
            parameter,
            result,
        }
    }

    /// Typed views for algorithm `A`
    pub fn resolve<A: Algorithm>(&mut self) -> Result<(&A::Input, &A::Parameter, &mut A::Result)> {
        let input = self
            .input
            .downcast_ref::<A::Input>()
            .ok_or(Error::IncorrectHandle("algorithm input"))?;
        let parameter = self
            .parameter
            .downcast_ref::<A::Parameter>()
            .ok_or(Error::IncorrectHandle("algorithm parameter"))?;
        let result = self
            .result
            .downcast_mut::<A::Result>()
            .ok_or(Error::IncorrectHandle("algorithm result"))?;
        Ok((input, parameter, result))
    }
}

impl fmt::Debug for Io<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Io")
    }
}

/// Type-erased container as stored by the registry and algorithm objects
pub trait Container: Send {
    fn algorithm(&self) -> AlgorithmId;

    fn method(&self) -> MethodId;

    /// Tag the container was built for
    fn tag(&self) -> CapabilityTag;

    /// Name of the owned kernel
    fn kernel_name(&self) -> &'static str;

    fn state(&self) -> ContainerState;

    /// Validate, allocate and run the kernel on the handles in `io`
    fn compute(&mut self, io: &mut Io<'_>) -> Status;
}

/// Container for algorithm `A` at working precision `T`
pub struct BatchContainer<A: Algorithm, T: KernelFloat> {
    tag: CapabilityTag,
    kernel: Box<dyn Kernel<A, T>>,
    state: ContainerState,
    _marker: PhantomData<fn() -> A>,
}

impl<A: Algorithm, T: KernelFloat> BatchContainer<A, T> {
    /// Container owning `kernel` for `tag`
    pub fn new(tag: CapabilityTag, kernel: Box<dyn Kernel<A, T>>) -> Self {
        debug!(
            algorithm = %A::ID,
            method = %A::METHOD,
            %tag,
            kernel = kernel.name(),
            "container ready"
        );
        Self {
            tag,
            kernel,
            state: ContainerState::Ready,
            _marker: PhantomData,
        }
    }

    /// Parameter check, then allocation, then result check
    fn prepare(input: &A::Input, parameter: &A::Parameter, result: &mut A::Result) -> Status {
        let status = parameter.check(input, A::METHOD);
        if !status.is_ok() {
            return status;
        }
        let status = result.allocate::<T>(input, parameter, A::METHOD);
        if !status.is_ok() {
            return status;
        }
        result.check(input, parameter, A::METHOD)
    }
}

impl<A: Algorithm, T: KernelFloat> fmt::Debug for BatchContainer<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchContainer")
            .field("algorithm", &A::ID)
            .field("method", &A::METHOD)
            .field("tag", &self.tag)
            .field("kernel", &self.kernel.name())
            .field("state", &self.state)
            .finish()
    }
}

impl<A: Algorithm, T: KernelFloat> Container for BatchContainer<A, T> {
    fn algorithm(&self) -> AlgorithmId {
        A::ID
    }

    fn method(&self) -> MethodId {
        A::METHOD
    }

    fn tag(&self) -> CapabilityTag {
        self.tag
    }

    fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }

    fn state(&self) -> ContainerState {
        self.state
    }

    #[instrument(skip_all, fields(algorithm = %A::ID, method = %A::METHOD, tag = %self.tag))]
    fn compute(&mut self, io: &mut Io<'_>) -> Status {
        let (input, parameter, result) = match io.resolve::<A>() {
            Ok(views) => views,
            Err(e) => {
                self.state = ContainerState::Failed;
                return e.into();
            }
        };

        self.state = ContainerState::Computing;
        let status = Self::prepare(input, parameter, result);
        if !status.is_ok() {
            debug!(%status, "validation failed");
            self.state = ContainerState::Failed;
            return status;
        }

        trace!(kernel = self.kernel.name(), "running kernel");
        let status = self.kernel.compute(input, parameter, result);
        self.state = if status.is_ok() {
            ContainerState::Computed
        } else {
            ContainerState::Failed
        };
        status
    }
}

impl<A: Algorithm, T: KernelFloat> Drop for BatchContainer<A, T> {
    fn drop(&mut self) {
        trace!(algorithm = %A::ID, kernel = self.kernel.name(), "container destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hetero_core::{CpuVariant, ErrorClass, Precision, Target};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Tracker {
        allocated: bool,
        kernel_saw_allocation: bool,
    }

    struct Limit(usize);

    impl ParameterDescriptor<usize> for Limit {
        fn check(&self, input: &usize, _: MethodId) -> Status {
            if *input > self.0 {
                Error::InvalidParameter(format!("{input} exceeds {}", self.0)).into()
            } else {
                Status::ok()
            }
        }
    }

    impl ResultDescriptor<usize, Limit> for Tracker {
        fn allocate<T: KernelFloat>(&mut self, _: &usize, _: &Limit, _: MethodId) -> Status {
            self.allocated = true;
            Status::ok()
        }

        fn check(&self, _: &usize, _: &Limit, _: MethodId) -> Status {
            if self.allocated {
                Status::ok()
            } else {
                Error::NullResult("tracker".into()).into()
            }
        }
    }

    struct TrackedAlgorithm;

    impl Algorithm for TrackedAlgorithm {
        const ID: AlgorithmId = AlgorithmId::Pca;
        const METHOD: MethodId = MethodId::DefaultDense;
        type Input = usize;
        type Parameter = Limit;
        type Result = Tracker;
    }

    struct CountingKernel(Arc<AtomicUsize>);

    impl Kernel<TrackedAlgorithm, f64> for CountingKernel {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn compute(&self, _: &usize, _: &Limit, result: &mut Tracker) -> Status {
            self.0.fetch_add(1, Ordering::SeqCst);
            result.kernel_saw_allocation = result.allocated;
            Status::ok()
        }
    }

    fn container(calls: &Arc<AtomicUsize>) -> BatchContainer<TrackedAlgorithm, f64> {
        let tag = CapabilityTag::new(Precision::Double, Target::Cpu(CpuVariant::Generic));
        BatchContainer::new(tag, Box::new(CountingKernel(Arc::clone(calls))))
    }

    #[test]
    fn test_compute_runs_kernel_after_allocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = container(&calls);
        assert_eq!(c.state(), ContainerState::Ready);

        let (input, parameter, mut result) = (3usize, Limit(5), Tracker::default());
        let status = c.compute(&mut Io::new(&input, &parameter, &mut result));
        assert!(status.is_ok());
        assert_eq!(c.state(), ContainerState::Computed);
        assert!(result.kernel_saw_allocation);

        // Re-enterable once computed
        assert!(c.compute(&mut Io::new(&input, &parameter, &mut result)).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_validation_failure_skips_allocation_and_kernel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = container(&calls);
        let (input, parameter, mut result) = (9usize, Limit(5), Tracker::default());

        let status = c.compute(&mut Io::new(&input, &parameter, &mut result));
        assert_eq!(status.class(), Some(ErrorClass::Validation));
        assert_eq!(c.state(), ContainerState::Failed);
        assert!(!result.allocated);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_container_computes_again() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = container(&calls);
        let (input, parameter, mut result) = (9usize, Limit(5), Tracker::default());
        assert!(!c.compute(&mut Io::new(&input, &parameter, &mut result)).is_ok());
        assert_eq!(c.state(), ContainerState::Failed);

        let input = 4usize;
        assert!(c.compute(&mut Io::new(&input, &parameter, &mut result)).is_ok());
        assert_eq!(c.state(), ContainerState::Computed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wrong_handle_types() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = container(&calls);
        let (input, parameter, mut wrong) = (1usize, Limit(5), 0u8);

        let status = c.compute(&mut Io::new(&input, &parameter, &mut wrong));
        assert!(matches!(status.first(), Some(Error::IncorrectHandle("algorithm result"))));
        assert_eq!(status.class(), Some(ErrorClass::Programming));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
