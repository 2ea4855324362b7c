//! Execution engines for evaluating index ranges
//!
//! An engine decides whether the work items of a launch are evaluated on the
//! calling thread or spread over a rayon pool. Either way `execute_batch`
//! returns only after every item has finished, so callers always observe
//! completed work.

#[cfg(feature = "parallel")]
use crate::{Error, Result};

/// Execution strategy for batch operations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Process items sequentially
    Sequential,
    /// Process items in parallel
    Parallel,
}

/// Engines that evaluate a batch of independent work items
pub trait ExecutionEngine: Clone + Send + Sync {
    /// Evaluate `f(0..count)` and collect the results in index order
    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send;

    /// Get the execution strategy
    fn strategy(&self) -> ExecutionStrategy;

    /// Get the number of threads available
    fn num_threads(&self) -> usize;

    /// Check if parallel execution is available
    fn is_parallel(&self) -> bool {
        self.strategy() == ExecutionStrategy::Parallel
    }
}

/// Executes all items in the current thread
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialEngine;

impl ExecutionEngine for SequentialEngine {
    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        (0..count).map(f).collect()
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Sequential
    }

    fn num_threads(&self) -> usize {
        1
    }
}

/// Parallel execution engine using Rayon
#[cfg(feature = "parallel")]
#[derive(Clone, Debug, Default)]
pub struct ParallelEngine {
    thread_pool: Option<std::sync::Arc<rayon::ThreadPool>>,
}

#[cfg(feature = "parallel")]
impl ParallelEngine {
    /// Engine on the global rayon pool
    pub fn new() -> Self {
        Self { thread_pool: None }
    }

    /// Engine on a dedicated pool with `num_threads` workers
    pub fn with_num_threads(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| Error::Launch(format!("Failed to create thread pool: {e}")))?;

        Ok(Self {
            thread_pool: Some(std::sync::Arc::new(pool)),
        })
    }
}

#[cfg(feature = "parallel")]
impl ExecutionEngine for ParallelEngine {
    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        use rayon::prelude::*;

        if let Some(pool) = &self.thread_pool {
            pool.install(|| (0..count).into_par_iter().map(f).collect())
        } else {
            (0..count).into_par_iter().map(f).collect()
        }
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Parallel
    }

    fn num_threads(&self) -> usize {
        if let Some(pool) = &self.thread_pool {
            pool.current_num_threads()
        } else {
            rayon::current_num_threads()
        }
    }
}

/// Engine chosen at runtime, storable in a struct field
#[derive(Clone, Debug)]
pub enum Engine {
    Sequential(SequentialEngine),
    #[cfg(feature = "parallel")]
    Parallel(ParallelEngine),
}

impl Engine {
    /// Sequential engine
    pub fn sequential() -> Self {
        Engine::Sequential(SequentialEngine)
    }

    /// Parallel engine when built with `parallel` and more than one core is
    /// present, sequential otherwise
    pub fn auto() -> Self {
        #[cfg(feature = "parallel")]
        {
            if num_cpus::get() > 1 {
                return Engine::Parallel(ParallelEngine::new());
            }
        }
        Engine::sequential()
    }

    /// Engine honouring an explicit parallelism preference
    pub fn with_parallelism(parallel: bool) -> Self {
        if parallel {
            Self::auto()
        } else {
            Self::sequential()
        }
    }

    /// Engine with a dedicated pool of `num_threads` workers
    #[cfg(feature = "parallel")]
    pub fn with_num_threads(num_threads: usize) -> Result<Self> {
        ParallelEngine::with_num_threads(num_threads).map(Engine::Parallel)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::auto()
    }
}

impl ExecutionEngine for Engine {
    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        match self {
            Engine::Sequential(e) => e.execute_batch(count, f),
            #[cfg(feature = "parallel")]
            Engine::Parallel(e) => e.execute_batch(count, f),
        }
    }

    fn strategy(&self) -> ExecutionStrategy {
        match self {
            Engine::Sequential(e) => e.strategy(),
            #[cfg(feature = "parallel")]
            Engine::Parallel(e) => e.strategy(),
        }
    }

    fn num_threads(&self) -> usize {
        match self {
            Engine::Sequential(e) => e.num_threads(),
            #[cfg(feature = "parallel")]
            Engine::Parallel(e) => e.num_threads(),
        }
    }
}
