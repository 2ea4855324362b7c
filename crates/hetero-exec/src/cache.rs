//! Compiled-program cache with compute-once builds
//!
//! Ready programs live in a `DashMap` and are read without further locking.
//! A key being compiled is recorded in a pending set; other threads asking
//! for the same key wait on a condition variable until the builder publishes
//! the program or gives up. Compilation itself runs outside every lock, so
//! builds of different keys proceed in parallel and each key is compiled at
//! most once per successful build.

use crate::device::CompiledProgram;
use dashmap::DashMap;
use hetero_core::Result;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::debug;

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Programs currently cached
    pub entries: usize,
    /// Compilations attempted, failed ones included
    pub compiles: usize,
    /// Lookups served from the cache
    pub hits: usize,
}

/// Cache key to compiled program
#[derive(Debug, Default)]
pub struct ProgramCache {
    ready: DashMap<String, Arc<CompiledProgram>>,
    pending: Mutex<HashSet<String>>,
    built: Condvar,
    compiles: AtomicUsize,
    hits: AtomicUsize,
}

/// Clears a pending key and wakes waiters, also when the build panics
struct PendingGuard<'a> {
    cache: &'a ProgramCache,
    key: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.cache.lock_pending().remove(self.key);
        self.cache.built.notify_all();
    }
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashSet<String>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lookup(&self, key: &str) -> Option<Arc<CompiledProgram>> {
        let program = self.ready.get(key).map(|entry| Arc::clone(entry.value()));
        if program.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        program
    }

    /// Cached program for `key`, without building
    pub fn get(&self, key: &str) -> Option<Arc<CompiledProgram>> {
        self.ready.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Cached program for `key`, running `build` on a miss
    ///
    /// Concurrent callers with the same key block until the first caller's
    /// build finishes. A failed build leaves no entry and the next caller
    /// retries.
    pub fn get_or_build<F>(&self, key: &str, build: F) -> Result<Arc<CompiledProgram>>
    where
        F: FnOnce() -> Result<CompiledProgram>,
    {
        if let Some(program) = self.lookup(key) {
            return Ok(program);
        }

        {
            let mut pending = self.lock_pending();
            loop {
                if let Some(program) = self.lookup(key) {
                    return Ok(program);
                }
                if !pending.contains(key) {
                    break;
                }
                pending = self
                    .built
                    .wait(pending)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            pending.insert(key.to_string());
        }

        let _guard = PendingGuard { cache: self, key };
        debug!(cache_key = key, "program cache miss, compiling");
        self.compiles.fetch_add(1, Ordering::Relaxed);
        let program = Arc::new(build()?);
        self.ready.insert(key.to_string(), Arc::clone(&program));
        Ok(program)
    }

    /// Whether `key` has a ready program
    pub fn contains(&self, key: &str) -> bool {
        self.ready.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// Number of compilations attempted
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            compiles: self.compile_count(),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }

    /// Sorted keys of the ready programs
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.ready.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}
