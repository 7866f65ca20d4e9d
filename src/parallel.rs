// src/parallel.rs

//! Bounded-concurrency batch execution
//!
//! Batch file work (checksums, installs) runs on a dedicated rayon pool whose
//! size caps the number of files open at once. Results always come back in
//! input order. `try_map` is fail-fast: once any item errors, rayon stops
//! handing out new items, although items already running are allowed to
//! finish.

use crate::{Error, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Default worker limit for the current platform
///
/// macOS and Windows ship with much lower default descriptor limits than
/// Linux, so they get a smaller pool.
pub const fn default_concurrency() -> usize {
    if cfg!(any(target_os = "macos", target_os = "windows")) {
        16
    } else {
        64
    }
}

/// A worker pool with a fixed concurrency limit
pub struct BoundedPool {
    pool: ThreadPool,
    limit: usize,
}

impl BoundedPool {
    /// Create a pool running at most `limit` jobs at once (minimum 1)
    pub fn new(limit: usize) -> Result<Self> {
        let limit = limit.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(limit)
            .thread_name(|i| format!("kitsync-worker-{}", i))
            .build()
            .map_err(|e| Error::IoError(format!("Failed to start worker pool: {}", e)))?;

        Ok(Self { pool, limit })
    }

    /// Create a pool sized for the current platform
    pub fn with_default_limit() -> Result<Self> {
        Self::new(default_concurrency())
    }

    /// The concurrency limit
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `f` over every item, returning results in input order
    ///
    /// Stops scheduling new items after the first error and returns it.
    pub fn try_map<T, U, F>(&self, items: &[T], f: F) -> Result<Vec<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<U> + Sync + Send,
    {
        self.pool
            .install(|| items.par_iter().map(|item| f(item)).collect())
    }

    /// Run an infallible `f` over every item, returning results in input order
    pub fn map<T, U, F>(&self, items: &[T], f: F) -> Vec<U>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        self.pool
            .install(|| items.par_iter().map(|item| f(item)).collect())
    }
}

impl std::fmt::Debug for BoundedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedPool")
            .field("limit", &self.limit)
            .finish()
    }
}
