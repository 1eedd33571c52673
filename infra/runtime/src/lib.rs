//! # Runtime
//!
//! A Tokio runtime shaped for blocking compute jobs, and a [`WorkerPool`] that fans a
//! job out over `ntask` task ids and waits for all of them.
//!
//! Callers stay synchronous: the pool owns its runtime and blocks on it, so the workflow
//! core never needs an async context of its own. Each job runs on Tokio's blocking
//! thread pool behind a semaphore that caps how many run at once.
//!
//! ## Example
//!
//! ```rust
//! use seis_runtime::{RuntimeConfig, WorkerPool};
//!
//! let pool = WorkerPool::new(&RuntimeConfig::lightweight()).unwrap();
//! let squares = pool.map(4, 2, |task_id| Ok::<_, String>(task_id * task_id)).unwrap();
//! assert_eq!(squares, [0, 1, 4, 9]);
//! ```

mod error;
mod pool;

pub use crate::error::{RuntimeError, RuntimeErrorExt};
pub use crate::pool::{WorkerPool, global_pool};

use std::{sync::OnceLock, thread::available_parallelism, time::Duration};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

const DEFAULT_WORKER_THREADS: usize = 4;
/// 3 `MiB`.
const DEFAULT_STACK_SIZE: usize = 3 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 1024 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(60);
const DEFAULT_THREAD_NAME: &str = "seis-worker";

static WORKER_THREADS: OnceLock<usize> = OnceLock::new();

/// `TOKIO_WORKER_THREADS` when set and sane, otherwise the available parallelism.
fn detected_parallelism() -> usize {
    *WORKER_THREADS.get_or_init(|| {
        std::env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0 && n <= 1024)
            .unwrap_or_else(|| {
                available_parallelism()
                    .map(std::num::NonZero::get)
                    .unwrap_or(DEFAULT_WORKER_THREADS)
            })
    })
}

fn thread_name_or_default(name: String) -> String {
    if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Async scheduler threads; jobs themselves run on the blocking pool.
    pub worker_threads: usize,
    /// Upper bound on concurrently running blocking jobs across all dispatches.
    pub max_blocking_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let parallelism = detected_parallelism();
        Self {
            worker_threads: parallelism.min(DEFAULT_WORKER_THREADS),
            max_blocking_threads: parallelism.max(1) * 4,
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }
}

impl RuntimeConfig {
    /// One scheduler thread and a small blocking pool; for tests and single-node debugging.
    #[must_use = "Use this configuration for small, short-lived pools"]
    pub fn lightweight() -> Self {
        Self {
            worker_threads: 1,
            max_blocking_threads: 8,
            stack_size: 2 * 1024 * 1024,
            thread_name: "seis-light".to_owned(),
            thread_keep_alive: Duration::from_secs(10),
        }
    }

    #[must_use = "Customize the number of scheduler threads"]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, 1024);
        self
    }

    #[must_use = "Customize the blocking pool size"]
    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = threads.clamp(1, 4096);
        self
    }

    #[must_use = "Customize the stack size for worker threads"]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    #[must_use = "Customize the thread name"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = thread_name_or_default(name.into());
        self
    }

    fn normalized(&self) -> Self {
        Self {
            worker_threads: self.worker_threads.clamp(1, 1024),
            max_blocking_threads: self.max_blocking_threads.clamp(1, 4096),
            stack_size: self.stack_size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE),
            thread_name: thread_name_or_default(self.thread_name.clone()),
            thread_keep_alive: self.thread_keep_alive,
        }
    }
}

/// Builds a multi-threaded runtime from a (normalized) configuration.
///
/// # Errors
///
/// Returns [`RuntimeError::Build`] if the OS refuses the runtime's threads.
pub fn build_runtime_with_config(config: &RuntimeConfig) -> Result<Runtime, RuntimeError> {
    let config = config.normalized();
    debug!(config = ?config, "Building tokio runtime");

    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .max_blocking_threads(config.max_blocking_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive)
        .enable_all()
        .build()
        .context(format!("{} worker threads", config.worker_threads))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_thread_counts() {
        let config = RuntimeConfig::default().with_worker_threads(0);
        assert_eq!(config.worker_threads, 1);

        let config = RuntimeConfig::default().with_max_blocking_threads(100_000);
        assert_eq!(config.max_blocking_threads, 4096);
    }

    #[test]
    fn clamps_stack_size() {
        let config = RuntimeConfig::default().with_stack_size(100);
        assert_eq!(config.stack_size, MIN_STACK_SIZE);

        let config = RuntimeConfig::default().with_stack_size(100 * 1024 * 1024);
        assert_eq!(config.stack_size, MAX_STACK_SIZE);
    }

    #[test]
    fn blank_thread_name_falls_back() {
        let config = RuntimeConfig::lightweight().with_thread_name("   ");
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }
}
