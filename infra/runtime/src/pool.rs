use crate::error::RuntimeError;
use crate::{RuntimeConfig, build_runtime_with_config};
use std::any::Any;
use std::fmt::Display;
use std::sync::{Arc, OnceLock};
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// Owns a runtime and runs blocking jobs on it from synchronous callers.
#[derive(Debug)]
pub struct WorkerPool {
    runtime: Runtime,
}

static GLOBAL_POOL: OnceLock<WorkerPool> = OnceLock::new();

/// The process-wide pool, built with the default configuration on first use.
///
/// # Errors
///
/// Returns [`RuntimeError::Build`] if the first construction fails; a later call retries.
pub fn global_pool() -> Result<&'static WorkerPool, RuntimeError> {
    if let Some(pool) = GLOBAL_POOL.get() {
        return Ok(pool);
    }
    let pool = WorkerPool::new(&RuntimeConfig::default())?;
    Ok(GLOBAL_POOL.get_or_init(|| pool))
}

enum Outcome<T> {
    Done(T),
    Failed(String),
    Aborted(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "job panicked".to_owned())
}

fn aborted(err: JoinError) -> String {
    if err.is_panic() { panic_message(&*err.into_panic()) } else { err.to_string() }
}

impl WorkerPool {
    /// # Errors
    ///
    /// Returns [`RuntimeError::Build`] if the runtime cannot be created.
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        Ok(Self { runtime: build_runtime_with_config(config)? })
    }

    /// Runs `job(task_id)` for every id in `0..ntask`, at most `limit` at a time, and waits
    /// for all of them. Results come back ordered by task id.
    ///
    /// Every job runs to completion even when another fails. The error reported is the one
    /// from the lowest failing id; a panic counts as a failure.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if any job panicked, otherwise
    /// [`RuntimeError::Task`] if any job returned an error.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async context, like any `block_on`.
    pub fn map<T, E, F>(&self, ntask: usize, limit: usize, job: F) -> Result<Vec<T>, RuntimeError>
    where
        T: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(usize) -> Result<T, E> + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let permits = Arc::new(Semaphore::new(limit.max(1)));
        debug!(ntask, limit, "Dispatching jobs");

        let outcomes = self.runtime.block_on(async move {
            let mut set = JoinSet::new();
            for task_id in 0..ntask {
                let job = Arc::clone(&job);
                let permits = Arc::clone(&permits);
                set.spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return (task_id, Outcome::Aborted("worker pool closed".to_owned()));
                    };
                    let outcome = match tokio::task::spawn_blocking(move || job(task_id)).await {
                        Ok(Ok(value)) => Outcome::Done(value),
                        Ok(Err(err)) => Outcome::Failed(err.to_string()),
                        Err(err) => Outcome::Aborted(aborted(err)),
                    };
                    (task_id, outcome)
                });
            }

            let mut outcomes: Vec<Option<Outcome<T>>> = (0..ntask).map(|_| None).collect();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((task_id, outcome)) => outcomes[task_id] = Some(outcome),
                    Err(err) => warn!(error = %err, "Dispatch task lost"),
                }
            }
            outcomes
        });

        collect(outcomes)
    }

    /// [`WorkerPool::map`] for jobs without a result value.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::map`].
    pub fn run<E, F>(&self, ntask: usize, limit: usize, job: F) -> Result<(), RuntimeError>
    where
        E: Display + Send + 'static,
        F: Fn(usize) -> Result<(), E> + Send + Sync + 'static,
    {
        self.map(ntask, limit, job).map(|_| ())
    }
}

fn collect<T>(outcomes: Vec<Option<Outcome<T>>>) -> Result<Vec<T>, RuntimeError> {
    let total = outcomes.len();
    let mut values = Vec::with_capacity(total);
    let mut first_failure: Option<(usize, String)> = None;
    let mut failed = 0;

    for (task_id, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Some(Outcome::Done(value)) => values.push(value),
            Some(Outcome::Aborted(message)) => {
                warn!(task_id, %message, "Job aborted");
                return Err(RuntimeError::Aborted { task_id, message: message.into(), context: None });
            },
            None => {
                return Err(RuntimeError::Aborted {
                    task_id,
                    message: "job never reported".into(),
                    context: None,
                });
            },
            Some(Outcome::Failed(message)) => {
                warn!(task_id, %message, "Job failed");
                failed += 1;
                first_failure.get_or_insert((task_id, message));
            },
        }
    }

    match first_failure {
        Some((task_id, message)) => {
            Err(RuntimeError::Task { task_id, failed, total, message: message.into(), context: None })
        },
        None => Ok(values),
    }
}
