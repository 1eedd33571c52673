//! Capability traits, one per role, and the job plumbing shared between a session and its
//! workers.

use crate::adapter::{self, StateEnvelope};
use crate::component::Component;
use crate::config::ConfigSnapshot;
use crate::error::KernelError;
use crate::resolver::Catalog;
use seis_domain::{Model, Role, SearchStatus, Trace};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Runs jobs across workers.
pub trait System {
    /// Number of tasks a full dispatch fans out to.
    fn ntask(&self) -> usize;

    /// Runs `job` once per task id in `0..job.ntask()` and returns once every task is done.
    ///
    /// # Errors
    ///
    /// Returns the failure of any task; the others still run to completion.
    fn run(&self, job: &Job) -> Result<JobReport, KernelError>;
}

/// Waveform record I/O and misfit.
pub trait Preprocess {
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    fn read(&self, path: &Path) -> Result<Trace, KernelError>;

    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write(&self, trace: &Trace, path: &Path) -> Result<(), KernelError>;

    /// Scalar misfit between synthetic and observed records.
    ///
    /// # Errors
    ///
    /// Returns an error if the records are not comparable.
    fn misfit(&self, syn: &Trace, obs: &Trace) -> Result<f64, KernelError>;

    /// Adjoint source for the configured misfit.
    ///
    /// # Errors
    ///
    /// Returns an error if the records are not comparable.
    fn adjoint(&self, syn: &Trace, obs: &Trace) -> Result<Trace, KernelError>;
}

/// The external numerical solver and its model files.
pub trait Solver {
    /// Number of processor slices a model is split into.
    fn nproc(&self) -> usize;

    /// Runs `executable` with `args` inside `workdir`; success is a zero exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exits non-zero.
    fn call(&self, executable: &Path, args: &[&str], workdir: &Path) -> Result<(), KernelError>;

    /// Forward simulation for the model in `model_dir`; synthetics land under `workdir`.
    ///
    /// # Errors
    ///
    /// See [`Solver::call`].
    fn forward(&self, model_dir: &Path, workdir: &Path) -> Result<(), KernelError>;

    /// Adjoint simulation; sensitivity kernels land under `workdir`.
    ///
    /// # Errors
    ///
    /// See [`Solver::call`].
    fn adjoint(&self, model_dir: &Path, workdir: &Path) -> Result<(), KernelError>;

    /// Reads every configured material from `dir`; `suffix` selects e.g. `_kernel` files.
    ///
    /// # Errors
    ///
    /// Returns an error if a slice is missing or malformed.
    fn load_model(&self, dir: &Path, suffix: &str) -> Result<Model, KernelError>;

    /// # Errors
    ///
    /// Returns an error if a slice cannot be written.
    fn save_model(&self, dir: &Path, model: &Model, suffix: &str) -> Result<(), KernelError>;
}

/// Aggregation of per-source results.
pub trait Postprocess {
    /// Combines per-source partial gradients into one.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no partials or their shapes differ.
    fn combine(&self, partials: &[Model]) -> Result<Model, KernelError>;
}

/// One line-search step: the next point to evaluate, or the accepted one.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub point: Vec<f64>,
    pub status: SearchStatus,
}

/// Model updates by line search.
pub trait Optimize {
    /// Feeds the objective `value` at `point` into the search.
    ///
    /// With a `gradient`, `point` is an accepted model and a new search starts from it; the
    /// returned step holds the first trial point with [`SearchStatus::Continue`]. Without one,
    /// `point` is the last trial and the step either accepts it ([`SearchStatus::Pass`]),
    /// proposes another trial ([`SearchStatus::Continue`]) or gives up ([`SearchStatus::Fail`]).
    ///
    /// # Errors
    ///
    /// Returns an error if a trial is reported with no search in progress or the vector
    /// lengths disagree.
    fn step(
        &mut self,
        point: &[f64],
        value: f64,
        gradient: Option<&[f64]>,
    ) -> Result<Step, KernelError>;

    /// Forgets search history (e.g. L-BFGS memory).
    fn restart(&mut self);
}

/// Control of the task list a workflow exposes through its `tasks(...)`.
pub trait Workflow {
    /// Whether the session should checkpoint once `task` completes.
    fn checkpoint_after(&self, task: &str) -> bool {
        let _ = task;
        false
    }

    /// Whether the task list runs again after its last task (e.g. another iteration).
    fn repeat(&self) -> bool {
        false
    }
}

/// Outcome of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// `role.job` of the bound call.
    pub label: String,
    pub task_ids: Vec<usize>,
}

/// A dispatch ready for a [`System`]: the encoded payload plus the catalog to decode it.
///
/// Workers never see the live registry; every task decodes its own copy of the payload.
#[derive(Debug, Clone)]
pub struct Job {
    catalog: Arc<Catalog>,
    payload: Arc<[u8]>,
    ntask: usize,
    label: String,
}

impl Job {
    pub(crate) fn new(catalog: Arc<Catalog>, payload: Vec<u8>, ntask: usize, label: String) -> Self {
        Self { catalog, payload: payload.into(), ntask, label }
    }

    #[must_use]
    pub const fn ntask(&self) -> usize {
        self.ntask
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The encoded payload, for systems that ship work to other processes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decodes the payload and runs the bound call as task `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::StateDrift`] if the payload no longer matches the catalog,
    /// or the job's own failure.
    pub fn execute(&self, task_id: usize) -> Result<(), KernelError> {
        adapter::run_worker(&self.catalog, &self.payload, task_id, self.ntask).map(|_| ())
    }
}

/// What a job sees: its task id, a copy of the configuration and copies of the other
/// active components.
#[derive(Debug)]
pub struct WorkerContext {
    task_id: usize,
    ntask: usize,
    config: ConfigSnapshot,
    catalog: Arc<Catalog>,
    peers: Vec<StateEnvelope>,
}

impl WorkerContext {
    #[must_use]
    pub const fn new(
        task_id: usize,
        ntask: usize,
        config: ConfigSnapshot,
        catalog: Arc<Catalog>,
        peers: Vec<StateEnvelope>,
    ) -> Self {
        Self { task_id, ntask, config, catalog, peers }
    }

    #[must_use]
    pub const fn task_id(&self) -> usize {
        self.task_id
    }

    #[must_use]
    pub const fn ntask(&self) -> usize {
        self.ntask
    }

    #[must_use]
    pub const fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    #[must_use]
    pub const fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Rebuilds this worker's own copy of the component active in `role` at dispatch time.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::StateDrift`] if the copy cannot be restored.
    pub fn component(&self, role: Role) -> Result<Option<Box<dyn Component>>, KernelError> {
        self.peers.iter().find(|env| env.role == role).map(|env| env.restore(&self.catalog)).transpose()
    }

    /// Like [`WorkerContext::component`], but the role must have been active.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Validation`] if the role was not active at dispatch time.
    pub fn require(&self, role: Role) -> Result<Box<dyn Component>, KernelError> {
        self.component(role)?.ok_or_else(|| {
            KernelError::validation(format!("{role} is not active in this job (task {})", self.task_id))
        })
    }
}
