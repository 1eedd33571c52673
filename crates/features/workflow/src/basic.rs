use crate::error::{WorkflowError, WorkflowErrorExt};
use seis_domain::Role;
use seis_domain::constants::{CHECKPOINT_PATH, SCRATCH_DIR};
use seis_kernel::component::Construct;
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::{WorkerContext, Workflow};
use seis_kernel::{KernelError, Session};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Subdirectory of `SCRATCH` the counting job writes to.
const TALLY_DIR: &str = "basic";

/// Dispatches a counting job once per iteration and checks every task reported back.
#[seis_derive::component(role = "workflow", name = "basic", tasks(setup, dispatch, tally), jobs(count))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basic {
    iteration: u32,
    iterations: u32,
    scratch: PathBuf,
    /// Tasks that reported back, per finished iteration.
    counts: Vec<usize>,
    checkpoint: bool,
}

impl Basic {
    #[must_use]
    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    fn tally_dir(&self) -> PathBuf {
        self.scratch.join(TALLY_DIR)
    }

    fn marker(dir: &Path, task_id: usize) -> PathBuf {
        dir.join(format!("task_{task_id:03}"))
    }

    /// Runs the system's own `setup` task when it has one, then clears old markers.
    fn setup(&mut self, session: &mut Session) -> Result<(), KernelError> {
        if session.require(Role::System)?.tasks().contains(&"setup") {
            session.invoke(Role::System, "setup")?;
        }
        let dir = self.tally_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir).context(format!("Clearing {}", dir.display()))?;
        }
        fs::create_dir_all(&dir).context(format!("Creating {}", dir.display()))?;
        Ok(())
    }

    fn dispatch(&mut self, session: &mut Session) -> Result<(), KernelError> {
        let report = session.submit(self, "count", false)?;
        debug!(tasks = report.task_ids.len(), "Count dispatched");
        Ok(())
    }

    /// Counts the markers left for this iteration and advances it.
    fn tally(&mut self, session: &mut Session) -> Result<(), KernelError> {
        let ntask = session.require_system()?.ntask();
        let dir = self.tally_dir();
        let mut count = 0;
        for task_id in 0..ntask {
            let path = Self::marker(&dir, task_id);
            let text = fs::read_to_string(&path).map_err(|err| WorkflowError::Output {
                path: path.clone(),
                message: err.to_string().into(),
                context: None,
            })?;
            if text.trim() == self.iteration.to_string() {
                count += 1;
            }
        }
        if count != ntask {
            return Err(WorkflowError::Output {
                path: dir,
                message: format!("{count} of {ntask} tasks reported iteration {}", self.iteration).into(),
                context: None,
            }
            .into());
        }

        info!(iteration = self.iteration, count, "Iteration tallied");
        self.counts.push(count);
        self.iteration += 1;
        Ok(())
    }

    /// Writes this iteration's number to the task's marker.
    fn count(&mut self, ctx: &WorkerContext) -> Result<(), KernelError> {
        let path = Self::marker(&self.tally_dir(), ctx.task_id());
        fs::write(&path, self.iteration.to_string()).context(format!("Writing {}", path.display()))?;
        Ok(())
    }
}

impl Workflow for Basic {
    fn checkpoint_after(&self, task: &str) -> bool {
        self.checkpoint && task == "tally"
    }

    fn repeat(&self) -> bool {
        self.iteration < self.iterations
    }
}

impl Construct for Basic {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        Ok(Self {
            iteration: 0,
            iterations: config.require(Role::Workflow, "ITERATIONS")?,
            scratch: config.require_path(Role::Workflow, "SCRATCH")?.to_path_buf(),
            counts: Vec::new(),
            checkpoint: config.path(CHECKPOINT_PATH).is_some(),
        })
    }

    fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::parameter("ITERATIONS").default(1).doc("times the task list runs"),
            Requirement::path("SCRATCH").default(SCRATCH_DIR),
        ]
    }
}
