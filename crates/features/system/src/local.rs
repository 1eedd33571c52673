use crate::error::SystemErrorExt;
use seis_domain::Role;
use seis_domain::constants::{LOG_DIR, OUTPUT_DIR, SCRATCH_DIR};
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::{Job, JobReport, System};
use seis_kernel::component::Construct;
use seis_kernel::{KernelError, Session};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, info_span};

/// Runs jobs on this machine.
#[seis_derive::component(role = "system", name = "local", tasks(setup))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Local {
    ntask: usize,
    nproc: usize,
    workdirs: Vec<PathBuf>,
}

impl Local {
    #[must_use]
    pub const fn nproc(&self) -> usize {
        self.nproc
    }

    /// Creates the scratch, output and log directories.
    fn setup(&mut self, _: &mut Session) -> Result<(), KernelError> {
        for dir in &self.workdirs {
            fs::create_dir_all(dir).context(format!("Creating {}", dir.display()))?;
            debug!(dir = %dir.display(), "Working directory ready");
        }
        Ok(())
    }
}

impl System for Local {
    fn ntask(&self) -> usize {
        self.ntask
    }

    fn run(&self, job: &Job) -> Result<JobReport, KernelError> {
        let ntask = job.ntask();
        let label = job.label().to_owned();
        info!(%label, ntask, nproc = self.nproc, "Running job on the local pool");

        let pool = seis_runtime::global_pool()?;
        let dispatched = job.clone();
        pool.map(ntask, self.nproc, move |task_id| {
            let _span = info_span!("task", label = dispatched.label(), task_id).entered();
            dispatched.execute(task_id)
        })?;

        Ok(JobReport { label, task_ids: (0..ntask).collect() })
    }
}

impl Construct for Local {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        let ntask: usize = config.require(Role::System, "NTASK")?;
        let nproc: usize = config.require(Role::System, "NPROC")?;
        if ntask == 0 || nproc == 0 {
            return Err(KernelError::Validation {
                message: format!("NTASK ({ntask}) and NPROC ({nproc}) must be positive").into(),
                context: None,
            });
        }
        let workdirs = ["SCRATCH", "OUTPUT", "LOG"]
            .into_iter()
            .filter_map(|key| config.path(key).map(PathBuf::from))
            .collect();
        Ok(Self { ntask, nproc, workdirs })
    }

    fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::parameter("NTASK").default(1).doc("number of tasks a job fans out to"),
            Requirement::parameter("NPROC").default(1).doc("tasks running at the same time"),
            Requirement::path("SCRATCH").default(SCRATCH_DIR),
            Requirement::path("OUTPUT").default(OUTPUT_DIR),
            Requirement::path("LOG").default(LOG_DIR),
        ]
    }
}
