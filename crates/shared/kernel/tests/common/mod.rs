#![allow(dead_code, unreachable_pub)]

use seis_kernel::component::{Component, Construct, Describe};
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::{Job, JobReport, Solver, System, WorkerContext, Workflow};
use seis_kernel::domain::{Model, Role};
use seis_kernel::{Catalog, ComponentFactory, KernelError, Session, StopHandle};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Runs every task on the calling thread.
#[seis_derive::component(role = "system", name = "inline")]
#[derive(Debug, Serialize, Deserialize)]
pub struct Inline {
    pub ntask: usize,
}

impl System for Inline {
    fn ntask(&self) -> usize {
        self.ntask
    }

    fn run(&self, job: &Job) -> Result<JobReport, KernelError> {
        for id in 0..job.ntask() {
            job.execute(id)?;
        }
        Ok(JobReport { label: job.label().to_owned(), task_ids: (0..job.ntask()).collect() })
    }
}

impl Construct for Inline {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        Ok(Self { ntask: config.require(Role::System, "NTASK")? })
    }

    fn requirements() -> Vec<Requirement> {
        vec![Requirement::parameter("NTASK").default(2)]
    }
}

#[seis_derive::component(role = "solver", name = "my_solver")]
#[derive(Debug, Serialize, Deserialize)]
pub struct MySolver {
    pub nproc: usize,
    pub calls: u32,
}

impl Solver for MySolver {
    fn nproc(&self) -> usize {
        self.nproc
    }

    fn call(&self, _: &Path, _: &[&str], _: &Path) -> Result<(), KernelError> {
        Ok(())
    }

    fn forward(&self, _: &Path, _: &Path) -> Result<(), KernelError> {
        Ok(())
    }

    fn adjoint(&self, _: &Path, _: &Path) -> Result<(), KernelError> {
        Ok(())
    }

    fn load_model(&self, _: &Path, _: &str) -> Result<Model, KernelError> {
        Ok(Model::new())
    }

    fn save_model(&self, _: &Path, _: &Model, _: &str) -> Result<(), KernelError> {
        Ok(())
    }
}

impl Construct for MySolver {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        Ok(Self { nproc: config.require(Role::Solver, "NPROC")?, calls: 0 })
    }

    fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::parameter("NPROC").default(1),
            Requirement::path("MODEL_INIT").required().doc("initial model directory"),
        ]
    }
}

thread_local! {
    static STOP_DURING: RefCell<Option<(&'static str, StopHandle)>> = const { RefCell::new(None) };
}

/// Makes the next `task` on this thread request a stop through `handle`.
pub fn stop_during(task: &'static str, handle: &StopHandle) {
    STOP_DURING.with(|slot| *slot.borrow_mut() = Some((task, handle.clone())));
}

/// Counter workflow: `setup`, `tick`, `finish`, repeated `ITERATIONS` times.
#[seis_derive::component(role = "workflow", name = "basic", tasks(setup, tick, finish), jobs(touch))]
#[derive(Debug, Serialize, Deserialize)]
pub struct Basic {
    pub iteration: u32,
    pub iterations: u32,
    pub log: Vec<String>,
    pub checkpoint_after: Option<String>,
    pub fail_at: Option<String>,
}

impl Basic {
    fn enter(&mut self, task: &str) -> Result<(), KernelError> {
        if self.fail_at.as_deref() == Some(task) {
            return Err(KernelError::from("induced failure"));
        }
        STOP_DURING.with(|slot| {
            if let Some((_, handle)) = slot.borrow_mut().take_if(|(at, _)| *at == task) {
                handle.request();
            }
        });
        self.log.push(task.to_owned());
        Ok(())
    }

    fn setup(&mut self, session: &mut Session) -> Result<(), KernelError> {
        self.enter("setup")?;
        if session.config().path("SCRATCH").is_some() {
            session.submit(self, "touch", false)?;
        }
        Ok(())
    }

    fn tick(&mut self, _: &mut Session) -> Result<(), KernelError> {
        self.enter("tick")?;
        self.iteration += 1;
        Ok(())
    }

    fn finish(&mut self, _: &mut Session) -> Result<(), KernelError> {
        self.enter("finish")
    }

    /// Leaves `touch_<task>_<iteration>` in `SCRATCH`.
    fn touch(&mut self, ctx: &WorkerContext) -> Result<(), KernelError> {
        let scratch = ctx.config().require_path(Role::Workflow, "SCRATCH")?;
        let file = scratch.join(format!("touch_{}_{}", ctx.task_id(), self.iteration));
        fs::write(file, self.log.len().to_string()).map_err(KernelError::task)
    }
}

impl Workflow for Basic {
    fn checkpoint_after(&self, task: &str) -> bool {
        self.checkpoint_after.as_deref() == Some(task)
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
            log: Vec::new(),
            checkpoint_after: config.get("CHECKPOINT_AFTER")?,
            fail_at: config.get("FAIL_AT")?,
        })
    }

    fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::parameter("ITERATIONS").default(1),
            Requirement::parameter("CHECKPOINT_AFTER"),
            Requirement::parameter("FAIL_AT"),
        ]
    }
}

/// Probe always fails, as an implementation whose binary is missing would.
#[seis_derive::component(role = "preprocess", name = "missing_bin")]
#[derive(Debug, Serialize, Deserialize)]
pub struct MissingBin;

impl seis_kernel::contract::Preprocess for MissingBin {
    fn read(&self, _: &Path) -> Result<seis_kernel::domain::Trace, KernelError> {
        Err(KernelError::from("unreachable"))
    }

    fn write(&self, _: &seis_kernel::domain::Trace, _: &Path) -> Result<(), KernelError> {
        Ok(())
    }

    fn misfit(&self, _: &seis_kernel::domain::Trace, _: &seis_kernel::domain::Trace) -> Result<f64, KernelError> {
        Ok(0.0)
    }

    fn adjoint(
        &self,
        syn: &seis_kernel::domain::Trace,
        _: &seis_kernel::domain::Trace,
    ) -> Result<seis_kernel::domain::Trace, KernelError> {
        Ok(syn.clone())
    }
}

impl Construct for MissingBin {
    fn construct(_: &ConfigSnapshot) -> Result<Self, KernelError> {
        Ok(Self)
    }

    fn probe() -> Result<(), Cow<'static, str>> {
        Err("preproc binary not found on PATH".into())
    }
}

/// Claims the postprocess role without providing the capability.
#[derive(Debug, Serialize, Deserialize)]
pub struct Bare;

impl Describe for Bare {
    const ROLE: Role = Role::Postprocess;
    const NAME: &'static str = "bare";
    const TYPE_NAME: &'static str = "Bare";
}

impl Component for Bare {
    fn role(&self) -> Role {
        Self::ROLE
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn snapshot(&self) -> Result<Vec<u8>, KernelError> {
        seis_kernel::adapter::encode_state(self)
    }

    fn tasks(&self) -> &'static [&'static str] {
        &[]
    }

    fn jobs(&self) -> &'static [&'static str] {
        &[]
    }

    fn run_task(&mut self, _: &str, _: &mut Session) -> Option<Result<(), KernelError>> {
        None
    }

    fn run_job(&mut self, _: &str, _: &WorkerContext) -> Option<Result<(), KernelError>> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Construct for Bare {
    fn construct(_: &ConfigSnapshot) -> Result<Self, KernelError> {
        Ok(Self)
    }
}

pub fn catalog() -> Arc<Catalog> {
    let mut catalog = Catalog::new();
    catalog
        .register::<Inline>()
        .register::<MySolver>()
        .register::<Basic>()
        .register::<MissingBin>()
        .register::<Bare>()
        .register_factory(ComponentFactory::unavailable(
            Role::Optimize,
            "LBFGS",
            "LBFGS",
            "built without the `optimize` feature",
        ));
    Arc::new(catalog)
}

/// `{system: inline, solver: my_solver, workflow: basic}`, everything else unset.
pub fn scenario(root: &Path) -> ConfigSnapshot {
    ConfigSnapshot::new()
        .with_parameter("SYSTEM", "inline")
        .with_parameter("SOLVER", "my_solver")
        .with_parameter("WORKFLOW", "basic")
        .with_path("MODEL_INIT", root.join("model_init"))
}

pub fn basic(session: &Session) -> &Basic {
    session
        .registry()
        .get(Role::Workflow)
        .and_then(|c| c.downcast_ref::<Basic>())
        .expect("basic workflow is active")
}
