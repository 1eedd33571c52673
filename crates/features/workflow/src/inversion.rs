use crate::error::{WorkflowError, WorkflowErrorExt};
use seis_domain::constants::{CHECKPOINT_PATH, OUTPUT_DIR, SCRATCH_DIR};
use seis_domain::{Model, Role, SearchStatus};
use seis_kernel::component::Construct;
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::{Preprocess, WorkerContext, Workflow};
use seis_kernel::{KernelError, Session};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Misfit of one source, written by the `evaluate` job next to its synthetics.
const RESIDUALS: &str = "residuals";
/// Suffix of gradient slices.
const KERNEL_SUFFIX: &str = "_kernel";

/// Iterative model update driven by misfit gradients.
///
/// Each source `i` of a job works in `SCRATCH/solver/{i:03}`. The solver leaves synthetics
/// in `traces/syn/` there; observations with the same file names are read from
/// `OBS/{i:03}/` and adjoint sources are written to `traces/adj/`. The adjoint run is
/// expected to leave `_kernel` slices in the same directory.
#[seis_derive::component(
    role = "workflow",
    name = "inversion",
    tasks(
        evaluate_initial_misfit,
        run_adjoint,
        evaluate_gradient,
        initialize_line_search,
        perform_line_search,
        finalize_iteration
    ),
    jobs(evaluate, adjoint)
)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inversion {
    iteration: u32,
    begin: u32,
    end: u32,
    model_init: PathBuf,
    obs: PathBuf,
    scratch: PathBuf,
    output: PathBuf,
    /// Model the next `evaluate` job runs on.
    eval_model: PathBuf,
    /// Misfit of the current model, once known.
    value: Option<f64>,
    /// Misfit of every finished iteration.
    history: Vec<f64>,
    /// The optimizer was restarted during this iteration's line search.
    restarted: bool,
    checkpoint: bool,
}

fn source_name(source: usize) -> String {
    format!("{source:03}")
}

fn output_error(path: &Path, message: impl Into<std::borrow::Cow<'static, str>>) -> WorkflowError {
    WorkflowError::Output { path: path.to_path_buf(), message: message.into(), context: None }
}

/// Misfit over every synthetic record in `workdir`; writes the matching adjoint sources.
fn residuals(preprocess: &dyn Preprocess, workdir: &Path, obs_dir: &Path) -> Result<f64, KernelError> {
    let syn_dir = workdir.join("traces").join("syn");
    let adj_dir = workdir.join("traces").join("adj");
    fs::create_dir_all(&adj_dir).context(format!("Creating {}", adj_dir.display()))?;

    let mut names: Vec<_> = fs::read_dir(&syn_dir)
        .context(format!("Listing {}", syn_dir.display()))?
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name())
        .collect();
    if names.is_empty() {
        return Err(output_error(&syn_dir, "no synthetic records").into());
    }
    names.sort();

    let mut total = 0.0;
    for name in names {
        let syn = preprocess.read(&syn_dir.join(&name))?;
        let obs = preprocess.read(&obs_dir.join(&name))?;
        total += preprocess.misfit(&syn, &obs)?;
        preprocess.write(&preprocess.adjoint(&syn, &obs)?, &adj_dir.join(&name))?;
    }
    Ok(total)
}

impl Inversion {
    #[must_use]
    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Misfit at the end of each finished iteration.
    #[must_use]
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    fn current_model(&self) -> PathBuf {
        self.scratch.join("model")
    }

    fn trial_model(&self) -> PathBuf {
        self.scratch.join("trial")
    }

    fn gradient_dir(&self) -> PathBuf {
        self.scratch.join("gradient")
    }

    fn source_dir(&self, source: usize) -> PathBuf {
        self.scratch.join("solver").join(source_name(source))
    }

    fn copy_model(session: &Session, from: &Path, to: &Path) -> Result<Model, KernelError> {
        let solver = session.require_solver()?;
        let model = solver.load_model(from, "")?;
        solver.save_model(to, &model, "")?;
        Ok(model)
    }

    fn write_trial(&self, session: &Session, shape: &Model, point: &[f64]) -> Result<(), KernelError> {
        let trial = shape
            .with_vector(point)
            .ok_or_else(|| WorkflowError::from(format!("trial has {} values, model {}", point.len(), shape.len())))?;
        session.require_solver()?.save_model(&self.trial_model(), &trial, "")
    }

    /// Runs `evaluate` on `model` for every source and sums the misfits.
    fn evaluate_misfit(&mut self, session: &Session, model: PathBuf) -> Result<f64, KernelError> {
        self.eval_model = model;
        session.submit(self, "evaluate", false)?;

        let ntask = session.require_system()?.ntask();
        let mut total = 0.0;
        for source in 0..ntask {
            let path = self.source_dir(source).join(RESIDUALS);
            let text = fs::read_to_string(&path).map_err(|err| output_error(&path, err.to_string()))?;
            total += text
                .trim()
                .parse::<f64>()
                .map_err(|err| output_error(&path, err.to_string()))?;
        }
        Ok(total)
    }

    /// Starts a line search from the current model along the saved gradient.
    fn start_search(&self, session: &mut Session) -> Result<(), KernelError> {
        let value = self.value.ok_or("no misfit for the current model")?;
        let (model, gradient) = {
            let solver = session.require_solver()?;
            (solver.load_model(&self.current_model(), "")?, solver.load_model(&self.gradient_dir(), KERNEL_SUFFIX)?)
        };
        let step = session.require_optimize_mut()?.step(&model.to_vector(), value, Some(&gradient.to_vector()))?;
        self.write_trial(session, &model, &step.point)
    }

    fn evaluate_initial_misfit(&mut self, session: &mut Session) -> Result<(), KernelError> {
        if self.iteration == self.begin && self.value.is_none() {
            Self::copy_model(session, &self.model_init, &self.current_model())?;
        }
        if let Some(value) = self.value {
            debug!(value, "Misfit known from the line search");
            return Ok(());
        }
        let value = self.evaluate_misfit(session, self.current_model())?;
        info!(iteration = self.iteration, value, "Initial misfit");
        self.value = Some(value);
        Ok(())
    }

    fn run_adjoint(&mut self, session: &mut Session) -> Result<(), KernelError> {
        self.eval_model = self.current_model();
        session.submit(self, "adjoint", false)?;
        Ok(())
    }

    /// Combines the per-source kernels into the gradient.
    fn evaluate_gradient(&mut self, session: &mut Session) -> Result<(), KernelError> {
        let ntask = session.require_system()?.ntask();
        let solver = session.require_solver()?;
        let partials = (0..ntask)
            .map(|source| solver.load_model(&self.source_dir(source), KERNEL_SUFFIX))
            .collect::<Result<Vec<_>, _>>()?;
        let gradient = session.require_postprocess()?.combine(&partials)?;
        solver.save_model(&self.gradient_dir(), &gradient, KERNEL_SUFFIX)?;
        debug!(sources = ntask, values = gradient.len(), "Gradient written");
        Ok(())
    }

    fn initialize_line_search(&mut self, session: &mut Session) -> Result<(), KernelError> {
        self.restarted = false;
        self.start_search(session)
    }

    /// Evaluates trial models until the optimizer accepts one. A failed search restarts
    /// the optimizer once per iteration.
    fn perform_line_search(&mut self, session: &mut Session) -> Result<(), KernelError> {
        let shape = session.require_solver()?.load_model(&self.current_model(), "")?;
        loop {
            let trial = session.require_solver()?.load_model(&self.trial_model(), "")?;
            let value = self.evaluate_misfit(session, self.trial_model())?;
            let step = session.require_optimize_mut()?.step(&trial.to_vector(), value, None)?;

            match step.status {
                SearchStatus::Continue => self.write_trial(session, &shape, &step.point)?,
                SearchStatus::Pass => {
                    info!(iteration = self.iteration, value, "Trial model accepted");
                    Self::copy_model(session, &self.trial_model(), &self.current_model())?;
                    self.value = Some(value);
                    return Ok(());
                },
                SearchStatus::Fail if self.restarted => {
                    return Err(WorkflowError::LineSearch { iteration: self.iteration, context: None }.into());
                },
                SearchStatus::Fail => {
                    warn!(iteration = self.iteration, "Line search failed; restarting the optimizer");
                    session.require_optimize_mut()?.restart();
                    self.restarted = true;
                    self.start_search(session)?;
                },
            }
        }
    }

    /// Keeps a copy of the accepted model and moves to the next iteration.
    fn finalize_iteration(&mut self, session: &mut Session) -> Result<(), KernelError> {
        let value = self.value.ok_or("iteration finished without a misfit")?;
        let kept = self.output.join(format!("model_{:04}", self.iteration));
        Self::copy_model(session, &self.current_model(), &kept)?;
        info!(iteration = self.iteration, value, dir = %kept.display(), "Iteration finished");
        self.history.push(value);
        self.iteration += 1;
        Ok(())
    }

    /// Forward simulation and misfit for one source.
    fn evaluate(&mut self, ctx: &WorkerContext) -> Result<(), KernelError> {
        let source = ctx.task_id();
        let workdir = self.source_dir(source);
        let solver = ctx.require(Role::Solver)?;
        let preprocess = ctx.require(Role::Preprocess)?;

        solver.require_solver()?.forward(&self.eval_model, &workdir)?;
        let misfit = residuals(preprocess.require_preprocess()?, &workdir, &self.obs.join(source_name(source)))?;
        let path = workdir.join(RESIDUALS);
        fs::write(&path, misfit.to_string()).context(format!("Writing {}", path.display()))?;
        debug!(source, misfit, "Source evaluated");
        Ok(())
    }

    /// Adjoint simulation for one source, driven by the adjoint sources `evaluate` wrote.
    fn adjoint(&mut self, ctx: &WorkerContext) -> Result<(), KernelError> {
        let workdir = self.source_dir(ctx.task_id());
        ctx.require(Role::Solver)?.require_solver()?.adjoint(&self.eval_model, &workdir)
    }
}

impl Workflow for Inversion {
    fn checkpoint_after(&self, task: &str) -> bool {
        self.checkpoint && task == "finalize_iteration"
    }

    fn repeat(&self) -> bool {
        self.iteration <= self.end
    }
}

impl Construct for Inversion {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        let begin: u32 = config.require(Role::Workflow, "BEGIN")?;
        let end: u32 = config.require(Role::Workflow, "END")?;
        if begin == 0 || end < begin {
            return Err(KernelError::Validation {
                message: format!("BEGIN ({begin}) and END ({end}) must satisfy 1 <= BEGIN <= END").into(),
                context: None,
            });
        }
        let scratch = config.require_path(Role::Workflow, "SCRATCH")?.to_path_buf();
        Ok(Self {
            iteration: begin,
            begin,
            end,
            model_init: config.require_path(Role::Workflow, "MODEL_INIT")?.to_path_buf(),
            obs: config.require_path(Role::Workflow, "OBS")?.to_path_buf(),
            eval_model: scratch.join("model"),
            scratch,
            output: config.require_path(Role::Workflow, "OUTPUT")?.to_path_buf(),
            value: None,
            history: Vec::new(),
            restarted: false,
            checkpoint: config.path(CHECKPOINT_PATH).is_some(),
        })
    }

    fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::parameter("BEGIN").default(1).doc("first iteration"),
            Requirement::parameter("END").default(1).doc("last iteration"),
            Requirement::path("MODEL_INIT").required().doc("initial model directory"),
            Requirement::path("OBS").required().doc("observed records, one directory per source"),
            Requirement::path("SCRATCH").default(SCRATCH_DIR),
            Requirement::path("OUTPUT").default(OUTPUT_DIR),
        ]
    }
}
