use crate::error::{SolverError, SolverErrorExt};
use crate::fortran::{read_slice, slice_path, write_slice};
use seis_domain::{Model, Role};
use seis_kernel::component::Construct;
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::Solver;
use seis_kernel::KernelError;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Solver output lands here, inside the working directory of each call.
const SOLVER_LOG: &str = "solver.log";
/// Name the parameter file is copied to before each simulation.
const PAR_FILE_NAME: &str = "Par_file";

/// Spectral-element solver driven through a single executable.
///
/// `forward` runs `SOLVER_BIN forward <model_dir>` and `adjoint` runs
/// `SOLVER_BIN adjoint <model_dir>`, each inside its working directory with the
/// configured parameter file copied next to it.
#[seis_derive::component(role = "solver", name = "specfem")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specfem {
    executable: PathBuf,
    par_file: Option<PathBuf>,
    nproc: usize,
    materials: Vec<String>,
}

impl Specfem {
    #[must_use]
    pub const fn new(executable: PathBuf, nproc: usize, materials: Vec<String>) -> Self {
        Self { executable, par_file: None, nproc, materials }
    }

    #[must_use]
    pub fn materials(&self) -> &[String] {
        &self.materials
    }

    fn simulate(&self, mode: &str, model_dir: &Path, workdir: &Path) -> Result<(), KernelError> {
        fs::create_dir_all(workdir).context(format!("Creating {}", workdir.display()))?;
        if let Some(par_file) = &self.par_file {
            fs::copy(par_file, workdir.join(PAR_FILE_NAME))
                .context(format!("Copying {}", par_file.display()))?;
        }
        let model = model_dir.to_string_lossy();
        self.call(&self.executable, &[mode, &model], workdir)
    }
}

impl Solver for Specfem {
    fn nproc(&self) -> usize {
        self.nproc
    }

    fn call(&self, executable: &Path, args: &[&str], workdir: &Path) -> Result<(), KernelError> {
        fs::create_dir_all(workdir).context(format!("Creating {}", workdir.display()))?;
        let log_path = workdir.join(SOLVER_LOG);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .context(format!("Opening {}", log_path.display()))?;
        let err_log = log.try_clone().context("Duplicating solver log handle")?;

        debug!(executable = %executable.display(), ?args, workdir = %workdir.display(), "Calling solver");
        let status = Command::new(executable)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(err_log)
            .status()
            .context(format!("Spawning {}", executable.display()))?;

        if status.success() {
            return Ok(());
        }
        warn!(executable = %executable.display(), %status, log = %log_path.display(), "Solver failed");
        Err(SolverError::Exit {
            executable: executable.to_path_buf(),
            status: status.to_string().into(),
            context: Some(format!("see {}", log_path.display()).into()),
        }
        .into())
    }

    fn forward(&self, model_dir: &Path, workdir: &Path) -> Result<(), KernelError> {
        info!(model = %model_dir.display(), "Forward simulation");
        self.simulate("forward", model_dir, workdir)
    }

    fn adjoint(&self, model_dir: &Path, workdir: &Path) -> Result<(), KernelError> {
        info!(model = %model_dir.display(), "Adjoint simulation");
        self.simulate("adjoint", model_dir, workdir)
    }

    fn load_model(&self, dir: &Path, suffix: &str) -> Result<Model, KernelError> {
        let mut model = Model::new();
        for key in &self.materials {
            let slices = (0..self.nproc)
                .map(|iproc| read_slice(&slice_path(dir, iproc, key, suffix)))
                .collect::<Result<Vec<_>, _>>()?;
            model.insert(key.clone(), slices);
        }
        debug!(dir = %dir.display(), values = model.len(), "Model loaded");
        Ok(model)
    }

    fn save_model(&self, dir: &Path, model: &Model, suffix: &str) -> Result<(), KernelError> {
        fs::create_dir_all(dir).context(format!("Creating {}", dir.display()))?;
        for key in model.keys() {
            for (iproc, values) in model.get(key).unwrap_or_default().iter().enumerate() {
                write_slice(&slice_path(dir, iproc, key, suffix), values)?;
            }
        }
        Ok(())
    }
}

impl Construct for Specfem {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        let executable = config.require_path(Role::Solver, "SOLVER_BIN")?.to_path_buf();
        let nproc: usize = config.require(Role::Solver, "NPROC")?;
        let materials: Vec<String> = config.require(Role::Solver, "MATERIALS")?;
        if materials.is_empty() {
            return Err(KernelError::Validation {
                message: "MATERIALS must name at least one parameter".into(),
                context: None,
            });
        }
        let par_file = config.path("SOLVER_PAR").map(Path::to_path_buf);
        Ok(Self { par_file, ..Self::new(executable, nproc, materials) })
    }

    fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::path("SOLVER_BIN").required().doc("solver executable"),
            Requirement::path("SOLVER_PAR").doc("parameter file copied into each working directory"),
            Requirement::parameter("NPROC").default(1).doc("processor slices per model"),
            Requirement::parameter("MATERIALS").default(vec!["vp", "vs"]).doc("model parameters"),
        ]
    }
}
