#![allow(dead_code, unreachable_pub)]

use seis_kernel::component::Construct;
use seis_kernel::config::ConfigSnapshot;
use seis_kernel::contract::Solver;
use seis_kernel::domain::Model;
use seis_kernel::{Catalog, KernelError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Synthetics equal the model: sample `i` of `traces/syn/rec.txt` is model value `i`.
/// The adjoint run turns `traces/adj/rec.txt` back into a `_kernel` model, which makes
/// the gradient of the waveform misfit exact.
#[seis_derive::component(role = "solver", name = "identity")]
#[derive(Debug, Serialize, Deserialize)]
pub struct Identity;

fn io(err: impl std::error::Error + Send + Sync + 'static) -> KernelError {
    KernelError::task(err)
}

fn write_record(path: &Path, values: &[f64]) -> Result<(), KernelError> {
    let text: String = values.iter().enumerate().map(|(i, v)| format!("{i}.0 {v:e}\n")).collect();
    fs::create_dir_all(path.parent().unwrap()).map_err(io)?;
    fs::write(path, text).map_err(io)
}

fn read_record(path: &Path) -> Result<Vec<f64>, KernelError> {
    let text = fs::read_to_string(path).map_err(io)?;
    Ok(text
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|value| value.parse::<f64>().unwrap())
        .collect())
}

impl Solver for Identity {
    fn nproc(&self) -> usize {
        1
    }

    fn call(&self, _: &Path, _: &[&str], _: &Path) -> Result<(), KernelError> {
        Ok(())
    }

    fn forward(&self, model_dir: &Path, workdir: &Path) -> Result<(), KernelError> {
        let model = self.load_model(model_dir, "")?;
        write_record(&workdir.join("traces/syn/rec.txt"), &model.to_vector())
    }

    fn adjoint(&self, model_dir: &Path, workdir: &Path) -> Result<(), KernelError> {
        let model = self.load_model(model_dir, "")?;
        let adjoint = read_record(&workdir.join("traces/adj/rec.txt"))?;
        let kernel = model.with_vector(&adjoint).ok_or("adjoint source has the wrong length")?;
        self.save_model(workdir, &kernel, "_kernel")
    }

    fn load_model(&self, dir: &Path, suffix: &str) -> Result<Model, KernelError> {
        let text = fs::read_to_string(dir.join(format!("model{suffix}.json"))).map_err(io)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save_model(&self, dir: &Path, model: &Model, suffix: &str) -> Result<(), KernelError> {
        fs::create_dir_all(dir).map_err(io)?;
        fs::write(dir.join(format!("model{suffix}.json")), serde_json::to_string(model)?).map_err(io)
    }
}

impl Construct for Identity {
    fn construct(_: &ConfigSnapshot) -> Result<Self, KernelError> {
        Ok(Self)
    }
}

pub fn catalog() -> Arc<Catalog> {
    let mut catalog = Catalog::new();
    seis_system::register(&mut catalog);
    seis_preprocess::register(&mut catalog);
    seis_postprocess::register(&mut catalog);
    seis_optimize::register(&mut catalog);
    seis_workflow::register(&mut catalog);
    catalog.register::<Identity>();
    Arc::new(catalog)
}

pub const OBSERVED: [f64; 3] = [1.0, 2.0, -1.0];

/// Two sources observing [`OBSERVED`], starting from a zero model.
pub fn inversion(root: &Path, end: u32) -> ConfigSnapshot {
    let mut model = Model::new();
    model.insert("vp", vec![vec![0.0; OBSERVED.len()]]);
    Identity.save_model(&root.join("model_init"), &model, "").unwrap();
    for source in ["000", "001"] {
        write_record(&root.join("obs").join(source).join("rec.txt"), &OBSERVED).unwrap();
    }

    ConfigSnapshot::new()
        .with_parameter("SYSTEM", "local")
        .with_parameter("NTASK", 2)
        .with_parameter("NPROC", 2)
        .with_parameter("PREPROCESS", "default")
        .with_parameter("SOLVER", "identity")
        .with_parameter("POSTPROCESS", "base")
        .with_parameter("OPTIMIZE", "LBFGS")
        .with_parameter("WORKFLOW", "inversion")
        .with_parameter("END", end)
        .with_path("MODEL_INIT", root.join("model_init"))
        .with_path("OBS", root.join("obs"))
        .with_path("SCRATCH", root.join("scratch"))
        .with_path("OUTPUT", root.join("output"))
        .with_path("LOG", root.join("logs"))
}
