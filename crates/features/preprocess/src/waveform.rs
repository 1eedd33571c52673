use crate::error::{PreprocessError, PreprocessErrorExt};
use seis_domain::{Role, Trace};
use seis_kernel::component::Construct;
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::Preprocess;
use seis_kernel::KernelError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Relative tolerance when comparing sampling intervals.
const DELTA_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Misfit {
    /// Half the squared L2 norm of the residual, integrated over time.
    Waveform,
    /// Same norm on residuals normalised by the observed peak amplitude.
    NormalizedWaveform,
}

impl Misfit {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "waveform" => Some(Self::Waveform),
            "normalized_waveform" => Some(Self::NormalizedWaveform),
            _ => None,
        }
    }
}

/// Two-column ASCII records (`time value` per line) with waveform misfits.
#[seis_derive::component(role = "preprocess", name = "default", type_name = "Default")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waveform {
    misfit: Misfit,
}

impl Waveform {
    #[must_use]
    pub const fn new(misfit: Misfit) -> Self {
        Self { misfit }
    }

    fn check_comparable(syn: &Trace, obs: &Trace) -> Result<(), PreprocessError> {
        if syn.len() != obs.len() {
            return Err(PreprocessError::Mismatch {
                message: format!("{} synthetic samples, {} observed", syn.len(), obs.len()).into(),
                context: None,
            });
        }
        if (syn.delta - obs.delta).abs() > DELTA_TOLERANCE * syn.delta.abs().max(f64::MIN_POSITIVE) {
            return Err(PreprocessError::Mismatch {
                message: format!("sampling {} vs {}", syn.delta, obs.delta).into(),
                context: None,
            });
        }
        Ok(())
    }

    fn scale(&self, obs: &Trace) -> f64 {
        match self.misfit {
            Misfit::Waveform => 1.0,
            Misfit::NormalizedWaveform => {
                let peak = obs.samples.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
                if peak > 0.0 { peak.recip() } else { 1.0 }
            },
        }
    }
}

fn parse_line(path: &Path, index: usize, line: &str) -> Result<Option<(f64, f64)>, PreprocessError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let malformed = |message: String| PreprocessError::Parse {
        path: path.to_path_buf(),
        line: index + 1,
        message: message.into(),
        context: None,
    };
    let mut columns = line.split_whitespace().map(str::parse::<f64>);
    match (columns.next(), columns.next(), columns.next()) {
        (Some(Ok(time)), Some(Ok(value)), None) => Ok(Some((time, value))),
        (Some(Err(err)), ..) | (_, Some(Err(err)), _) => Err(malformed(err.to_string())),
        _ => Err(malformed("expected two columns".to_owned())),
    }
}

impl Preprocess for Waveform {
    fn read(&self, path: &Path) -> Result<Trace, KernelError> {
        let text = fs::read_to_string(path).context(format!("Reading {}", path.display()))?;
        let mut times = Vec::new();
        let mut samples = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if let Some((time, value)) = parse_line(path, index, line)? {
                times.push(time);
                samples.push(value);
            }
        }
        let Some(&start) = times.first() else {
            return Err(PreprocessError::Parse {
                path: path.to_path_buf(),
                line: 0,
                message: "record holds no samples".into(),
                context: None,
            }
            .into());
        };
        let delta = times.get(1).map_or(0.0, |second| second - start);
        debug!(path = %path.display(), samples = samples.len(), delta, "Record read");
        Ok(Trace::new(start, delta, samples))
    }

    fn write(&self, trace: &Trace, path: &Path) -> Result<(), KernelError> {
        let text: String = trace
            .times()
            .zip(&trace.samples)
            .map(|(time, value)| format!("{time:.6} {value:.9e}\n"))
            .collect();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(format!("Creating {}", parent.display()))?;
        }
        fs::write(path, text).context(format!("Writing {}", path.display()))?;
        Ok(())
    }

    fn misfit(&self, syn: &Trace, obs: &Trace) -> Result<f64, KernelError> {
        Self::check_comparable(syn, obs)?;
        let scale = self.scale(obs);
        let sum: f64 = syn
            .samples
            .iter()
            .zip(&obs.samples)
            .map(|(s, o)| ((s - o) * scale).powi(2))
            .sum();
        Ok(0.5 * sum * syn.delta)
    }

    /// Derivative of [`Preprocess::misfit`] with respect to each synthetic sample.
    fn adjoint(&self, syn: &Trace, obs: &Trace) -> Result<Trace, KernelError> {
        Self::check_comparable(syn, obs)?;
        let scale = self.scale(obs).powi(2) * syn.delta;
        let samples = syn.samples.iter().zip(&obs.samples).map(|(s, o)| (s - o) * scale).collect();
        Ok(Trace::new(syn.start, syn.delta, samples))
    }
}

impl Construct for Waveform {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        let name: String = config.require(Role::Preprocess, "MISFIT")?;
        let misfit = Misfit::parse(&name).ok_or_else(|| KernelError::Validation {
            message: format!("MISFIT '{name}' is not one of waveform, normalized_waveform").into(),
            context: None,
        })?;
        Ok(Self::new(misfit))
    }

    fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::parameter("MISFIT").default("waveform").doc("misfit function"),
            Requirement::path("OBS").doc("observed records"),
        ]
    }
}
