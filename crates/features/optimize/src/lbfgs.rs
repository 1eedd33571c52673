use crate::search::{LineSearch, SearchParams, check_len, dot};
use seis_domain::Role;
use seis_kernel::component::Construct;
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::{Optimize, Step};
use seis_kernel::KernelError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Curvature pairs with `s·y` below this are skipped.
const MIN_CURVATURE: f64 = 1e-12;

/// Limited-memory BFGS directions.
#[seis_derive::component(role = "optimize", name = "LBFGS", type_name = "LBFGS")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lbfgs {
    params: SearchParams,
    memory: usize,
    /// `(s, y)` pairs, oldest first.
    history: VecDeque<(Vec<f64>, Vec<f64>)>,
    /// Last accepted point and its gradient.
    previous: Option<(Vec<f64>, Vec<f64>)>,
    search: Option<LineSearch>,
}

impl Lbfgs {
    #[must_use]
    pub const fn new(params: SearchParams, memory: usize) -> Self {
        Self { params, memory, history: VecDeque::new(), previous: None, search: None }
    }

    /// Stored curvature pairs.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    fn remember(&mut self, point: &[f64], gradient: &[f64]) {
        if let Some((m, g)) = self.previous.take() {
            let s: Vec<f64> = point.iter().zip(&m).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = gradient.iter().zip(&g).map(|(a, b)| a - b).collect();
            if dot(&s, &y) > MIN_CURVATURE {
                if self.history.len() == self.memory {
                    self.history.pop_front();
                }
                self.history.push_back((s, y));
            } else {
                debug!("Curvature pair skipped");
            }
        }
        self.previous = Some((point.to_vec(), gradient.to_vec()));
    }

    /// Two-loop recursion: `-H g` with `H` built from the history.
    fn direction(&self, gradient: &[f64]) -> Vec<f64> {
        let mut q = gradient.to_vec();
        let mut alphas = Vec::with_capacity(self.history.len());
        for (s, y) in self.history.iter().rev() {
            let rho = dot(y, s).recip();
            let a = rho * dot(s, &q);
            q.iter_mut().zip(y).for_each(|(qi, yi)| *qi -= a * yi);
            alphas.push((rho, a));
        }

        if let Some((s, y)) = self.history.back() {
            let gamma = dot(s, y) / dot(y, y);
            q.iter_mut().for_each(|qi| *qi *= gamma);
        }

        for ((s, y), (rho, a)) in self.history.iter().zip(alphas.into_iter().rev()) {
            let b = rho * dot(y, &q);
            q.iter_mut().zip(s).for_each(|(ri, si)| *ri += si * (a - b));
        }
        q.iter().map(|r| -r).collect()
    }
}

impl Optimize for Lbfgs {
    fn step(&mut self, point: &[f64], value: f64, gradient: Option<&[f64]>) -> Result<Step, KernelError> {
        let Some(gradient) = gradient else {
            if let Some(search) = &self.search {
                check_len(search.origin.len(), point.len())?;
            }
            return Ok(LineSearch::judge(&mut self.search, value, &self.params)?);
        };

        check_len(point.len(), gradient.len())?;
        if let Some((m, _)) = &self.previous {
            check_len(m.len(), point.len())?;
        }
        self.remember(point, gradient);

        let mut direction = self.direction(gradient);
        if dot(gradient, &direction) >= 0.0 {
            warn!("Not a descent direction; restarting from steepest descent");
            self.history.clear();
            direction = gradient.iter().map(|g| -g).collect();
        }

        let alpha = if self.history.is_empty() { self.params.initial_alpha(point, &direction) } else { 1.0 };
        let search = LineSearch::start(point, value, gradient, direction, alpha);
        let step = search.first_step();
        self.search = Some(search);
        Ok(step)
    }

    fn restart(&mut self) {
        self.history.clear();
        self.previous = None;
        self.search = None;
    }
}

impl Construct for Lbfgs {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        let memory: usize = config.require(Role::Optimize, "LBFGS_MEM")?;
        Ok(Self::new(SearchParams::from_config(config)?, memory.max(1)))
    }

    fn requirements() -> Vec<Requirement> {
        let mut requirements = SearchParams::requirements();
        requirements.push(Requirement::parameter("LBFGS_MEM").default(5).doc("curvature pairs kept"));
        requirements
    }
}
