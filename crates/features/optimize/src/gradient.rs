use crate::search::{LineSearch, SearchParams, check_len};
use seis_kernel::component::Construct;
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::{Optimize, Step};
use seis_kernel::KernelError;
use serde::{Deserialize, Serialize};

/// Steepest descent.
#[seis_derive::component(role = "optimize", name = "gradient")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gradient {
    params: SearchParams,
    search: Option<LineSearch>,
}

impl Gradient {
    #[must_use]
    pub const fn new(params: SearchParams) -> Self {
        Self { params, search: None }
    }

    #[must_use]
    pub const fn search(&self) -> Option<&LineSearch> {
        self.search.as_ref()
    }
}

impl Optimize for Gradient {
    fn step(&mut self, point: &[f64], value: f64, gradient: Option<&[f64]>) -> Result<Step, KernelError> {
        let Some(gradient) = gradient else {
            if let Some(search) = &self.search {
                check_len(search.origin.len(), point.len())?;
            }
            return Ok(LineSearch::judge(&mut self.search, value, &self.params)?);
        };

        check_len(point.len(), gradient.len())?;
        let direction: Vec<f64> = gradient.iter().map(|g| -g).collect();
        let alpha = self.params.initial_alpha(point, &direction);
        let search = LineSearch::start(point, value, gradient, direction, alpha);
        let step = search.first_step();
        self.search = Some(search);
        Ok(step)
    }

    fn restart(&mut self) {
        self.search = None;
    }
}

impl Construct for Gradient {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        Ok(Self::new(SearchParams::from_config(config)?))
    }

    fn requirements() -> Vec<Requirement> {
        SearchParams::requirements()
    }
}
