//! Backtracking line search.

use crate::error::OptimizeError;
use seis_domain::{Role, SearchStatus};
use seis_kernel::KernelError;
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::Step;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Sufficient-decrease constant of the Armijo test.
const ARMIJO: f64 = 1e-4;
/// Step length multiplier after a rejected trial.
const BACKTRACK: f64 = 0.5;

#[must_use]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[must_use]
pub fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

/// `origin + alpha * direction`.
#[must_use]
pub fn advance(origin: &[f64], alpha: f64, direction: &[f64]) -> Vec<f64> {
    origin.iter().zip(direction).map(|(m, d)| alpha.mul_add(*d, *m)).collect()
}

pub(crate) fn check_len(expected: usize, actual: usize) -> Result<(), OptimizeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(OptimizeError::Length { expected, actual, context: None })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// First trial moves the largest model value by this fraction.
    pub step_len_init: f64,
    /// Trials before the search gives up.
    pub step_count_max: u32,
}

impl SearchParams {
    pub(crate) fn from_config(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        let params = Self {
            step_len_init: config.require(Role::Optimize, "STEP_LEN_INIT")?,
            step_count_max: config.require(Role::Optimize, "STEP_COUNT_MAX")?,
        };
        if params.step_len_init <= 0.0 || params.step_count_max == 0 {
            return Err(KernelError::Validation {
                message: "STEP_LEN_INIT and STEP_COUNT_MAX must be positive".into(),
                context: None,
            });
        }
        Ok(params)
    }

    pub(crate) fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::parameter("STEP_LEN_INIT").default(0.05).doc("initial step as a model fraction"),
            Requirement::parameter("STEP_COUNT_MAX").default(10).doc("trial steps per line search"),
        ]
    }

    /// Step length of a first trial along `direction` from `origin`.
    pub(crate) fn initial_alpha(&self, origin: &[f64], direction: &[f64]) -> f64 {
        let scale = inf_norm(origin).max(1.0);
        let reach = inf_norm(direction);
        if reach > 0.0 { self.step_len_init * scale / reach } else { 0.0 }
    }
}

/// One search along a fixed direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSearch {
    pub origin: Vec<f64>,
    pub value: f64,
    pub direction: Vec<f64>,
    /// Directional derivative at the origin; negative for a descent direction.
    pub slope: f64,
    pub alpha: f64,
    pub trials: u32,
}

impl LineSearch {
    pub(crate) fn start(origin: &[f64], value: f64, gradient: &[f64], direction: Vec<f64>, alpha: f64) -> Self {
        let slope = dot(gradient, &direction);
        Self { origin: origin.to_vec(), value, direction, slope, alpha, trials: 0 }
    }

    #[must_use]
    pub fn trial(&self) -> Vec<f64> {
        advance(&self.origin, self.alpha, &self.direction)
    }

    /// The first trial point.
    pub(crate) fn first_step(&self) -> Step {
        Step { point: self.trial(), status: SearchStatus::Continue }
    }

    /// Judges the objective `value` of the current trial. Consumes the search on pass or
    /// failure.
    pub(crate) fn judge(search: &mut Option<Self>, value: f64, params: &SearchParams) -> Result<Step, OptimizeError> {
        let current = search.as_mut().ok_or(OptimizeError::NoSearch { context: None })?;
        current.trials += 1;

        if value <= (ARMIJO * current.alpha).mul_add(current.slope, current.value) {
            info!(trials = current.trials, alpha = current.alpha, value, "Line search passed");
            let point = current.trial();
            *search = None;
            return Ok(Step { point, status: SearchStatus::Pass });
        }

        if current.trials >= params.step_count_max {
            warn!(trials = current.trials, "Line search failed");
            let point = current.origin.clone();
            *search = None;
            return Ok(Step { point, status: SearchStatus::Fail });
        }

        current.alpha *= BACKTRACK;
        debug!(trials = current.trials, alpha = current.alpha, value, "Backtracking");
        Ok(Step { point: current.trial(), status: SearchStatus::Continue })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: SearchParams = SearchParams { step_len_init: 0.1, step_count_max: 3 };

    #[test]
    fn accepts_sufficient_decrease() {
        // f(x) = x^2 from x = 1 along -f'(1) = -2.
        let mut search = Some(LineSearch::start(&[1.0], 1.0, &[2.0], vec![-2.0], 0.25));
        assert_eq!(search.as_ref().unwrap().trial(), [0.5]);
        let step = LineSearch::judge(&mut search, 0.25, &PARAMS).unwrap();
        assert_eq!(step.status, SearchStatus::Pass);
        assert_eq!(step.point, [0.5]);
        assert!(search.is_none());
    }

    #[test]
    fn backtracks_then_fails() {
        let mut search = Some(LineSearch::start(&[1.0], 1.0, &[2.0], vec![-2.0], 1.0));
        let step = LineSearch::judge(&mut search, 1.0, &PARAMS).unwrap();
        assert_eq!((step.status, step.point), (SearchStatus::Continue, vec![0.0]));
        LineSearch::judge(&mut search, 5.0, &PARAMS).unwrap();
        let step = LineSearch::judge(&mut search, 5.0, &PARAMS).unwrap();
        assert_eq!((step.status, step.point), (SearchStatus::Fail, vec![1.0]));
        assert!(LineSearch::judge(&mut search, 0.0, &PARAMS).is_err());
    }

    #[test]
    fn first_trial_scales_to_the_model() {
        assert!((PARAMS.initial_alpha(&[4.0, -2.0], &[0.0, 8.0]) - 0.05).abs() < 1e-12);
        assert!((PARAMS.initial_alpha(&[0.1], &[2.0]) - 0.05).abs() < 1e-12);
        assert!(PARAMS.initial_alpha(&[1.0], &[0.0]).abs() < f64::EPSILON);
    }
}
