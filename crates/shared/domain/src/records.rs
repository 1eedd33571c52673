use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An evenly sampled waveform record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Time of the first sample, in seconds.
    pub start: f64,
    /// Sampling interval, in seconds.
    pub delta: f64,
    pub samples: Vec<f64>,
}

impl Trace {
    #[must_use]
    pub const fn new(start: f64, delta: f64, samples: Vec<f64>) -> Self {
        Self { start, delta, samples }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample times, derived from `start` and `delta`.
    #[allow(clippy::cast_precision_loss)]
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.samples.len()).map(|i| self.delta.mul_add(i as f64, self.start))
    }
}

/// Model parameters split into per-processor slices, keyed by material name (`vp`, `vs`, ...).
///
/// The flattened vector form used by optimization walks keys in sorted order and,
/// within a key, slices in processor order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    slices: BTreeMap<String, Vec<Vec<f32>>>,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, slices: Vec<Vec<f32>>) {
        self.slices.insert(key.into(), slices);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[Vec<f32>]> {
        self.slices.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    /// Number of processor slices of the first key; every key is expected to agree.
    #[must_use]
    pub fn nproc(&self) -> usize {
        self.slices.values().next().map_or(0, Vec::len)
    }

    /// Total number of values across keys and slices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.values().flatten().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn to_vector(&self) -> Vec<f64> {
        self.slices.values().flatten().flatten().map(|v| f64::from(*v)).collect()
    }

    /// A model of the same shape holding `values`; `None` when the lengths differ.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_vector(&self, values: &[f64]) -> Option<Self> {
        if values.len() != self.len() {
            return None;
        }
        let mut rest = values;
        let mut slices = BTreeMap::new();
        for (key, procs) in &self.slices {
            let mut reshaped = Vec::with_capacity(procs.len());
            for proc in procs {
                let (head, tail) = rest.split_at(proc.len());
                reshaped.push(head.iter().map(|v| *v as f32).collect());
                rest = tail;
            }
            slices.insert(key.clone(), reshaped);
        }
        Some(Self { slices })
    }
}

/// Outcome of one line-search step.
///
/// The numeric codes follow the usual convention: positive passes, zero continues,
/// negative fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchStatus {
    Pass,
    Continue,
    Fail,
}

impl SearchStatus {
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Pass => 1,
            Self::Continue => 0,
            Self::Fail => -1,
        }
    }

    #[must_use]
    pub const fn from_code(code: i8) -> Self {
        match code {
            c if c > 0 => Self::Pass,
            0 => Self::Continue,
            _ => Self::Fail,
        }
    }
}
