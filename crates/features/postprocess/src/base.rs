use crate::error::PostprocessError;
use seis_domain::Model;
use seis_kernel::component::Construct;
use seis_kernel::config::{ConfigSnapshot, Requirement};
use seis_kernel::contract::Postprocess;
use seis_kernel::KernelError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sums partial gradients, then multiplies by `SCALE`.
#[seis_derive::component(role = "postprocess", name = "base")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Base {
    scale: f64,
}

impl Base {
    #[must_use]
    pub const fn new(scale: f64) -> Self {
        Self { scale }
    }
}

fn shape_error(message: String) -> PostprocessError {
    PostprocessError::Shape { message: message.into(), context: None }
}

fn accumulate(total: &mut Model, partial: &Model, index: usize) -> Result<(), PostprocessError> {
    if !total.keys().eq(partial.keys()) {
        let keys: Vec<&str> = partial.keys().collect();
        return Err(shape_error(format!("partial {index} holds [{}]", keys.join(", "))));
    }
    let shapes_agree = total.keys().all(|key| {
        let lhs = total.get(key).unwrap_or_default();
        let rhs = partial.get(key).unwrap_or_default();
        lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(a, b)| a.len() == b.len())
    });
    if !shapes_agree {
        return Err(shape_error(format!("partial {index} has other slice lengths")));
    }
    let vector = partial.to_vector();
    let sum: Vec<f64> = total.to_vector().iter().zip(&vector).map(|(a, b)| a + b).collect();
    *total = total
        .with_vector(&sum)
        .ok_or_else(|| shape_error(format!("partial {index} has {} values", vector.len())))?;
    Ok(())
}

impl Postprocess for Base {
    fn combine(&self, partials: &[Model]) -> Result<Model, KernelError> {
        let (first, rest) = partials.split_first().ok_or(PostprocessError::Empty { context: None })?;
        let mut total = first.clone();
        for (index, partial) in rest.iter().enumerate() {
            accumulate(&mut total, partial, index + 1)?;
        }
        if (self.scale - 1.0).abs() > f64::EPSILON {
            let scaled: Vec<f64> = total.to_vector().iter().map(|v| v * self.scale).collect();
            total = total.with_vector(&scaled).unwrap_or(total);
        }
        debug!(partials = partials.len(), values = total.len(), "Gradient combined");
        Ok(total)
    }
}

impl Construct for Base {
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError> {
        Ok(Self::new(config.require(seis_domain::Role::Postprocess, "SCALE")?))
    }

    fn requirements() -> Vec<Requirement> {
        vec![Requirement::parameter("SCALE").default(1.0).doc("factor applied to the summed gradient")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(vp: Vec<Vec<f32>>) -> Model {
        let mut model = Model::new();
        model.insert("vp", vp);
        model
    }

    #[test]
    fn sums_and_scales() {
        let base = Base::new(0.5);
        let combined = base
            .combine(&[model(vec![vec![1.0, 2.0], vec![3.0]]), model(vec![vec![3.0, 4.0], vec![5.0]])])
            .unwrap();
        assert_eq!(combined.get("vp").unwrap(), [vec![2.0, 3.0], vec![4.0]]);
    }

    #[test]
    fn rejects_empty_and_misshapen_input() {
        let base = Base::new(1.0);
        assert!(base.combine(&[]).is_err());
        let err = base
            .combine(&[model(vec![vec![1.0, 2.0], vec![3.0]]), model(vec![vec![1.0], vec![2.0, 3.0]])])
            .unwrap_err();
        assert!(err.to_string().contains("slice lengths"), "{err}");

        let mut other = Model::new();
        other.insert("vs", vec![vec![1.0, 2.0], vec![3.0]]);
        assert!(base.combine(&[model(vec![vec![1.0, 2.0], vec![3.0]]), other]).is_err());
    }
}
