//! Optimize role: search directions and the line search along them.
//!
//! Both implementations share [`search::LineSearch`], a backtracking search with an Armijo
//! sufficient-decrease test. They differ only in the direction: [`Gradient`] follows the
//! negative gradient, [`Lbfgs`] applies the two-loop recursion over its recent history.

mod error;
mod gradient;
mod lbfgs;
pub mod search;

pub use crate::error::{OptimizeError, OptimizeErrorExt};
pub use crate::gradient::Gradient;
pub use crate::lbfgs::Lbfgs;

use seis_kernel::Catalog;

pub fn register(catalog: &mut Catalog) {
    catalog.register::<Gradient>().register::<Lbfgs>();
}
