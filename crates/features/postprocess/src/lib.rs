//! Postprocess role: turns per-source partial gradients into one gradient.

mod base;
mod error;

pub use crate::base::Base;
pub use crate::error::{PostprocessError, PostprocessErrorExt};

use seis_kernel::Catalog;

pub fn register(catalog: &mut Catalog) {
    catalog.register::<Base>();
}
