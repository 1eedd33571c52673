//! Preprocess role: reading and writing waveform records, and turning a pair of synthetic
//! and observed records into a misfit value and an adjoint source.

mod error;
mod waveform;

pub use crate::error::{PreprocessError, PreprocessErrorExt};
pub use crate::waveform::{Misfit, Waveform};

use seis_kernel::Catalog;

pub fn register(catalog: &mut Catalog) {
    catalog.register::<Waveform>();
}
