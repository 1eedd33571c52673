//! System role: where dispatched jobs run.
//!
//! [`Local`] runs every task of a job on the shared [`seis_runtime`] worker pool of this
//! process, at most `NPROC` at a time.

mod error;
mod local;

pub use crate::error::{SystemError, SystemErrorExt};
pub use crate::local::Local;

use seis_kernel::Catalog;

/// Registers every system implementation of this crate.
pub fn register(catalog: &mut Catalog) {
    catalog.register::<Local>();
}
