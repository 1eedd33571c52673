//! Solver role: runs the external numerical solver and moves model slices between disk and
//! memory.
//!
//! Model slices use the solver's Fortran unformatted layout: one record of little-endian
//! `f32` values framed by 4-byte length markers, one file per processor and material
//! (`proc000003_vs.bin`). See [`fortran`].

mod error;
pub mod fortran;
mod specfem;

pub use crate::error::{SolverError, SolverErrorExt};
pub use crate::specfem::Specfem;

use seis_kernel::Catalog;

pub fn register(catalog: &mut Catalog) {
    catalog.register::<Specfem>();
}
