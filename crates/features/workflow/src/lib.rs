//! Workflow role: the ordered task lists a session runs.
//!
//! * [`Basic`] fans a counting job out over the system and tallies the results. It
//!   exercises dispatch and checkpointing without a solver.
//! * [`Inversion`] is the iterative model update: misfit, adjoint, gradient, line search,
//!   repeated from `BEGIN` to `END`.

mod basic;
mod error;
mod inversion;

pub use crate::basic::Basic;
pub use crate::error::{WorkflowError, WorkflowErrorExt};
pub use crate::inversion::Inversion;

use seis_kernel::Catalog;

pub fn register(catalog: &mut Catalog) {
    catalog.register::<Basic>().register::<Inversion>();
}
