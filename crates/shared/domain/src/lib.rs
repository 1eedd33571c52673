//! # Domain Models
//!
//! Pure types shared by every crate of the workflow: the six roles, the on-disk naming
//! schema and the small records exchanged across role contracts.
//! Keep it lean: no I/O, no numerics, just data and simple helpers.

pub mod constants;
pub mod records;
pub mod roles;

pub use records::{Model, SearchStatus, Trace};
pub use roles::{Role, RoleSet, UnknownRole};
