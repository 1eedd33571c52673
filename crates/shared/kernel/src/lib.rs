//! Workflow kernel: resolves role implementations, owns them in a [`Session`], and
//! checkpoints the whole session to a directory so a later process can resume it.
//!
//! The pieces, leaves first:
//!
//! * [`resolver::Catalog`] maps `(role, type name)` to a [`resolver::ComponentFactory`].
//!   Building it is the single process-wide registration step; every encode and decode
//!   of component state goes through it.
//! * [`registry::Registry`] holds one [`registry::Slot`] per role.
//! * [`adapter`] turns components and bound job calls into bytes and back.
//! * [`checkpoint::CheckpointStore`] writes and reads a checkpoint directory.
//! * [`lifecycle::Controller`] drives assemble or restore, run, checkpoint and flush.
//!
//! ## Run ids
//! Sessions are tagged with a short unambiguous id from [`safe_nanoid!`]:
//! ```rust
//! # use seis_kernel::safe_nanoid;
//! let id = safe_nanoid!();
//! assert_eq!(id.len(), 12);
//! ```

pub mod adapter;
pub mod checkpoint;
pub mod component;
pub mod config;
pub mod contract;
mod error;
pub mod lifecycle;
pub mod naming;
pub mod registry;
pub mod resolver;
pub mod session;

pub use crate::error::{KernelError, KernelErrorExt};
pub use crate::lifecycle::{Controller, Phase, RunOutcome, StopHandle};
pub use crate::resolver::{Catalog, ComponentFactory};
pub use crate::session::Session;
pub use nanoid::nanoid;
pub use seis_domain as domain;

// Alphabet excludes visually ambiguous characters (I, O, l, 0, 1).
pub const SAFE_ALPHABET: &[char; 55] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L',
    'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f',
    'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Generates an unambiguous `NanoID` (no visually confusing characters).
#[macro_export]
macro_rules! safe_nanoid {
    () => {
        $crate::nanoid!(12, $crate::SAFE_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::SAFE_ALPHABET)
    };
}
