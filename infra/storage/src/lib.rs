//! Sandboxed blocking file store used for checkpoint directories.
//!
//! Every path handed to a [`Storage`] is relative to its root and is checked against
//! traversal before it touches the disk. Writes are atomic: the bytes land in a unique
//! temporary sibling, are synced, and then renamed over the target, so a crash mid-save
//! leaves either the previous file or the new one, never a torn one.
//!
//! # Core Features
//!
//! - **Sandbox Security**: `..` may not climb above the root; absolute paths are rejected.
//! - **Atomic Writes**: unique temp write + `fsync` + `rename`.
//! - **Transparent Compression**: optional LZ4 block compression, invisible to callers.
//! - **Self-Healing**: orphaned temporary files are purged when the store is opened.
//!
//! # Examples
//!
//! ```rust
//! use seis_storage::{Compression, Storage, StorageError};
//!
//! fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("checkpoint");
//!     let storage = Storage::builder()
//!         .root(&root)
//!         .create(true)
//!         .compression(Compression::Lz4)
//!         .open()?;
//!
//!     storage.write("solver.state", b"encoded state")?;
//!     assert_eq!(storage.read("solver.state")?, b"encoded state");
//!     Ok(())
//! }
//! ```

mod builder;
mod engine;
mod error;
mod maintenance;
mod security;

pub use builder::StorageBuilder;
pub use engine::{Compression, Storage};
pub use error::{StorageError, StorageErrorExt};
