//! The [`Storage`] handle: sandboxed, atomic and optionally compressed file I/O.

use crate::builder::StorageBuilder;
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance;
use crate::security;
use std::fs;
use std::io::{ErrorKind, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Marker embedded in temporary file names; the purge routine keys on it.
pub(crate) const TMP_MARKER: &str = ".seistmp.";

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Compression {
    #[default]
    None,
    Lz4,
}

impl Compression {
    fn compress(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::None => data.to_vec(),
            Self::Lz4 => lz4_flex::compress_prepend_size(data),
        }
    }

    fn decompress(self, data: Vec<u8>) -> Result<Vec<u8>, StorageError> {
        match self {
            Self::None => Ok(data),
            Self::Lz4 => {
                lz4_flex::decompress_size_prepended(&data).context("Lz4 decompression failed")
            },
        }
    }
}

#[derive(Debug)]
pub struct StorageInner {
    /// Canonical physical root; every resolved path starts with it.
    pub(crate) root: PathBuf,
    pub(crate) compression: Compression,
    pub(crate) tmp_counter: AtomicU64,
}

/// Cheaply cloneable handle to a sandboxed directory.
#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
}

impl Deref for Storage {
    type Target = StorageInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

fn not_found(path: &Path) -> StorageError {
    StorageError::FileNotFound { message: path.display().to_string().into(), context: None }
}

impl Storage {
    #[must_use = "The store is not opened until you call .open()"]
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    /// Canonical root directory of this store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative path to a physical path inside the root.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathTraversalAttempt`] for absolute paths and for paths that
    /// escape the root through `..` or a symlinked ancestor.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        security::resolve_path(&self.root, path)
    }

    /// Reads a whole file, decompressing it when compression is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileNotFound`] if the file does not exist and
    /// [`StorageError::Decompress`] if its bytes are not a valid LZ4 block.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, StorageError> {
        let resolved = self.resolve(path)?;

        let data = match fs::read(&resolved) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found(&resolved)),
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Read failed: {}", resolved.display()).into()),
                });
            },
        };

        self.compression.decompress(data)
    }

    /// Writes a file atomically, creating parent directories as needed.
    ///
    /// The target is replaced by a rename of a synced temporary sibling. Where rename cannot
    /// replace an existing file, the target is removed first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathTraversalAttempt`] if the path escapes the root and
    /// [`StorageError::Io`] on any filesystem failure.
    pub fn write(&self, path: impl AsRef<Path>, data: &[u8]) -> Result<(), StorageError> {
        let resolved = self.resolve(path)?;

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create parent of {}", resolved.display()))?;
        }

        let temp = unique_tmp_path(&resolved, &self.tmp_counter);
        let payload = self.compression.compress(data);

        let staged = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp)
            .context(format!("Temp creation failed: {}", temp.display()))
            .and_then(|mut file| {
                file.write_all(&payload).context("Write failed")?;
                file.sync_all().context("Hardware sync failed")
            });
        if let Err(err) = staged {
            let _ = fs::remove_file(&temp);
            return Err(err);
        }

        if let Err(err) = fs::rename(&temp, &resolved) {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&resolved)
                    .context(format!("Failed to replace existing file: {}", resolved.display()))?;
                fs::rename(&temp, &resolved).context(format!(
                    "Atomic swap failed: {} -> {}",
                    temp.display(),
                    resolved.display()
                ))?;
            } else {
                let _ = fs::remove_file(&temp);
                return Err(StorageError::Io {
                    source: err,
                    context: Some(
                        format!("Atomic swap failed: {} -> {}", temp.display(), resolved.display())
                            .into(),
                    ),
                });
            }
        }

        if let Some(parent) = resolved.parent() {
            sync_dir(parent);
        }

        debug!(path = %resolved.display(), bytes = data.len(), "File saved atomically");
        Ok(())
    }

    /// Names of the regular files directly under `dir` (relative to the root), sorted.
    /// Temporary files from in-flight writes are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileNotFound`] if `dir` does not exist.
    pub fn list(&self, dir: impl AsRef<Path>) -> Result<Vec<String>, StorageError> {
        let resolved = self.resolve(dir)?;
        let entries = match fs::read_dir(&resolved) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found(&resolved)),
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to list: {}", resolved.display()).into()),
                });
            },
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            if !entry.file_type().context("Failed to stat directory entry")?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.contains(TMP_MARKER)
            {
                names.push(name.to_owned());
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    /// Removes temporary files older than the staleness threshold.
    pub fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.root);
    }
}

fn sync_dir(path: &Path) {
    match fs::File::open(path) {
        Ok(dir) => {
            if let Err(err) = dir.sync_all() {
                warn!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Directory open failed");
        },
    }
}

/// `<name>.seistmp.<pid>.<n>`; the pid keeps two processes writing one checkpoint apart.
fn unique_tmp_path(target: &Path, counter: &AtomicU64) -> PathBuf {
    let counter = counter.fetch_add(1, Ordering::Relaxed);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("storage");
    let tmp_name = format!("{file_name}{TMP_MARKER}{}.{counter}", std::process::id());
    target.with_file_name(tmp_name)
}
