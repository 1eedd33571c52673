//! Checkpoint directories: `parameters.json`, `paths.json` and one `<role>.state` per role.
//!
//! A state file is [`STATE_TAG`] followed by the postcard encoding of a [`RoleState`],
//! optionally LZ4-compressed as a whole. Reading sniffs the tag, so compressed and plain
//! checkpoints load the same way. Every file is written atomically; the directory as a
//! whole is not transactional.

use crate::adapter::{self, RoleState};
use crate::config::ConfigSnapshot;
use crate::error::KernelError;
use crate::registry::Registry;
use crate::resolver::Catalog;
use seis_domain::constants::{PARAMETERS, PATHS, SNAPSHOT_EXTENSION, STATE_EXTENSION};
use seis_domain::{Role, RoleSet};
use seis_storage::{Compression, Storage, StorageError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Leading bytes of an uncompressed state file.
pub const STATE_TAG: &[u8; 4] = b"SFST";

fn state_file(role: Role) -> String {
    format!("{}.{STATE_EXTENSION}", role.as_str())
}

fn snapshot_file(stem: &str) -> String {
    format!("{stem}.{SNAPSHOT_EXTENSION}")
}

/// Sorted keys come from the maps themselves; this fixes the indentation.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, KernelError> {
    let mut out = Vec::new();
    let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    out.push(b'\n');
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    plain: Storage,
    packed: Storage,
    compression: Compression,
}

impl CheckpointStore {
    /// Opens `dir` for saving, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Storage`] if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>, compression: Compression) -> Result<Self, KernelError> {
        Self::open_with(dir.as_ref(), compression, true)
    }

    /// Opens an existing checkpoint directory for loading.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::CheckpointCorrupt`] if the directory does not exist.
    pub fn open_existing(dir: impl AsRef<Path>) -> Result<Self, KernelError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(KernelError::corrupt(dir, "checkpoint directory does not exist"));
        }
        Self::open_with(dir, Compression::None, false)
    }

    fn open_with(dir: &Path, compression: Compression, create: bool) -> Result<Self, KernelError> {
        let plain = Storage::builder().root(dir).create(create).open()?;
        let packed = Storage::builder().root(plain.root()).compression(Compression::Lz4).open()?;
        Ok(Self { plain, packed, compression })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        self.plain.root()
    }

    fn path_of(&self, file: &str) -> PathBuf {
        self.dir().join(file)
    }

    /// Writes the configuration and every role's state. A later save replaces all of it.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidTransition`] if a component is detached, and encoding
    /// or storage failures. Nothing is written unless every role could be captured.
    #[instrument(skip_all, fields(dir = %self.dir().display()))]
    pub fn save(&self, registry: &Registry, config: &ConfigSnapshot) -> Result<(), KernelError> {
        let mut states = Vec::with_capacity(Role::ALL.len());
        for role in Role::ALL {
            let mut bytes = STATE_TAG.to_vec();
            bytes.extend(adapter::encode_state(&registry.role_state(role)?)?);
            states.push((role, bytes));
        }

        self.plain.write(snapshot_file(PARAMETERS), &to_pretty_json(config.parameters())?)?;
        self.plain.write(snapshot_file(PATHS), &to_pretty_json(config.paths())?)?;

        let states_store = match self.compression {
            Compression::None => &self.plain,
            Compression::Lz4 => &self.packed,
        };
        for (role, bytes) in states {
            states_store.write(state_file(role), &bytes)?;
            debug!(%role, bytes = bytes.len(), "Role state written");
        }

        info!(active = %registry.roles(), "Checkpoint saved");
        Ok(())
    }

    /// Reads and decodes every file, then rebuilds the components through `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::CheckpointCorrupt`] naming the first missing or undecodable
    /// file, and [`KernelError::StateDrift`] if a component no longer fits the catalog.
    /// No registry is returned unless every role was rebuilt.
    #[instrument(skip_all, fields(dir = %self.dir().display()))]
    pub fn load(&self, catalog: &Catalog) -> Result<(Registry, ConfigSnapshot), KernelError> {
        let (config, states) = self.read_all()?;

        let mut registry = Registry::new();
        for (role, state) in states {
            match state {
                RoleState::Unresolved => {},
                RoleState::Disabled => registry.disable(role),
                RoleState::Active(envelope) => registry.set(role, envelope.restore(catalog)?)?,
            }
        }

        info!(active = %registry.roles(), "Checkpoint loaded");
        Ok((registry, config))
    }

    /// Describes the checkpoint without rebuilding any component, including files in the
    /// directory that are not part of it.
    ///
    /// # Errors
    ///
    /// Same file-level failures as [`CheckpointStore::load`].
    pub fn inspect(&self) -> Result<CheckpointSummary, KernelError> {
        let (config, states) = self.read_all()?;
        let known: Vec<String> = [snapshot_file(PARAMETERS), snapshot_file(PATHS)]
            .into_iter()
            .chain(Role::ALL.into_iter().map(state_file))
            .collect();
        let stray = self.plain.list("")?.into_iter().filter(|name| !known.contains(name)).collect();
        let roles = states
            .into_iter()
            .map(|(role, state)| {
                let entry = match state {
                    RoleState::Unresolved => RoleSummary::Unresolved,
                    RoleState::Disabled => RoleSummary::Disabled,
                    RoleState::Active(env) => RoleSummary::Active {
                        name: env.name,
                        type_name: env.type_name,
                        bytes: env.state.len(),
                    },
                };
                (role, entry)
            })
            .collect();
        Ok(CheckpointSummary { dir: self.dir().to_path_buf(), config, roles, stray })
    }

    fn read_all(&self) -> Result<(ConfigSnapshot, Vec<(Role, RoleState)>), KernelError> {
        let parameters: BTreeMap<String, serde_json::Value> = self.read_json(PARAMETERS)?;
        let paths: BTreeMap<String, PathBuf> = self.read_json(PATHS)?;

        let states = Role::ALL
            .into_iter()
            .map(|role| self.read_state(role).map(|state| (role, state)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((ConfigSnapshot::from_parts(parameters, paths), states))
    }

    fn read_json<T: DeserializeOwned>(&self, stem: &str) -> Result<T, KernelError> {
        let file = snapshot_file(stem);
        let bytes = self.read_file(&self.plain, &file)?;
        serde_json::from_slice(&bytes)
            .map_err(|err| KernelError::corrupt(self.path_of(&file), format!("invalid JSON: {err}")))
    }

    fn read_state(&self, role: Role) -> Result<RoleState, KernelError> {
        let file = state_file(role);
        let raw = self.read_file(&self.plain, &file)?;
        let bytes = if raw.starts_with(STATE_TAG) {
            raw
        } else {
            let unpacked = self.read_file(&self.packed, &file)?;
            if !unpacked.starts_with(STATE_TAG) {
                return Err(KernelError::corrupt(self.path_of(&file), "not a role state file"));
            }
            unpacked
        };

        let state: RoleState = adapter::decode_state(&bytes[STATE_TAG.len()..])
            .map_err(|err| KernelError::corrupt(self.path_of(&file), err.to_string()))?;
        if let RoleState::Active(env) = &state
            && env.role != role
        {
            return Err(KernelError::corrupt(
                self.path_of(&file),
                format!("holds {} state", env.role),
            ));
        }
        Ok(state)
    }

    fn read_file(&self, store: &Storage, file: &str) -> Result<Vec<u8>, KernelError> {
        store.read(file).map_err(|err| {
            let message = match err {
                StorageError::FileNotFound { .. } => "file is missing".to_owned(),
                other => other.to_string(),
            };
            KernelError::corrupt(self.path_of(file), message)
        })
    }
}

/// What a role's state file holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSummary {
    Unresolved,
    Disabled,
    Active { name: String, type_name: String, bytes: usize },
}

#[derive(Debug, Clone)]
pub struct CheckpointSummary {
    pub dir: PathBuf,
    pub config: ConfigSnapshot,
    pub roles: Vec<(Role, RoleSummary)>,
    /// Files next to the checkpoint that no load reads.
    pub stray: Vec<String>,
}

impl CheckpointSummary {
    #[must_use]
    pub fn active(&self) -> RoleSet {
        self.roles
            .iter()
            .filter(|(_, entry)| matches!(entry, RoleSummary::Active { .. }))
            .map(|(role, _)| *role)
            .collect()
    }
}

impl fmt::Display for CheckpointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "checkpoint {}", self.dir.display())?;
        for (role, entry) in &self.roles {
            match entry {
                RoleSummary::Unresolved => writeln!(f, "  {role:<12} unresolved")?,
                RoleSummary::Disabled => writeln!(f, "  {role:<12} disabled")?,
                RoleSummary::Active { name, type_name, bytes } => {
                    writeln!(f, "  {role:<12} {name} ({type_name}, {bytes} bytes)")?;
                },
            }
        }
        write!(
            f,
            "  {} parameters, {} paths",
            self.config.parameters().len(),
            self.config.paths().len()
        )?;
        if !self.stray.is_empty() {
            write!(f, "\n  stray files: {}", self.stray.join(", "))?;
        }
        Ok(())
    }
}
