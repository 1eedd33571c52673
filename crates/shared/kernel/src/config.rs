//! The configuration snapshot: `parameters` and `paths`, both sorted maps.
//!
//! Snapshots come from a parameter file (YAML, TOML or JSON by extension) layered with
//! `SEISFLOWS__` environment overrides, or from the two JSON files of a checkpoint.
//! Keys are canonically upper case; the nested `PATHS` table becomes the paths mapping.

use crate::error::{KernelError, KernelErrorExt};
use config::{Config, Environment, File};
use seis_domain::Role;
use seis_domain::constants::{ENV_PREFIX, PATHS_TABLE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    parameters: BTreeMap<String, Value>,
    paths: BTreeMap<String, PathBuf>,
}

impl ConfigSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from already separated mappings.
    #[must_use]
    pub const fn from_parts(
        parameters: BTreeMap<String, Value>,
        paths: BTreeMap<String, PathBuf>,
    ) -> Self {
        Self { parameters, paths }
    }

    #[must_use = "The parameter is only added to the returned snapshot"]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_parameter(key, value);
        self
    }

    #[must_use = "The path is only added to the returned snapshot"]
    pub fn with_path(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.set_path(key, path);
        self
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(key.into(), value.into());
    }

    pub fn set_path(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.paths.insert(key.into(), path.into());
    }

    pub fn remove_parameter(&mut self, key: &str) -> Option<Value> {
        self.parameters.remove(key)
    }

    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    #[must_use]
    pub const fn paths(&self) -> &BTreeMap<String, PathBuf> {
        &self.paths
    }

    /// The raw value of a parameter. JSON `null` counts as absent.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key).filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn path(&self, key: &str) -> Option<&Path> {
        self.paths.get(key).map(PathBuf::as_path)
    }

    /// A typed parameter, `None` when absent or `null`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Validation`] if the value does not have the requested shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, KernelError> {
        self.parameter(key)
            .map(|value| {
                T::deserialize(value).map_err(|err| {
                    KernelError::validation(format!("parameter '{key}' = {value}: {err}"))
                })
            })
            .transpose()
    }

    /// A typed parameter that `role` cannot work without.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::MissingKey`] when absent and [`KernelError::Validation`] when
    /// malformed.
    pub fn require<T: DeserializeOwned>(&self, role: Role, key: &str) -> Result<T, KernelError> {
        self.get(key)?.ok_or_else(|| KernelError::MissingKey {
            role,
            kind: "parameter",
            key: key.to_owned().into(),
            context: None,
        })
    }

    /// A path that `role` cannot work without.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::MissingKey`] when absent.
    pub fn require_path(&self, role: Role, key: &str) -> Result<&Path, KernelError> {
        self.path(key).ok_or_else(|| KernelError::MissingKey {
            role,
            kind: "path",
            key: key.to_owned().into(),
            context: None,
        })
    }

    /// The implementation name configured for `role` under its parameter key.
    /// `None` means the role is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Validation`] if the value is neither a string nor `null`.
    pub fn implementation(&self, role: Role) -> Result<Option<&str>, KernelError> {
        match self.parameter(role.parameter_key()) {
            None => Ok(None),
            Some(Value::String(name)) => Ok(Some(name.as_str())),
            Some(other) => Err(KernelError::validation(format!(
                "{} must name an implementation, found {other}",
                role.parameter_key()
            ))),
        }
    }

    /// Fills defaults and checks required keys for one component.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::MissingKey`] for the first required key that is absent.
    pub fn apply(&mut self, role: Role, requirements: &[Requirement]) -> Result<(), KernelError> {
        for req in requirements {
            match req.kind {
                KeyKind::Parameter if self.parameter(req.key).is_none() => match &req.default {
                    Some(default) => {
                        debug!(%role, key = req.key, %default, "Parameter default applied");
                        self.parameters.insert(req.key.to_owned(), default.clone());
                    },
                    None if req.required => return Err(req.missing(role)),
                    None => {},
                },
                KeyKind::Path if self.path(req.key).is_none() => match &req.default {
                    Some(Value::String(default)) => {
                        debug!(%role, key = req.key, %default, "Path default applied");
                        self.paths.insert(req.key.to_owned(), PathBuf::from(default));
                    },
                    _ if req.required => return Err(req.missing(role)),
                    _ => {},
                },
                _ => {},
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Parameter,
    Path,
}

impl KeyKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Parameter => "parameter",
            Self::Path => "path",
        }
    }
}

/// A configuration key a component declares, with its default and a short description.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub key: &'static str,
    pub kind: KeyKind,
    pub required: bool,
    pub default: Option<Value>,
    pub doc: &'static str,
}

impl Requirement {
    /// An optional parameter without a default.
    #[must_use]
    pub const fn parameter(key: &'static str) -> Self {
        Self { key, kind: KeyKind::Parameter, required: false, default: None, doc: "" }
    }

    /// An optional path without a default.
    #[must_use]
    pub const fn path(key: &'static str) -> Self {
        Self { key, kind: KeyKind::Path, required: false, default: None, doc: "" }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub const fn doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    fn missing(&self, role: Role) -> KernelError {
        KernelError::MissingKey {
            role,
            kind: self.kind.as_str(),
            key: Cow::Borrowed(self.key),
            context: (!self.doc.is_empty()).then_some(Cow::Borrowed(self.doc)),
        }
    }
}

/// Loads a parameter file and layers `SEISFLOWS__`-prefixed environment variables on top
/// (`SEISFLOWS__NPROC=4`, `SEISFLOWS__PATHS__SCRATCH=/tmp/scratch`).
///
/// Keys are upper-cased; the `PATHS` table becomes the paths mapping and must hold strings.
///
/// # Errors
///
/// Returns [`KernelError::Config`] if the file is missing or unparsable and
/// [`KernelError::Validation`] if `PATHS` is malformed.
///
/// # Example
/// ```rust,no_run
/// use seis_kernel::config::load_snapshot;
///
/// let snapshot = load_snapshot("parameters.yaml").unwrap();
/// assert!(snapshot.parameter("WORKFLOW").is_some());
/// ```
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<ConfigSnapshot, KernelError> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading parameter file");

    let raw: BTreeMap<String, Value> = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
        .build()
        .context(format!("Failed to read {}", path.display()))?
        .try_deserialize()
        .context("Failed to deserialize parameters")?;

    split_tables(raw)
}

/// Builds a snapshot from one flat mapping with a nested `PATHS` table.
///
/// # Errors
///
/// Returns [`KernelError::Validation`] if `PATHS` is not a table of strings.
pub fn split_tables(raw: BTreeMap<String, Value>) -> Result<ConfigSnapshot, KernelError> {
    let mut snapshot = ConfigSnapshot::new();
    for (key, value) in raw {
        let key = key.to_uppercase();
        if key != PATHS_TABLE {
            snapshot.parameters.insert(key, value);
            continue;
        }
        let Value::Object(table) = value else {
            return Err(KernelError::validation(format!("{PATHS_TABLE} must be a table")));
        };
        for (name, path) in table {
            match path {
                Value::String(path) => {
                    snapshot.paths.insert(name.to_uppercase(), PathBuf::from(path));
                },
                Value::Null => {},
                other => {
                    return Err(KernelError::validation(format!(
                        "{PATHS_TABLE}.{name} must be a string, found {other}"
                    )));
                },
            }
        }
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_implementation_means_disabled() {
        let snapshot = ConfigSnapshot::new()
            .with_parameter("SOLVER", "specfem")
            .with_parameter("OPTIMIZE", Value::Null);
        assert_eq!(snapshot.implementation(Role::Solver).unwrap(), Some("specfem"));
        assert_eq!(snapshot.implementation(Role::Optimize).unwrap(), None);
        assert_eq!(snapshot.implementation(Role::System).unwrap(), None);

        let bad = ConfigSnapshot::new().with_parameter("SYSTEM", 3);
        assert!(matches!(bad.implementation(Role::System), Err(KernelError::Validation { .. })));
    }

    #[test]
    fn requirements_fill_defaults_and_reject_missing() {
        let reqs = [
            Requirement::parameter("NPROC").default(2),
            Requirement::path("SCRATCH").default("scratch"),
            Requirement::path("SOLVER_BIN").required().doc("solver executable"),
        ];

        let mut snapshot = ConfigSnapshot::new();
        let err = snapshot.apply(Role::Solver, &reqs).unwrap_err();
        assert!(err.to_string().contains("SOLVER_BIN"));
        assert!(err.to_string().contains("solver executable"));

        let mut snapshot = ConfigSnapshot::new().with_path("SOLVER_BIN", "/bin/true");
        snapshot.apply(Role::Solver, &reqs).unwrap();
        assert_eq!(snapshot.get::<u32>("NPROC").unwrap(), Some(2));
        assert_eq!(snapshot.path("SCRATCH"), Some(Path::new("scratch")));
    }

    #[test]
    fn typed_access_reports_shape_errors() {
        let snapshot = ConfigSnapshot::new().with_parameter("NTASK", "many");
        assert!(snapshot.get::<usize>("NTASK").is_err());
        let err = snapshot.require::<f64>(Role::Optimize, "STEP_LEN").unwrap_err();
        assert!(matches!(err, KernelError::MissingKey { kind: "parameter", .. }));
    }

    #[test]
    fn paths_table_is_split_out() {
        let raw: BTreeMap<String, Value> = serde_json::from_value(json!({
            "workflow": "basic",
            "NTASK": 2,
            "PATHS": { "scratch": "/tmp/s", "MODEL_INIT": null }
        }))
        .unwrap();
        let snapshot = split_tables(raw).unwrap();
        assert_eq!(snapshot.implementation(Role::Workflow).unwrap(), Some("basic"));
        assert_eq!(snapshot.path("SCRATCH"), Some(Path::new("/tmp/s")));
        assert!(snapshot.path("MODEL_INIT").is_none());
    }
}
