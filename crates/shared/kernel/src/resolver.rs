//! Resolution of `(role, implementation name)` to a component factory.

use crate::component::{Component, Construct};
use crate::config::{ConfigSnapshot, Requirement};
use crate::error::KernelError;
use crate::naming::type_name_for;
use fxhash::FxHashMap;
use seis_domain::Role;
use std::borrow::Cow;
use std::fmt;
use tracing::debug;

type ConstructFn = fn(&ConfigSnapshot) -> Result<Box<dyn Component>, KernelError>;
type RestoreFn = fn(&[u8]) -> Result<Box<dyn Component>, KernelError>;
type RequirementsFn = fn() -> Vec<Requirement>;
type ProbeFn = fn() -> Result<(), Cow<'static, str>>;

fn construct_boxed<T: Construct>(config: &ConfigSnapshot) -> Result<Box<dyn Component>, KernelError> {
    Ok(Box::new(T::construct(config)?))
}

fn restore_boxed<T: Construct>(state: &[u8]) -> Result<Box<dyn Component>, KernelError> {
    Ok(Box::new(crate::adapter::decode_state::<T>(state)?))
}

fn no_requirements() -> Vec<Requirement> {
    Vec::new()
}

fn never_constructs(_: &ConfigSnapshot) -> Result<Box<dyn Component>, KernelError> {
    Err(KernelError::Internal { message: "implementation is unavailable".into(), context: None })
}

fn never_restores(_: &[u8]) -> Result<Box<dyn Component>, KernelError> {
    Err(KernelError::Internal { message: "implementation is unavailable".into(), context: None })
}

fn always_available() -> Result<(), Cow<'static, str>> {
    Ok(())
}

/// How to build, restore and check one implementation.
#[derive(Clone, Copy)]
pub struct ComponentFactory {
    role: Role,
    name: &'static str,
    type_name: &'static str,
    construct: ConstructFn,
    restore: RestoreFn,
    requirements: RequirementsFn,
    probe: ProbeFn,
    missing: Option<&'static str>,
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("role", &self.role)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("missing", &self.missing)
            .finish_non_exhaustive()
    }
}

impl ComponentFactory {
    #[must_use]
    pub fn of<T: Construct>() -> Self {
        Self {
            role: T::ROLE,
            name: T::NAME,
            type_name: T::TYPE_NAME,
            construct: construct_boxed::<T>,
            restore: restore_boxed::<T>,
            requirements: T::requirements,
            probe: T::probe,
            missing: None,
        }
    }

    /// A placeholder for an implementation this build does not include. Resolving it
    /// reports [`KernelError::ImportFailure`] with `reason`.
    #[must_use]
    pub fn unavailable(
        role: Role,
        name: &'static str,
        type_name: &'static str,
        reason: &'static str,
    ) -> Self {
        Self {
            role,
            name,
            type_name,
            construct: never_constructs,
            restore: never_restores,
            requirements: no_requirements,
            probe: always_available,
            missing: Some(reason),
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn requirements(&self) -> Vec<Requirement> {
        (self.requirements)()
    }

    /// # Errors
    ///
    /// Returns [`KernelError::ImportFailure`] if the implementation is not built in or its
    /// probe fails in this process.
    pub fn ensure_available(&self) -> Result<(), KernelError> {
        let cause = match self.missing {
            Some(reason) => Cow::Borrowed(reason),
            None => match (self.probe)() {
                Ok(()) => return Ok(()),
                Err(cause) => cause,
            },
        };
        Err(KernelError::ImportFailure {
            role: self.role,
            name: self.name.to_owned(),
            cause,
            context: None,
        })
    }

    /// Builds a fresh instance; defaults must already be applied to `config`.
    ///
    /// # Errors
    ///
    /// Returns the constructor's error.
    pub fn construct(&self, config: &ConfigSnapshot) -> Result<Box<dyn Component>, KernelError> {
        (self.construct)(config)
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Encoding`] if `state` does not decode into the type.
    pub fn restore(&self, state: &[u8]) -> Result<Box<dyn Component>, KernelError> {
        (self.restore)(state)
    }
}

/// Every implementation this process knows, keyed by role and type name.
#[derive(Debug, Default)]
pub struct Catalog {
    factories: [FxHashMap<&'static str, ComponentFactory>; 6],
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`. A later registration of the same `(role, type name)` replaces it.
    pub fn register<T: Construct>(&mut self) -> &mut Self {
        self.register_factory(ComponentFactory::of::<T>())
    }

    pub fn register_factory(&mut self, factory: ComponentFactory) -> &mut Self {
        debug!(role = %factory.role, type_name = factory.type_name, "Registering implementation");
        self.factories[factory.role.index()].insert(factory.type_name, factory);
        self
    }

    #[must_use]
    pub fn lookup(&self, role: Role, type_name: &str) -> Option<&ComponentFactory> {
        self.factories[role.index()].get(type_name)
    }

    /// Registered implementation names of `role`, sorted.
    #[must_use]
    pub fn implementations(&self, role: Role) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories[role.index()].values().map(|f| f.name).collect();
        names.sort_unstable();
        names
    }

    /// Resolves the factory for `role`.
    ///
    /// Without `name`, the implementation configured under the role's parameter key is
    /// used; when none is configured the role is disabled and `Ok(None)` is returned.
    /// `type_override` bypasses the naming rule.
    ///
    /// # Errors
    ///
    /// * [`KernelError::InvalidRole`] if `role` is not one of the six roles.
    /// * [`KernelError::ModuleNotFound`] if nothing is registered under the type name.
    /// * [`KernelError::ImportFailure`] if the implementation is unavailable here.
    pub fn resolve(
        &self,
        role: &str,
        name: Option<&str>,
        type_override: Option<&str>,
        config: &ConfigSnapshot,
    ) -> Result<Option<&ComponentFactory>, KernelError> {
        let role: Role = role
            .parse()
            .map_err(|err: seis_domain::UnknownRole| KernelError::InvalidRole {
                message: err.to_string().into(),
                context: None,
            })?;

        let name = match name {
            Some(name) => name,
            None => match config.implementation(role)? {
                Some(name) => name,
                None => {
                    debug!(%role, "Role disabled");
                    return Ok(None);
                },
            },
        };

        let type_name = type_override.map_or_else(|| type_name_for(name), Cow::Borrowed);
        let factory = self.lookup(role, &type_name).ok_or_else(|| KernelError::ModuleNotFound {
            role,
            name: name.to_owned(),
            type_name: type_name.clone().into_owned(),
            context: None,
        })?;
        factory.ensure_available()?;
        debug!(%role, name, type_name = factory.type_name, "Resolved implementation");
        Ok(Some(factory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with_placeholder() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.register_factory(ComponentFactory::unavailable(
            Role::Solver,
            "specfem3d",
            "Specfem3d",
            "built without the `specfem3d` feature",
        ));
        catalog
    }

    #[test]
    fn rejects_unknown_role() {
        let catalog = Catalog::new();
        let err = catalog.resolve("scheduler", Some("slurm"), None, &ConfigSnapshot::new());
        assert!(matches!(err, Err(KernelError::InvalidRole { .. })));
    }

    #[test]
    fn missing_or_null_name_disables() {
        let catalog = Catalog::new();
        let none = catalog.resolve("solver", None, None, &ConfigSnapshot::new());
        assert!(matches!(none, Ok(None)));

        let config = ConfigSnapshot::new().with_parameter("SOLVER", serde_json::Value::Null);
        assert!(matches!(catalog.resolve("solver", None, None, &config), Ok(None)));
    }

    #[test]
    fn unknown_name_is_module_not_found() {
        let config = ConfigSnapshot::new().with_parameter("SOLVER", "my_solver");
        let err = Catalog::new().resolve("solver", None, None, &config).unwrap_err();
        match err {
            KernelError::ModuleNotFound { role, name, type_name, .. } => {
                assert_eq!(role, Role::Solver);
                assert_eq!(name, "my_solver");
                assert_eq!(type_name, "MySolver");
            },
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn placeholder_is_import_failure() {
        let catalog = catalog_with_placeholder();
        let err = catalog.resolve("solver", Some("specfem3d"), None, &ConfigSnapshot::new());
        let Err(KernelError::ImportFailure { cause, .. }) = err else {
            panic!("expected an import failure");
        };
        assert!(cause.contains("feature"));
        assert_eq!(catalog.implementations(Role::Solver), ["specfem3d"]);
    }

    #[test]
    fn override_bypasses_naming() {
        let catalog = catalog_with_placeholder();
        let err = catalog.resolve("solver", Some("anything"), Some("Specfem3d"), &ConfigSnapshot::new());
        assert!(matches!(err, Err(KernelError::ImportFailure { .. })));
    }
}
