//! The explicit session value: configuration, registry and catalog of one run.

use crate::adapter::{BoundCall, JobPayload};
use crate::component::Component;
use crate::config::ConfigSnapshot;
use crate::contract::{Job, JobReport, Optimize, Postprocess, Preprocess, Solver, System, Workflow};
use crate::error::KernelError;
use crate::registry::{Registry, Slot};
use crate::resolver::Catalog;
use crate::safe_nanoid;
use seis_domain::Role;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug)]
pub struct Session {
    config: ConfigSnapshot,
    registry: Registry,
    catalog: Arc<Catalog>,
    run_id: String,
}

impl Session {
    /// Wraps an already populated registry.
    #[must_use]
    pub fn new(config: ConfigSnapshot, registry: Registry, catalog: Arc<Catalog>) -> Self {
        Self { config, registry, catalog, run_id: safe_nanoid!() }
    }

    /// Resolves and constructs every role in role order.
    ///
    /// All factories are resolved and every requirement is checked before the first
    /// instance is built, so a failure leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns the first resolution, requirement or construction failure.
    #[instrument(skip_all)]
    pub fn assemble(mut config: ConfigSnapshot, catalog: Arc<Catalog>) -> Result<Self, KernelError> {
        let mut factories = Vec::with_capacity(Role::ALL.len());
        for role in Role::ALL {
            let factory = catalog.resolve(role.as_str(), None, None, &config)?.copied();
            if let Some(factory) = &factory {
                config.apply(role, &factory.requirements())?;
            }
            factories.push((role, factory));
        }

        let mut registry = Registry::new();
        for (role, factory) in factories {
            match factory {
                Some(factory) => {
                    registry.set(role, factory.construct(&config)?)?;
                    debug!(%role, name = factory.name(), "Component constructed");
                },
                None => registry.disable(role),
            }
        }

        let session = Self::new(config, registry, catalog);
        info!(run_id = %session.run_id, active = %session.registry.roles(), "Session assembled");
        Ok(session)
    }

    #[must_use]
    pub const fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub const fn config_mut(&mut self) -> &mut ConfigSnapshot {
        &mut self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The component of `role` seen through `capability`. `Ok(None)` when the role is not
    /// active; a component lacking the capability is a contract error.
    fn capability<'a, C: ?Sized + 'a>(
        &'a self,
        role: Role,
        name: &'static str,
        view: fn(&'a dyn Component) -> Option<&'a C>,
    ) -> Result<Option<&'a C>, KernelError> {
        self.registry
            .get(role)
            .map(|component| view(component).ok_or_else(|| component.contract(name)))
            .transpose()
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Contract`] if the active component is not a [`System`].
    pub fn system(&self) -> Result<Option<&dyn System>, KernelError> {
        self.capability(Role::System, "System", |c| c.as_system())
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Contract`] if the active component is not a [`Preprocess`].
    pub fn preprocess(&self) -> Result<Option<&dyn Preprocess>, KernelError> {
        self.capability(Role::Preprocess, "Preprocess", |c| c.as_preprocess())
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Contract`] if the active component is not a [`Solver`].
    pub fn solver(&self) -> Result<Option<&dyn Solver>, KernelError> {
        self.capability(Role::Solver, "Solver", |c| c.as_solver())
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Contract`] if the active component is not a [`Postprocess`].
    pub fn postprocess(&self) -> Result<Option<&dyn Postprocess>, KernelError> {
        self.capability(Role::Postprocess, "Postprocess", |c| c.as_postprocess())
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Contract`] if the active component is not an [`Optimize`].
    pub fn optimize(&self) -> Result<Option<&dyn Optimize>, KernelError> {
        self.capability(Role::Optimize, "Optimize", |c| c.as_optimize())
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Contract`] if the active component is not a [`Workflow`].
    pub fn workflow(&self) -> Result<Option<&dyn Workflow>, KernelError> {
        self.capability(Role::Workflow, "Workflow", |c| c.as_workflow())
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Contract`] if the active component is not an [`Optimize`].
    pub fn optimize_mut(&mut self) -> Result<Option<&mut dyn Optimize>, KernelError> {
        self.registry.get_mut(Role::Optimize).map(|c| c.require_optimize_mut()).transpose()
    }

    /// The component of `role`, which must be active.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Validation`] if the role is disabled or unresolved and
    /// [`KernelError::InvalidTransition`] if it is running a task.
    pub fn require(&self, role: Role) -> Result<&dyn Component, KernelError> {
        match self.registry.slot(role) {
            Slot::Active(component) => Ok(component.as_ref()),
            Slot::Detached => Err(KernelError::transition(format!("{role} is busy running a task"))),
            slot => Err(KernelError::validation(format!("{role} is {} but is needed here", slot.label()))),
        }
    }

    /// # Errors
    ///
    /// See [`Session::require`] and [`Session::system`].
    pub fn require_system(&self) -> Result<&dyn System, KernelError> {
        self.require(Role::System)?.require_system()
    }

    /// # Errors
    ///
    /// See [`Session::require`] and [`Session::preprocess`].
    pub fn require_preprocess(&self) -> Result<&dyn Preprocess, KernelError> {
        self.require(Role::Preprocess)?.require_preprocess()
    }

    /// # Errors
    ///
    /// See [`Session::require`] and [`Session::solver`].
    pub fn require_solver(&self) -> Result<&dyn Solver, KernelError> {
        self.require(Role::Solver)?.require_solver()
    }

    /// # Errors
    ///
    /// See [`Session::require`] and [`Session::postprocess`].
    pub fn require_postprocess(&self) -> Result<&dyn Postprocess, KernelError> {
        self.require(Role::Postprocess)?.require_postprocess()
    }

    /// # Errors
    ///
    /// See [`Session::require`] and [`Session::optimize_mut`].
    pub fn require_optimize_mut(&mut self) -> Result<&mut dyn Optimize, KernelError> {
        match self.registry.get_mut(Role::Optimize) {
            Some(component) => component.require_optimize_mut(),
            None => Err(KernelError::validation("optimize is not active but is needed here")),
        }
    }

    /// Runs `task` of the component in `role`. The component is detached from its slot for
    /// the duration and put back whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::StateDrift`] if the component has no such task, or the task's
    /// own failure.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub fn invoke(&mut self, role: Role, task: &str) -> Result<(), KernelError> {
        let Some(mut component) = self.registry.take(role) else {
            return Err(match self.registry.slot(role) {
                Slot::Detached => KernelError::transition(format!("{role} is already running a task")),
                slot => KernelError::validation(format!("cannot run '{task}': {role} is {}", slot.label())),
            });
        };

        let outcome = component.run_task(task, self);
        let type_name = component.type_name();
        self.registry.restore(role, component);

        outcome.unwrap_or_else(|| {
            Err(KernelError::drift(role, format!("'{type_name}' has no task named '{task}'")))
        })
    }

    /// Dispatches `job` of `owner` through the active system: once when `single`,
    /// otherwise across the system's task count. Blocks until every task finishes.
    ///
    /// Workers receive copies of `owner`, of every active component and of the
    /// configuration; nothing they do reaches this session except through the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::StateDrift`] if `owner` has no such job, a contract error if
    /// no system is active, or the first failing task's error.
    #[instrument(skip(self, owner), fields(run_id = %self.run_id, role = %owner.role()))]
    pub fn submit(&self, owner: &dyn Component, job: &str, single: bool) -> Result<JobReport, KernelError> {
        let call = BoundCall::capture(owner, job)?;
        let system = self.require_system()?;
        let ntask = if single { 1 } else { system.ntask() };
        let label = format!("{}.{job}", owner.role());

        let peers = self.registry.envelopes()?;
        let payload = JobPayload::encode(call, peers, &self.config)?;
        debug!(%label, ntask, bytes = payload.len(), "Submitting job");

        let report = system.run(&Job::new(Arc::clone(&self.catalog), payload, ntask, label))?;
        info!(label = %report.label, tasks = report.task_ids.len(), "Job finished");
        Ok(report)
    }
}
