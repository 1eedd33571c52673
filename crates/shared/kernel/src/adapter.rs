//! Binary encoding of component state and of bound job calls.
//!
//! A component travels as a [`StateEnvelope`]: format version, role, implementation name,
//! type name and the component's own postcard snapshot. Decoding always goes back through
//! the [`Catalog`] factory registered for `(role, type name)`, so the receiving process
//! needs the same registrations, never the sender's memory.

use crate::component::Component;
use crate::config::ConfigSnapshot;
use crate::contract::WorkerContext;
use crate::error::KernelError;
use crate::resolver::Catalog;
use seis_domain::Role;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Bumped whenever the envelope layout changes.
pub const STATE_FORMAT_VERSION: u16 = 1;

/// Encodes a component's state with postcard. Used by generated `snapshot` impls.
///
/// # Errors
///
/// Returns [`KernelError::Encoding`] if serialization fails.
pub fn encode_state<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, KernelError> {
    Ok(postcard::to_stdvec(value)?)
}

/// # Errors
///
/// Returns [`KernelError::Encoding`] if the bytes do not decode into `T`.
pub fn decode_state<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, KernelError> {
    Ok(postcard::from_bytes(bytes)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEnvelope {
    pub version: u16,
    pub role: Role,
    pub name: String,
    pub type_name: String,
    pub state: Vec<u8>,
}

impl StateEnvelope {
    /// # Errors
    ///
    /// Returns [`KernelError::Encoding`] if the component cannot snapshot itself.
    pub fn capture(component: &dyn Component) -> Result<Self, KernelError> {
        Ok(Self {
            version: STATE_FORMAT_VERSION,
            role: component.role(),
            name: component.name().to_owned(),
            type_name: component.type_name().to_owned(),
            state: component.snapshot()?,
        })
    }

    /// Rebuilds an equivalent component through the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::StateDrift`] if the version differs, no factory is registered
    /// for the type, or the state no longer decodes into it, and
    /// [`KernelError::ImportFailure`] if the factory's probe fails here.
    pub fn restore(&self, catalog: &Catalog) -> Result<Box<dyn Component>, KernelError> {
        if self.version != STATE_FORMAT_VERSION {
            return Err(KernelError::drift(
                self.role,
                format!(
                    "state format v{} cannot be read by v{STATE_FORMAT_VERSION}",
                    self.version
                ),
            ));
        }
        let factory = catalog.lookup(self.role, &self.type_name).ok_or_else(|| {
            KernelError::drift(
                self.role,
                format!("type '{}' ({}) is not registered", self.type_name, self.name),
            )
        })?;
        factory.ensure_available()?;
        factory.restore(&self.state).map_err(|err| {
            KernelError::drift(
                self.role,
                format!("state of '{}' no longer decodes: {err}", self.type_name),
            )
        })
    }
}

/// What a checkpoint records for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleState {
    /// Never configured or resolved.
    Unresolved,
    /// Explicitly configured as absent.
    Disabled,
    Active(StateEnvelope),
}

/// A job method bound to a copy of its owning component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundCall {
    pub method: String,
    pub owner: StateEnvelope,
}

impl BoundCall {
    /// Binds `method` of `owner`, snapshotting the owner as it is now.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::StateDrift`] if `owner` has no such job.
    pub fn capture(owner: &dyn Component, method: &str) -> Result<Self, KernelError> {
        if !owner.jobs().contains(&method) {
            return Err(KernelError::drift(
                owner.role(),
                format!("'{}' has no job named '{method}'", owner.type_name()),
            ));
        }
        Ok(Self { method: method.to_owned(), owner: StateEnvelope::capture(owner)? })
    }

    /// Rebuilds the owner and runs the method against it. The rebuilt owner is returned so
    /// callers can observe what the job did to it.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::StateDrift`] if the owner or the method cannot be
    /// re-established, or the job's own failure.
    pub fn invoke(
        &self,
        catalog: &Catalog,
        ctx: &WorkerContext,
    ) -> Result<Box<dyn Component>, KernelError> {
        let mut owner = self.owner.restore(catalog)?;
        debug!(role = %self.owner.role, method = %self.method, task_id = ctx.task_id(), "Invoking bound call");
        match owner.run_job(&self.method, ctx) {
            Some(result) => result.map(|()| owner),
            None => Err(KernelError::drift(
                self.owner.role,
                format!("'{}' has no job named '{}'", self.owner.type_name, self.method),
            )),
        }
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Encoding`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, KernelError> {
        encode_state(self)
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Encoding`] if the bytes are not a bound call.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KernelError> {
        decode_state(bytes)
    }
}

/// Everything a worker needs, in one encodable value. The configuration travels as JSON
/// because its values are self-describing and postcard is not.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JobPayload {
    pub(crate) call: BoundCall,
    pub(crate) peers: Vec<StateEnvelope>,
    pub(crate) config: String,
}

impl JobPayload {
    pub(crate) fn encode(
        call: BoundCall,
        peers: Vec<StateEnvelope>,
        config: &ConfigSnapshot,
    ) -> Result<Vec<u8>, KernelError> {
        let payload = Self { call, peers, config: serde_json::to_string(config)? };
        encode_state(&payload)
    }
}

/// Decodes a job payload and runs it as task `task_id` of `ntask`.
pub(crate) fn run_worker(
    catalog: &Arc<Catalog>,
    payload: &[u8],
    task_id: usize,
    ntask: usize,
) -> Result<Box<dyn Component>, KernelError> {
    let JobPayload { call, peers, config } = decode_state(payload)?;
    let config: ConfigSnapshot = serde_json::from_str(&config)?;
    let ctx = WorkerContext::new(task_id, ntask, config, Arc::clone(catalog), peers);
    call.invoke(catalog, &ctx)
}
