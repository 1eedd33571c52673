//! The object-safe [`Component`] trait every role implementation provides, and the static
//! [`Describe`] / [`Construct`] traits its factory is built from.
//!
//! `#[seis_derive::component(...)]` generates `Describe` and `Component`; implementors write
//! `Construct` and the capability trait of their role by hand.

use crate::config::{ConfigSnapshot, Requirement};
use crate::contract::{Optimize, Postprocess, Preprocess, Solver, System, WorkerContext, Workflow};
use crate::error::KernelError;
use crate::session::Session;
use seis_domain::Role;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::borrow::Cow;
use std::fmt::Debug;

/// Static identity of an implementation.
pub trait Describe {
    const ROLE: Role;
    /// The implementation name as users configure it (`local`, `LBFGS`).
    const NAME: &'static str;
    /// The registered type name the naming rule resolves `NAME` to.
    const TYPE_NAME: &'static str;
}

/// A live component instance held by the registry.
pub trait Component: Any + Debug + Send {
    fn role(&self) -> Role;
    fn name(&self) -> &'static str;
    fn type_name(&self) -> &'static str;

    /// Binary snapshot of the full instance state.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Encoding`] if the state cannot be encoded.
    fn snapshot(&self) -> Result<Vec<u8>, KernelError>;

    /// Task names, in declaration order. For workflows this is the task list.
    fn tasks(&self) -> &'static [&'static str];
    /// Job names that may be dispatched to workers.
    fn jobs(&self) -> &'static [&'static str];

    /// Runs the named task; `None` when the component has no such task.
    fn run_task(&mut self, task: &str, session: &mut Session)
    -> Option<Result<(), KernelError>>;
    /// Runs the named job; `None` when the component has no such job.
    fn run_job(&mut self, job: &str, ctx: &WorkerContext) -> Option<Result<(), KernelError>>;

    fn as_any(&self) -> &dyn Any;

    fn as_system(&self) -> Option<&dyn System> {
        None
    }
    fn as_preprocess(&self) -> Option<&dyn Preprocess> {
        None
    }
    fn as_solver(&self) -> Option<&dyn Solver> {
        None
    }
    fn as_postprocess(&self) -> Option<&dyn Postprocess> {
        None
    }
    fn as_optimize(&self) -> Option<&dyn Optimize> {
        None
    }
    fn as_optimize_mut(&mut self) -> Option<&mut dyn Optimize> {
        None
    }
    fn as_workflow(&self) -> Option<&dyn Workflow> {
        None
    }
}

macro_rules! require_capability {
    ($($fn_name:ident => $accessor:ident: $capability:ident),* $(,)?) => {
        $(
            #[doc = concat!("This component as a [`", stringify!($capability), "`].")]
            ///
            /// # Errors
            ///
            /// Returns [`KernelError::Contract`] if the capability is missing.
            pub fn $fn_name(&self) -> Result<&dyn $capability, KernelError> {
                self.$accessor().ok_or_else(|| self.contract(stringify!($capability)))
            }
        )*
    };
}

impl dyn Component {
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub(crate) fn contract(&self, capability: &'static str) -> KernelError {
        KernelError::Contract {
            role: self.role(),
            type_name: self.type_name().into(),
            capability,
            context: None,
        }
    }

    require_capability! {
        require_system => as_system: System,
        require_preprocess => as_preprocess: Preprocess,
        require_solver => as_solver: Solver,
        require_postprocess => as_postprocess: Postprocess,
        require_optimize => as_optimize: Optimize,
        require_workflow => as_workflow: Workflow,
    }

    /// # Errors
    ///
    /// Returns [`KernelError::Contract`] if the capability is missing.
    pub fn require_optimize_mut(&mut self) -> Result<&mut dyn Optimize, KernelError> {
        let contract = self.contract("Optimize");
        self.as_optimize_mut().ok_or(contract)
    }
}

/// How a factory builds and restores an implementation.
pub trait Construct: Component + Describe + Serialize + DeserializeOwned + Sized {
    /// Builds a fresh instance from a validated snapshot (defaults already applied).
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter the instance needs is malformed.
    fn construct(config: &ConfigSnapshot) -> Result<Self, KernelError>;

    /// Keys this implementation reads, checked and defaulted at assembly.
    #[must_use]
    fn requirements() -> Vec<Requirement> {
        Vec::new()
    }

    /// Whether the implementation can run in this process (binary present, feature built).
    ///
    /// # Errors
    ///
    /// Returns the reason the implementation is unavailable.
    fn probe() -> Result<(), Cow<'static, str>> {
        Ok(())
    }
}
