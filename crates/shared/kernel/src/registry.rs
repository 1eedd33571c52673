//! The six role slots of a session.

use crate::adapter::{RoleState, StateEnvelope};
use crate::component::Component;
use crate::error::KernelError;
use seis_domain::{Role, RoleSet};

/// What a role holds.
#[derive(Debug, Default)]
pub enum Slot {
    /// Never configured or not yet resolved.
    #[default]
    Unresolved,
    /// Explicitly configured as absent.
    Disabled,
    Active(Box<dyn Component>),
    /// The component is out of its slot, running one of its own tasks.
    Detached,
}

impl Slot {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Disabled => "disabled",
            Self::Active(_) => "active",
            Self::Detached => "detached",
        }
    }
}

/// A dumb container: no lifecycle hooks run on `set` or on drop.
#[derive(Debug, Default)]
pub struct Registry {
    slots: [Slot; 6],
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `component` in its own role's slot, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Validation`] if the component belongs to another role.
    pub fn set(&mut self, role: Role, component: Box<dyn Component>) -> Result<(), KernelError> {
        if component.role() != role {
            return Err(KernelError::validation(format!(
                "'{}' implements {}, not {role}",
                component.type_name(),
                component.role()
            )));
        }
        self.slots[role.index()] = Slot::Active(component);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, role: Role) -> Option<&dyn Component> {
        match &self.slots[role.index()] {
            Slot::Active(component) => Some(component.as_ref()),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> Option<&mut dyn Component> {
        match &mut self.slots[role.index()] {
            Slot::Active(component) => Some(component.as_mut()),
            _ => None,
        }
    }

    pub fn disable(&mut self, role: Role) {
        self.slots[role.index()] = Slot::Disabled;
    }

    #[must_use]
    pub const fn slot(&self, role: Role) -> &Slot {
        &self.slots[role.index()]
    }

    /// Moves the active component out, leaving the slot [`Slot::Detached`].
    pub fn take(&mut self, role: Role) -> Option<Box<dyn Component>> {
        let slot = &mut self.slots[role.index()];
        if !slot.is_active() {
            return None;
        }
        match std::mem::replace(slot, Slot::Detached) {
            Slot::Active(component) => Some(component),
            _ => None,
        }
    }

    /// Puts a component taken with [`Registry::take`] back.
    pub fn restore(&mut self, role: Role, component: Box<dyn Component>) {
        self.slots[role.index()] = Slot::Active(component);
    }

    /// Roles holding an active component.
    #[must_use]
    pub fn roles(&self) -> RoleSet {
        Role::ALL.into_iter().filter(|role| self.slots[role.index()].is_active()).collect()
    }

    /// Active components in role order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &dyn Component)> {
        Role::ALL.into_iter().filter_map(|role| self.get(role).map(|c| (role, c)))
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    /// Envelopes of every active component, in role order.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Encoding`] if a component cannot snapshot itself.
    pub fn envelopes(&self) -> Result<Vec<StateEnvelope>, KernelError> {
        self.iter().map(|(_, component)| StateEnvelope::capture(component)).collect()
    }

    /// What a checkpoint records for `role`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidTransition`] while the component is detached.
    pub fn role_state(&self, role: Role) -> Result<RoleState, KernelError> {
        match &self.slots[role.index()] {
            Slot::Unresolved => Ok(RoleState::Unresolved),
            Slot::Disabled => Ok(RoleState::Disabled),
            Slot::Active(component) => Ok(RoleState::Active(StateEnvelope::capture(component.as_ref())?)),
            Slot::Detached => Err(KernelError::transition(format!(
                "{role} is running a task and cannot be captured"
            ))),
        }
    }
}
