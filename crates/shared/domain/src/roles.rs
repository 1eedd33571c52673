use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One of the six fixed functional slots a session accounts for.
///
/// The declaration order is the construction and save/load order: later roles may
/// reference earlier ones while they are being built (e.g. `workflow` reads `solver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Preprocess,
    Solver,
    Postprocess,
    Optimize,
    Workflow,
}

impl Role {
    /// Every role, in construction order.
    pub const ALL: [Self; 6] =
        [Self::System, Self::Preprocess, Self::Solver, Self::Postprocess, Self::Optimize, Self::Workflow];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Preprocess => "preprocess",
            Self::Solver => "solver",
            Self::Postprocess => "postprocess",
            Self::Optimize => "optimize",
            Self::Workflow => "workflow",
        }
    }

    /// Parameter key holding the implementation name configured for this role.
    #[must_use]
    pub const fn parameter_key(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Preprocess => "PREPROCESS",
            Self::Solver => "SOLVER",
            Self::Postprocess => "POSTPROCESS",
            Self::Optimize => "OPTIMIZE",
            Self::Workflow => "WORKFLOW",
        }
    }

    /// Position of the role in [`Role::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    const fn flag(self) -> RoleSet {
        match self {
            Self::System => RoleSet::SYSTEM,
            Self::Preprocess => RoleSet::PREPROCESS,
            Self::Solver => RoleSet::SOLVER,
            Self::Postprocess => RoleSet::POSTPROCESS,
            Self::Optimize => RoleSet::OPTIMIZE,
            Self::Workflow => RoleSet::WORKFLOW,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Returned when a string does not name one of the six roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a role; expected one of ", self.0)?;
        let names: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts the lowercase role name or its parameter key (`solver` / `SOLVER`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s || role.parameter_key() == s)
            .ok_or_else(|| UnknownRole(s.to_owned()))
    }
}

bitflags! {
    /// A set of roles, e.g. the roles holding an active component.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct RoleSet: u8 {
        const SYSTEM = 1 << 0;
        const PREPROCESS = 1 << 1;
        const SOLVER = 1 << 2;
        const POSTPROCESS = 1 << 3;
        const OPTIMIZE = 1 << 4;
        const WORKFLOW = 1 << 5;
    }
}

impl RoleSet {
    #[must_use]
    pub const fn has(self, role: Role) -> bool {
        self.contains(role.flag())
    }

    /// Member roles in construction order.
    pub fn roles(self) -> impl Iterator<Item = Role> {
        Role::ALL.into_iter().filter(move |role| self.has(*role))
    }
}

impl From<Role> for RoleSet {
    fn from(role: Role) -> Self {
        role.flag()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, role| set | role.flag())
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.roles().map(Role::as_str).collect();
        f.write_str(&names.join(","))
    }
}

impl Serialize for RoleSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}
