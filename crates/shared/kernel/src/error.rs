use seis_domain::Role;
use std::borrow::Cow;
use std::path::PathBuf;

/// Every failure the kernel reports. All of them abort the session.
#[seis_derive::seis_error]
pub enum KernelError {
    /// A role string that is not one of the six roles.
    #[error("Invalid role{}: {message}", format_context(.context))]
    InvalidRole { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// No factory is registered for the translated type name.
    #[error(
        "No {role} implementation '{name}' (type '{type_name}') is registered{}",
        format_context(.context)
    )]
    ModuleNotFound {
        role: Role,
        name: String,
        type_name: String,
        context: Option<Cow<'static, str>>,
    },

    /// A factory exists but its availability probe failed.
    #[error("{role} implementation '{name}' is unavailable{}: {cause}", format_context(.context))]
    ImportFailure {
        role: Role,
        name: String,
        cause: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// The active component of a role lacks that role's capability.
    #[error(
        "{role} component '{type_name}' does not provide the {capability} capability{}",
        format_context(.context)
    )]
    Contract {
        role: Role,
        type_name: Cow<'static, str>,
        capability: &'static str,
        context: Option<Cow<'static, str>>,
    },

    /// Saved state no longer matches the registered types or their methods.
    #[error("State drift in {role}{}: {message}", format_context(.context))]
    StateDrift { role: Role, message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A checkpoint file is missing or cannot be decoded.
    #[error("Checkpoint corrupt at {}{}: {message}", .path.display(), format_context(.context))]
    CheckpointCorrupt {
        path: PathBuf,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// A component declared a required parameter or path that the snapshot lacks.
    #[error("{role} requires {kind} '{key}'{}", format_context(.context))]
    MissingKey {
        role: Role,
        kind: &'static str,
        key: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// A configuration value is present but unusable.
    #[error("Invalid configuration{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The lifecycle controller was asked for an operation its phase does not allow.
    #[error("Invalid lifecycle transition{}: {message}", format_context(.context))]
    InvalidTransition { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A component task or job failed with its own error.
    #[error("Task failed{}: {source}", format_context(.context))]
    Task {
        source: Box<dyn std::error::Error + Send + Sync>,
        context: Option<Cow<'static, str>>,
    },

    #[error("Storage failure{}: {source}", format_context(.context))]
    Storage { source: seis_storage::StorageError, context: Option<Cow<'static, str>> },

    #[error("Worker pool failure{}: {source}", format_context(.context))]
    Runtime { source: seis_runtime::RuntimeError, context: Option<Cow<'static, str>> },

    #[error("Binary encoding failure{}: {source}", format_context(.context))]
    Encoding { source: postcard::Error, context: Option<Cow<'static, str>> },

    #[error("JSON failure{}: {source}", format_context(.context))]
    Json { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Configuration load failure{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Internal kernel error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl KernelError {
    /// Wraps a component-specific error as a task failure.
    pub fn task(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Task { source: Box::new(err), context: None }
    }

    pub(crate) fn drift(role: Role, message: impl Into<Cow<'static, str>>) -> Self {
        Self::StateDrift { role, message: message.into(), context: None }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl Into<Cow<'static, str>>) -> Self {
        Self::CheckpointCorrupt { path: path.into(), message: message.into(), context: None }
    }

    pub(crate) fn transition(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidTransition { message: message.into(), context: None }
    }

    pub(crate) fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation { message: message.into(), context: None }
    }
}
