use seis_kernel::KernelError;
use std::borrow::Cow;
use std::path::PathBuf;

#[seis_derive::seis_error]
pub enum WorkflowError {
    #[error("Workflow I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// A file a job was expected to leave behind is absent or unreadable.
    #[error("Unexpected job output {}{}: {message}", .path.display(), format_context(.context))]
    Output { path: PathBuf, message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Line search failed in iteration {iteration}{}", format_context(.context))]
    LineSearch { iteration: u32, context: Option<Cow<'static, str>> },

    #[error("Internal workflow error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<WorkflowError> for KernelError {
    fn from(err: WorkflowError) -> Self {
        Self::task(err)
    }
}
