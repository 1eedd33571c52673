use seis_kernel::KernelError;
use std::borrow::Cow;
use std::path::PathBuf;

#[seis_derive::seis_error]
pub enum SolverError {
    #[error("Solver I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// The solver ran and reported failure through its exit status.
    #[error("{} exited with {status}{}", .executable.display(), format_context(.context))]
    Exit { executable: PathBuf, status: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A model slice that is not a whole number of `f32` values.
    #[error("Malformed slice {}{}: {message}", .path.display(), format_context(.context))]
    Slice { path: PathBuf, message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal solver error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<SolverError> for KernelError {
    fn from(err: SolverError) -> Self {
        Self::task(err)
    }
}
