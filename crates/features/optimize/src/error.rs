use seis_kernel::KernelError;
use std::borrow::Cow;

#[seis_derive::seis_error]
pub enum OptimizeError {
    /// A trial value arrived while no line search was running.
    #[error("No line search in progress{}", format_context(.context))]
    NoSearch { context: Option<Cow<'static, str>> },

    #[error("Vector length mismatch{}: expected {expected}, got {actual}", format_context(.context))]
    Length { expected: usize, actual: usize, context: Option<Cow<'static, str>> },

    #[error("Internal optimize error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<OptimizeError> for KernelError {
    fn from(err: OptimizeError) -> Self {
        Self::task(err)
    }
}
