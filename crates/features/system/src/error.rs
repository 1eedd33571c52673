use seis_kernel::KernelError;
use std::borrow::Cow;

#[seis_derive::seis_error]
pub enum SystemError {
    /// A working directory could not be prepared.
    #[error("Failed to prepare working directory{}: {source}", format_context(.context))]
    Setup { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal system error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<SystemError> for KernelError {
    fn from(err: SystemError) -> Self {
        Self::task(err)
    }
}
