use seis_kernel::KernelError;
use std::borrow::Cow;

#[seis_derive::seis_error]
pub enum PostprocessError {
    #[error("Nothing to combine{}", format_context(.context))]
    Empty { context: Option<Cow<'static, str>> },

    /// Partials disagree on keys or slice lengths.
    #[error("Partial gradients differ in shape{}: {message}", format_context(.context))]
    Shape { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal postprocess error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<PostprocessError> for KernelError {
    fn from(err: PostprocessError) -> Self {
        Self::task(err)
    }
}
