use seis_kernel::KernelError;
use std::borrow::Cow;
use std::path::PathBuf;

#[seis_derive::seis_error]
pub enum PreprocessError {
    #[error("Record I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// A record line that is not two numbers.
    #[error("Malformed record {}:{line}{}: {message}", .path.display(), format_context(.context))]
    Parse {
        path: PathBuf,
        line: usize,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// Synthetic and observed records cannot be compared sample by sample.
    #[error("Records do not match{}: {message}", format_context(.context))]
    Mismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal preprocess error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<PreprocessError> for KernelError {
    fn from(err: PreprocessError) -> Self {
        Self::task(err)
    }
}
