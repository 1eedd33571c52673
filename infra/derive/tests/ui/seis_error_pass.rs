use seis_derive::seis_error;
use std::borrow::Cow;
use std::path::PathBuf;

#[seis_error]
pub enum CheckpointError {
    #[error("Checkpoint I/O error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Checkpoint corrupt at {}{}", .path.display(), format_context(.context))]
    Corrupt { path: PathBuf, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read_marker() -> Result<Vec<u8>, CheckpointError> {
    let bytes = std::fs::read("/nonexistent/system.state").context("Reading role state")?;
    Ok(bytes)
}

fn main() {
    let err = read_marker().expect_err("missing file");
    assert!(err.to_string().contains("Reading role state"));

    let internal: CheckpointError = "unexpected marker".into();
    assert!(matches!(internal, CheckpointError::Internal { .. }));

    let corrupt: Result<(), CheckpointError> =
        Err(CheckpointError::Corrupt { path: PathBuf::from("ckpt/solver.state"), context: None });
    let err = corrupt.context("load").expect_err("corrupt");
    assert_eq!(err.to_string(), "Checkpoint corrupt at ckpt/solver.state (load)");
}
