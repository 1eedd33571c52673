use std::borrow::Cow;

#[seis_derive::seis_error]
pub enum RuntimeError {
    /// The tokio runtime could not be created (thread spawn refused, limits hit).
    #[error("Failed to initialize runtime{}: {source}", format_context(.context))]
    Build { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// At least one job returned an error; `task_id` is the lowest failing id.
    #[error("Task {task_id} failed ({failed} of {total} failed){}: {message}", format_context(.context))]
    Task {
        task_id: usize,
        failed: usize,
        total: usize,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// A job panicked or was cancelled before completing.
    #[error("Task {task_id} aborted{}: {message}", format_context(.context))]
    Aborted { task_id: usize, message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
