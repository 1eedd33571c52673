//! Session lifecycle: assemble or restore, run the workflow's tasks, checkpoint, flush.
//!
//! ```text
//! Uninitialized ─assemble/restore─▶ Assembled ─run─▶ Running ─checkpoint─▶ Checkpointed
//!        ▲                              │               │
//!        └──────────── flush ◀──────────┴───────────────┴─ (task error) ─▶ Failed
//! ```

use crate::checkpoint::CheckpointStore;
use crate::config::ConfigSnapshot;
use crate::error::KernelError;
use crate::resolver::Catalog;
use crate::session::Session;
use seis_domain::Role;
use seis_domain::constants::{CHECKPOINT_PATH, FINISHED, RESUME_FROM, STOP_AFTER};
use seis_storage::Compression;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Assembled,
    Running,
    Checkpointed,
    Flushed,
    Failed,
}

impl Phase {
    const fn accepts_session(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Flushed)
    }

    const fn has_live_session(self) -> bool {
        matches!(self, Self::Assembled | Self::Running | Self::Checkpointed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every task ran and the workflow asked for no further pass.
    Completed,
    /// `STOP_AFTER` named this task.
    StoppedAfter(String),
    /// A stop was requested; this task had not started.
    Interrupted { before: String },
}

/// Cooperative cancellation. A request takes effect at the next task boundary; one that
/// finds no boundary left is dropped when the run returns.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct Controller {
    catalog: Arc<Catalog>,
    phase: Phase,
    session: Option<Session>,
    stop: StopHandle,
    compression: Compression,
}

impl Controller {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            phase: Phase::Uninitialized,
            session: None,
            stop: StopHandle::default(),
            compression: Compression::None,
        }
    }

    /// Compresses role state files of every checkpoint this controller writes.
    #[must_use = "The option is only set on the returned controller"]
    pub const fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub const fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn expect_empty(&self, operation: &str) -> Result<(), KernelError> {
        if self.phase.accepts_session() {
            return Ok(());
        }
        Err(KernelError::transition(format!("cannot {operation} a session that is {}", self.phase)))
    }

    fn install(&mut self, outcome: Result<Session, KernelError>) -> Result<(), KernelError> {
        match outcome {
            Ok(session) => {
                self.session = Some(session);
                self.phase = Phase::Assembled;
                Ok(())
            },
            Err(err) => {
                error!(error = %err, "Session could not be built");
                self.phase = Phase::Failed;
                Err(err)
            },
        }
    }

    /// Builds a fresh session from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidTransition`] unless the controller is uninitialized
    /// or flushed, and any resolution failure (the phase becomes [`Phase::Failed`]).
    pub fn assemble(&mut self, config: ConfigSnapshot) -> Result<(), KernelError> {
        self.expect_empty("assemble")?;
        let outcome = Session::assemble(config, Arc::clone(&self.catalog));
        self.install(outcome)
    }

    /// Rebuilds the session saved in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidTransition`] unless the controller is uninitialized
    /// or flushed, and any load failure (the phase becomes [`Phase::Failed`]).
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn restore(&mut self, dir: impl AsRef<Path>) -> Result<(), KernelError> {
        self.expect_empty("restore")?;
        let catalog = Arc::clone(&self.catalog);
        let outcome = CheckpointStore::open_existing(dir)
            .and_then(|store| store.load(&catalog))
            .map(|(registry, config)| Session::new(config, registry, catalog));
        self.install(outcome)
    }

    /// Runs the workflow's task list until it completes, `STOP_AFTER` is reached or a stop
    /// is requested. A later call continues where this one left off; once the workflow has
    /// finished, further calls return [`RunOutcome::Completed`] without running anything.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidTransition`] without a live session; any task failure
    /// moves the controller to [`Phase::Failed`] and is returned.
    pub fn run(&mut self) -> Result<RunOutcome, KernelError> {
        let session = match self.session.as_mut() {
            Some(session) if self.phase.has_live_session() => session,
            _ => return Err(KernelError::transition(format!("cannot run a session that is {}", self.phase))),
        };
        self.phase = Phase::Running;

        match run_tasks(session, &self.stop, self.compression) {
            Ok((outcome, progress)) => {
                record_progress(session.config_mut(), progress);
                self.stop.take();
                info!(?outcome, "Run finished");
                Ok(outcome)
            },
            Err(err) => {
                error!(error = %err, "Run failed");
                self.phase = Phase::Failed;
                Err(err)
            },
        }
    }

    /// Saves the live session to `dir`. After a stopped run the saved copy resumes at the
    /// task that did not run; after a finished one it is marked `FINISHED`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidTransition`] without a live session, and save failures.
    pub fn checkpoint(&mut self, dir: impl AsRef<Path>) -> Result<(), KernelError> {
        let session = match self.session.as_ref() {
            Some(session) if self.phase.has_live_session() => session,
            _ => {
                return Err(KernelError::transition(format!(
                    "cannot checkpoint a session that is {}",
                    self.phase
                )));
            },
        };
        CheckpointStore::open(dir, self.compression)?.save(session.registry(), session.config())?;
        self.phase = Phase::Checkpointed;
        Ok(())
    }

    /// Drops the session without touching disk.
    pub fn flush(&mut self) {
        if let Some(session) = self.session.take() {
            info!(run_id = session.run_id(), "Session flushed");
        }
        self.phase = Phase::Flushed;
    }
}

/// Where the next run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    At(&'static str),
    Finished,
}

impl From<Option<&'static str>> for Progress {
    fn from(next: Option<&'static str>) -> Self {
        next.map_or(Self::Finished, Self::At)
    }
}

fn record_progress(config: &mut ConfigSnapshot, progress: Progress) {
    match progress {
        Progress::At(task) => {
            config.set_parameter(RESUME_FROM, task);
            config.remove_parameter(FINISHED);
        },
        Progress::Finished => {
            config.remove_parameter(RESUME_FROM);
            config.set_parameter(FINISHED, true);
        },
    }
}

fn save_session(
    session: &Session,
    dir: &Path,
    compression: Compression,
    progress: Progress,
) -> Result<(), KernelError> {
    let mut config = session.config().clone();
    record_progress(&mut config, progress);
    CheckpointStore::open(dir, compression)?.save(session.registry(), &config)
}

fn task_position(tasks: &[&'static str], key: &str, task: &str) -> Result<usize, KernelError> {
    tasks.iter().position(|t| *t == task).ok_or_else(|| {
        KernelError::validation(format!("{key} = '{task}' is not one of [{}]", tasks.join(", ")))
    })
}

#[instrument(skip_all, fields(run_id = %session.run_id()))]
fn run_tasks(
    session: &mut Session,
    stop: &StopHandle,
    compression: Compression,
) -> Result<(RunOutcome, Progress), KernelError> {
    let tasks = session.require(Role::Workflow)?.tasks();
    if tasks.is_empty() {
        warn!("Workflow declares no tasks");
        return Ok((RunOutcome::Completed, Progress::Finished));
    }
    if session.config().get::<bool>(FINISHED)? == Some(true) {
        info!("Workflow already finished");
        return Ok((RunOutcome::Completed, Progress::Finished));
    }

    let resume_from: Option<String> = session.config().get(RESUME_FROM)?;
    session.config_mut().remove_parameter(RESUME_FROM);
    let stop_after: Option<String> = session.config().get(STOP_AFTER)?;

    let mut start = match resume_from.as_deref() {
        Some(task) => task_position(tasks, RESUME_FROM, task)?,
        None => 0,
    };
    if let Some(task) = stop_after.as_deref() {
        task_position(tasks, STOP_AFTER, task)?;
    }
    if start > 0 {
        info!(task = tasks[start], "Resuming");
    }

    loop {
        for (index, task) in tasks.iter().enumerate().skip(start) {
            if stop.take() {
                warn!(task, "Stop requested");
                return Ok((RunOutcome::Interrupted { before: (*task).to_owned() }, Progress::At(*task)));
            }

            info!(task, "Running task");
            session.invoke(Role::Workflow, task)?;

            let workflow = session.require(Role::Workflow)?.require_workflow()?;
            let next = match tasks.get(index + 1) {
                Some(next) => Some(*next),
                None => workflow.repeat().then_some(tasks[0]),
            };

            if workflow.checkpoint_after(task) {
                let dir = session.config().require_path(Role::Workflow, CHECKPOINT_PATH)?.to_path_buf();
                save_session(session, &dir, compression, next.into())?;
                info!(task, dir = %dir.display(), "Checkpoint after task");
            }

            if stop_after.as_deref() == Some(*task) {
                return Ok((RunOutcome::StoppedAfter((*task).to_owned()), next.into()));
            }
        }

        if !session.require(Role::Workflow)?.require_workflow()?.repeat() {
            return Ok((RunOutcome::Completed, Progress::Finished));
        }
        start = 0;
    }
}
