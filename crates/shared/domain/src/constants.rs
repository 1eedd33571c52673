//! Naming schema for files and directories created by a workflow.
//!
//! These names are part of the checkpoint format; renaming any of them makes older
//! checkpoints unreadable.

/// Default parameter file looked up in the working directory.
pub const PAR_FILE: &str = "parameters.yaml";
/// Internal working directory.
pub const SCRATCH_DIR: &str = "scratch";
/// Permanent storage for checkpoints and results.
pub const OUTPUT_DIR: &str = "output";
/// Dump site for per-run log files.
pub const LOG_DIR: &str = "logs";
/// Prefix of the main log file.
pub const LOG_FILE: &str = "sfoutput";

/// Name of the scalar/flag configuration mapping.
pub const PARAMETERS: &str = "parameters";
/// Name of the filesystem-location configuration mapping.
pub const PATHS: &str = "paths";
/// Table inside the parameter file whose entries become the paths mapping.
pub const PATHS_TABLE: &str = "PATHS";

/// Extension of configuration snapshot files inside a checkpoint.
pub const SNAPSHOT_EXTENSION: &str = "json";
/// Extension of per-role state files inside a checkpoint.
pub const STATE_EXTENSION: &str = "state";

/// Prefix of environment variables overriding the parameter file.
pub const ENV_PREFIX: &str = "SEISFLOWS";

/// Parameter naming the first task to run (earlier tasks are skipped).
pub const RESUME_FROM: &str = "RESUME_FROM";
/// Parameter set once the workflow has no task left to run.
pub const FINISHED: &str = "FINISHED";
/// Parameter naming the last task to run.
pub const STOP_AFTER: &str = "STOP_AFTER";
/// Path where workflow-requested checkpoints are written.
pub const CHECKPOINT_PATH: &str = "CHECKPOINT";
