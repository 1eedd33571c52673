mod common;

use common::catalog;
use seis_kernel::checkpoint::CheckpointStore;
use seis_kernel::config::ConfigSnapshot;
use seis_kernel::domain::{Role, RoleSet};
use seis_kernel::{Controller, RunOutcome, Session};
use seis_workflow::Basic;
use std::path::Path;
use tempfile::tempdir;

fn config(root: &Path, iterations: u32) -> ConfigSnapshot {
    ConfigSnapshot::new()
        .with_parameter("SYSTEM", "local")
        .with_parameter("NTASK", 3)
        .with_parameter("WORKFLOW", "basic")
        .with_parameter("ITERATIONS", iterations)
        .with_path("SCRATCH", root.join("scratch"))
        .with_path("OUTPUT", root.join("output"))
        .with_path("LOG", root.join("logs"))
}

fn basic(session: &Session) -> &Basic {
    session.registry().get(Role::Workflow).and_then(|c| c.downcast_ref::<Basic>()).unwrap()
}

#[test]
fn every_task_reports_each_iteration() {
    let dir = tempdir().unwrap();
    let mut controller = Controller::new(catalog());
    controller.assemble(config(dir.path(), 2)).unwrap();
    assert_eq!(controller.run().unwrap(), RunOutcome::Completed);

    let basic = basic(controller.session().unwrap());
    assert_eq!(basic.iteration(), 2);
    assert_eq!(basic.counts(), [3, 3]);
    assert!(dir.path().join("output").is_dir(), "system setup did not run");
}

#[test]
fn checkpoints_after_each_tally() {
    let dir = tempdir().unwrap();
    let checkpoint = dir.path().join("checkpoint");
    let config = config(dir.path(), 3)
        .with_path("CHECKPOINT", &checkpoint)
        .with_parameter("STOP_AFTER", "tally");

    let mut controller = Controller::new(catalog());
    controller.assemble(config).unwrap();
    assert_eq!(controller.run().unwrap(), RunOutcome::StoppedAfter("tally".into()));
    controller.flush();

    let summary = CheckpointStore::open_existing(&checkpoint).unwrap().inspect().unwrap();
    assert_eq!(summary.active(), RoleSet::SYSTEM | RoleSet::WORKFLOW);
    assert_eq!(summary.config.parameter("RESUME_FROM"), Some(&serde_json::json!("setup")));

    controller.restore(&checkpoint).unwrap();
    controller.session_mut().unwrap().config_mut().remove_parameter("STOP_AFTER");
    assert_eq!(controller.run().unwrap(), RunOutcome::Completed);
    assert_eq!(basic(controller.session().unwrap()).counts(), [3, 3, 3]);
}
