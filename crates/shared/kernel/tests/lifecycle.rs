mod common;

use common::{basic, catalog, scenario};
use seis_kernel::checkpoint::CheckpointStore;
use seis_kernel::domain::Role;
use seis_kernel::{Controller, KernelError, Phase, RunOutcome};
use seis_storage::Compression;
use tempfile::tempdir;

fn log(controller: &Controller) -> Vec<String> {
    basic(controller.session().unwrap()).log.clone()
}

#[test]
fn runs_every_task_then_repeats() {
    let tmp = tempdir().unwrap();
    let mut controller = Controller::new(catalog());
    controller.assemble(scenario(tmp.path()).with_parameter("ITERATIONS", 2)).unwrap();
    assert_eq!(controller.phase(), Phase::Assembled);

    assert_eq!(controller.run().unwrap(), RunOutcome::Completed);
    assert_eq!(controller.phase(), Phase::Running);
    assert_eq!(log(&controller), ["setup", "tick", "finish", "setup", "tick", "finish"]);
}

#[test]
fn only_one_way_into_a_session() {
    let tmp = tempdir().unwrap();
    let mut controller = Controller::new(catalog());
    controller.assemble(scenario(tmp.path())).unwrap();

    let again = controller.assemble(scenario(tmp.path()));
    assert!(matches!(again, Err(KernelError::InvalidTransition { .. })));
    let restore = controller.restore(tmp.path());
    assert!(matches!(restore, Err(KernelError::InvalidTransition { .. })));
    assert_eq!(controller.phase(), Phase::Assembled);

    let mut idle = Controller::new(catalog());
    assert!(matches!(idle.run(), Err(KernelError::InvalidTransition { .. })));
    assert!(matches!(idle.checkpoint(tmp.path()), Err(KernelError::InvalidTransition { .. })));
}

#[test]
fn failed_assembly_leaves_nothing() {
    let tmp = tempdir().unwrap();
    let mut controller = Controller::new(catalog());
    let err = controller.assemble(scenario(tmp.path()).with_parameter("SOLVER", "nope"));
    assert!(matches!(err, Err(KernelError::ModuleNotFound { role: Role::Solver, .. })));
    assert_eq!(controller.phase(), Phase::Failed);
    assert!(controller.session().is_none());
}

#[test]
fn flush_then_assemble_starts_clean() {
    let tmp = tempdir().unwrap();
    let mut controller = Controller::new(catalog());
    controller.assemble(scenario(tmp.path())).unwrap();
    controller.run().unwrap();
    assert_eq!(basic(controller.session().unwrap()).iteration, 1);

    controller.flush();
    assert_eq!(controller.phase(), Phase::Flushed);
    assert!(controller.session().is_none());
    assert!(!tmp.path().join("parameters.json").exists());

    controller.assemble(scenario(tmp.path())).unwrap();
    let fresh = basic(controller.session().unwrap());
    assert_eq!(fresh.iteration, 0);
    assert!(fresh.log.is_empty());
}

#[test]
fn stop_after_then_resume_continues_with_the_next_task() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("ckpt");
    let mut first = Controller::new(catalog());
    first.assemble(scenario(tmp.path()).with_parameter("STOP_AFTER", "tick")).unwrap();

    assert_eq!(first.run().unwrap(), RunOutcome::StoppedAfter("tick".into()));
    first.checkpoint(&dir).unwrap();
    assert_eq!(first.phase(), Phase::Checkpointed);
    first.flush();

    let summary = CheckpointStore::open_existing(&dir).unwrap().inspect().unwrap();
    assert_eq!(summary.config.get::<String>("RESUME_FROM").unwrap().as_deref(), Some("finish"));

    let mut second = Controller::new(catalog());
    second.restore(&dir).unwrap();
    second.session_mut().unwrap().config_mut().remove_parameter("STOP_AFTER");
    assert_eq!(second.run().unwrap(), RunOutcome::Completed);
    assert_eq!(log(&second), ["setup", "tick", "finish"]);
    assert!(second.session().unwrap().config().parameter("RESUME_FROM").is_none());
}

#[test]
fn workflow_cadence_checkpoint_survives_a_failure() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("cadence");
    let config = scenario(tmp.path())
        .with_parameter("CHECKPOINT_AFTER", "tick")
        .with_parameter("FAIL_AT", "finish")
        .with_path("CHECKPOINT", &dir);

    let mut controller = Controller::new(catalog()).with_compression(Compression::Lz4);
    assert!(controller.run().is_err());
    controller.assemble(config).unwrap();
    assert!(controller.run().is_err());
    assert_eq!(controller.phase(), Phase::Failed);
    assert!(matches!(controller.checkpoint(&dir), Err(KernelError::InvalidTransition { .. })));

    let (registry, saved) = CheckpointStore::open_existing(&dir).unwrap().load(&catalog()).unwrap();
    assert_eq!(saved.get::<String>("RESUME_FROM").unwrap().as_deref(), Some("finish"));
    let workflow = registry.get(Role::Workflow).and_then(|c| c.downcast_ref::<common::Basic>()).unwrap();
    assert_eq!(workflow.log, ["setup", "tick"]);
}

#[test]
fn stop_request_takes_effect_at_the_next_boundary() {
    let tmp = tempdir().unwrap();
    let mut controller = Controller::new(catalog());
    controller.assemble(scenario(tmp.path())).unwrap();

    let stop = controller.stop_handle();
    stop.request();
    assert_eq!(controller.run().unwrap(), RunOutcome::Interrupted { before: "setup".into() });
    assert!(log(&controller).is_empty());
    assert!(!stop.is_requested());

    assert_eq!(controller.run().unwrap(), RunOutcome::Completed);
    assert_eq!(log(&controller), ["setup", "tick", "finish"]);
}

#[test]
fn resume_from_must_name_a_task() {
    let tmp = tempdir().unwrap();
    let mut controller = Controller::new(catalog());
    controller.assemble(scenario(tmp.path()).with_parameter("RESUME_FROM", "warp")).unwrap();
    let err = controller.run().unwrap_err();
    assert!(err.to_string().contains("warp"));
    assert_eq!(controller.phase(), Phase::Failed);
}

#[test]
fn second_run_continues_after_a_stop() {
    let tmp = tempdir().unwrap();
    let mut controller = Controller::new(catalog());
    controller.assemble(scenario(tmp.path()).with_parameter("STOP_AFTER", "tick")).unwrap();
    assert_eq!(controller.run().unwrap(), RunOutcome::StoppedAfter("tick".into()));

    controller.session_mut().unwrap().config_mut().remove_parameter("STOP_AFTER");
    assert_eq!(controller.run().unwrap(), RunOutcome::Completed);
    assert_eq!(log(&controller), ["setup", "tick", "finish"]);
    assert_eq!(basic(controller.session().unwrap()).iteration, 1);

    assert_eq!(controller.run().unwrap(), RunOutcome::Completed);
    assert_eq!(log(&controller), ["setup", "tick", "finish"]);
}

#[test]
fn stopping_after_the_last_task_checkpoints_a_finished_run() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("ckpt");
    let mut first = Controller::new(catalog());
    first.assemble(scenario(tmp.path()).with_parameter("STOP_AFTER", "finish")).unwrap();
    assert_eq!(first.run().unwrap(), RunOutcome::StoppedAfter("finish".into()));
    first.checkpoint(&dir).unwrap();
    first.flush();

    let summary = CheckpointStore::open_existing(&dir).unwrap().inspect().unwrap();
    assert!(summary.config.parameter("RESUME_FROM").is_none());
    assert_eq!(summary.config.get::<bool>("FINISHED").unwrap(), Some(true));

    let mut second = Controller::new(catalog());
    second.restore(&dir).unwrap();
    second.session_mut().unwrap().config_mut().remove_parameter("STOP_AFTER");
    assert_eq!(second.run().unwrap(), RunOutcome::Completed);
    assert_eq!(log(&second), ["setup", "tick", "finish"]);
    assert_eq!(basic(second.session().unwrap()).iteration, 1);
}

#[test]
fn stop_requested_during_the_last_task_is_dropped() {
    let tmp = tempdir().unwrap();
    let mut controller = Controller::new(catalog());
    controller.assemble(scenario(tmp.path())).unwrap();
    let stop = controller.stop_handle();
    common::stop_during("finish", &stop);

    assert_eq!(controller.run().unwrap(), RunOutcome::Completed);
    assert!(!stop.is_requested());

    controller.flush();
    controller.assemble(scenario(tmp.path())).unwrap();
    assert_eq!(controller.run().unwrap(), RunOutcome::Completed);
    assert_eq!(log(&controller), ["setup", "tick", "finish"]);
}
