mod common;

use common::{Basic, basic, catalog, scenario};
use seis_kernel::checkpoint::CheckpointStore;
use seis_kernel::domain::{Role, RoleSet};
use seis_kernel::registry::Slot;
use seis_kernel::{KernelError, SAFE_ALPHABET, Session};
use seis_storage::Compression;
use std::fs;
use tempfile::tempdir;

#[test]
fn scenario_survives_a_fresh_catalog() {
    let tmp = tempdir().unwrap();
    let session = Session::assemble(scenario(tmp.path()), catalog()).unwrap();
    let expected = RoleSet::SYSTEM | RoleSet::SOLVER | RoleSet::WORKFLOW;
    assert_eq!(session.registry().roles(), expected);

    let dir = tmp.path().join("ckpt");
    CheckpointStore::open(&dir, Compression::None)
        .unwrap()
        .save(session.registry(), session.config())
        .unwrap();
    drop(session);

    let (registry, _) = CheckpointStore::open_existing(&dir).unwrap().load(&catalog()).unwrap();
    assert_eq!(registry.roles(), expected);
    for role in [Role::Preprocess, Role::Postprocess, Role::Optimize] {
        assert!(matches!(registry.slot(role), Slot::Disabled), "{role}");
    }
}

#[test]
fn unknown_implementation_names_role_and_name() {
    let tmp = tempdir().unwrap();
    let config = scenario(tmp.path()).with_parameter("OPTIMIZE", "steepest-descent");
    let err = Session::assemble(config, catalog()).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("optimize"), "{message}");
    assert!(message.contains("steepest-descent"), "{message}");
    assert!(message.contains("SteepestDescent"), "{message}");
}

#[test]
fn unavailable_implementations_are_import_failures() {
    let tmp = tempdir().unwrap();
    let probe_fails = scenario(tmp.path()).with_parameter("PREPROCESS", "missing_bin");
    let err = Session::assemble(probe_fails, catalog()).unwrap_err();
    assert!(matches!(err, KernelError::ImportFailure { role: Role::Preprocess, .. }), "{err}");
    assert!(err.to_string().contains("not found on PATH"));

    let not_built = scenario(tmp.path()).with_parameter("OPTIMIZE", "LBFGS");
    let err = Session::assemble(not_built, catalog()).unwrap_err();
    assert!(err.to_string().contains("optimize` feature"), "{err}");
}

#[test]
fn missing_required_path_stops_assembly() {
    let config = seis_kernel::config::ConfigSnapshot::new().with_parameter("SOLVER", "my_solver");
    let err = Session::assemble(config, catalog()).unwrap_err();
    assert!(matches!(err, KernelError::MissingKey { role: Role::Solver, kind: "path", .. }));
    assert!(err.to_string().contains("initial model directory"));
}

#[test]
fn capability_is_checked_on_first_use() {
    let tmp = tempdir().unwrap();
    let config = scenario(tmp.path()).with_parameter("POSTPROCESS", "bare");
    let session = Session::assemble(config, catalog()).unwrap();
    assert!(session.registry().roles().has(Role::Postprocess));

    let err = session.postprocess().err().expect("postprocess should fail the capability check");
    assert!(matches!(err, KernelError::Contract { capability: "Postprocess", .. }), "{err}");
    assert!(session.preprocess().unwrap().is_none());
    assert_eq!(session.solver().unwrap().map(|s| s.nproc()), Some(1));
}

#[test]
fn invoke_returns_the_component_to_its_slot() {
    let tmp = tempdir().unwrap();
    let mut session =
        Session::assemble(scenario(tmp.path()).with_parameter("FAIL_AT", "finish"), catalog()).unwrap();

    session.invoke(Role::Workflow, "tick").unwrap();
    assert!(session.invoke(Role::Workflow, "finish").is_err());
    let err = session.invoke(Role::Workflow, "dance").unwrap_err();
    assert!(matches!(err, KernelError::StateDrift { .. }), "{err}");

    assert!(session.registry().slot(Role::Workflow).is_active());
    assert_eq!(basic(&session).iteration, 1);
    assert!(matches!(
        session.invoke(Role::Optimize, "step"),
        Err(KernelError::Validation { .. })
    ));
}

#[test]
fn submit_fans_out_over_the_system() {
    let tmp = tempdir().unwrap();
    let scratch = tmp.path().join("scratch");
    fs::create_dir_all(&scratch).unwrap();
    let config = scenario(tmp.path()).with_parameter("NTASK", 3).with_path("SCRATCH", &scratch);
    let mut session = Session::assemble(config, catalog()).unwrap();

    session.invoke(Role::Workflow, "setup").unwrap();
    for id in 0..3 {
        assert!(scratch.join(format!("touch_{id}_0")).is_file());
    }

    let owner = session.registry().get(Role::Workflow).unwrap();
    let report = session.submit(owner, "touch", true).unwrap();
    assert_eq!(report.label, "workflow.touch");
    assert_eq!(report.task_ids, [0]);
    assert!(session.submit(owner, "dance", true).is_err());
}

#[test]
fn submit_requires_a_system() {
    let tmp = tempdir().unwrap();
    let config = scenario(tmp.path()).with_parameter("SYSTEM", serde_json::Value::Null);
    let session = Session::assemble(config, catalog()).unwrap();
    let owner = session.registry().get(Role::Workflow).unwrap();
    assert!(session.submit(owner, "touch", false).is_err());
}

#[test]
fn run_ids_are_unambiguous() {
    let tmp = tempdir().unwrap();
    let a = Session::assemble(scenario(tmp.path()), catalog()).unwrap();
    let b = Session::assemble(scenario(tmp.path()), catalog()).unwrap();
    assert_ne!(a.run_id(), b.run_id());
    assert_eq!(a.run_id().len(), 12);
    assert!(a.run_id().chars().all(|ch| SAFE_ALPHABET.contains(&ch)));
    assert!(a.registry().get(Role::Workflow).unwrap().downcast_ref::<Basic>().is_some());
}
