use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn seisflows(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_seisflows"));
    cmd.current_dir(cwd);
    cmd
}

fn write_parameters(root: &Path) -> std::path::PathBuf {
    let file = root.join("parameters.yaml");
    let text = format!(
        "SYSTEM: local\nNTASK: 2\nWORKFLOW: basic\nITERATIONS: 2\nPATHS:\n  SCRATCH: {0}/scratch\n  OUTPUT: {0}/output\n  LOG: {0}/logs\n  CHECKPOINT: {0}/checkpoint\n",
        root.display()
    );
    fs::write(&file, text).unwrap();
    file
}

#[test]
fn check_lists_every_role() {
    let dir = tempdir().unwrap();
    let parameters = write_parameters(dir.path());

    seisflows(dir.path())
        .args(["check", "--parameters"])
        .arg(&parameters)
        .assert()
        .success()
        .stdout(predicate::str::contains("basic (Basic): setup -> dispatch -> tally"))
        .stdout(predicate::str::contains("local (Local)"))
        .stdout(predicate::str::contains("optimize     disabled"));
}

#[test]
fn stop_status_and_resume_across_processes() {
    let dir = tempdir().unwrap();
    let parameters = write_parameters(dir.path());
    let checkpoint = dir.path().join("checkpoint");

    seisflows(dir.path())
        .args(["run", "--stop-after", "tally", "--parameters"])
        .arg(&parameters)
        .assert()
        .success();
    assert!(checkpoint.join("workflow.state").is_file());

    seisflows(dir.path())
        .arg("status")
        .arg(&checkpoint)
        .assert()
        .success()
        .stdout(predicate::str::contains("workflow     basic (Basic"))
        .stdout(predicate::str::contains("solver       disabled"));

    seisflows(dir.path()).arg("resume").arg(&checkpoint).assert().success();
    assert!(dir.path().join("logs").is_dir());
    let tally = dir.path().join("scratch/basic");
    for task_id in 0..2 {
        let marker = fs::read_to_string(tally.join(format!("task_{task_id:03}"))).unwrap();
        assert_eq!(marker, "1", "task {task_id} did not continue from the saved iteration");
    }
    let saved = fs::read_to_string(checkpoint.join("parameters.json")).unwrap();
    assert!(saved.contains("\"FINISHED\": true"), "{saved}");

    fs::remove_dir_all(&tally).unwrap();
    seisflows(dir.path()).arg("resume").arg(&checkpoint).assert().success();
    assert!(!tally.exists(), "a finished workflow ran again");
}

#[test]
fn environment_overrides_the_parameter_file() {
    let dir = tempdir().unwrap();
    let parameters = write_parameters(dir.path());
    let elsewhere = dir.path().join("elsewhere");

    seisflows(dir.path())
        .args(["run", "--parameters"])
        .arg(&parameters)
        .env("SEISFLOWS__NTASK", "3")
        .env("SEISFLOWS__PATHS__SCRATCH", &elsewhere)
        .assert()
        .success();

    assert!(!dir.path().join("scratch").exists());
    let tally = elsewhere.join("basic");
    for task_id in 0..3 {
        assert_eq!(fs::read_to_string(tally.join(format!("task_{task_id:03}"))).unwrap(), "1");
    }
}

#[test]
fn status_of_a_missing_checkpoint_fails() {
    let dir = tempdir().unwrap();
    seisflows(dir.path())
        .args(["status", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn unknown_implementation_is_reported() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("parameters.yaml");
    fs::write(&file, "SYSTEM: slurm\n").unwrap();

    seisflows(dir.path())
        .args(["check", "--parameters"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Slurm"));
}
