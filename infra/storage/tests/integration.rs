use seis_storage::*;
use tempfile::TempDir;

fn open(temp: &TempDir) -> Storage {
    Storage::builder().root(temp.path()).open().unwrap()
}

#[test]
fn path_traversal_blocked() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp);

    assert!(storage.resolve("../etc/passwd").is_err());
    assert!(storage.resolve("foo/../../bar").is_err());
    assert!(storage.write("../escape.state", b"x").is_err());
}

#[test]
fn write_read_roundtrip_uncompressed() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp);

    storage.write("iter_001/solver.state", b"hello world").unwrap();
    assert_eq!(storage.read("iter_001/solver.state").unwrap(), b"hello world");
    assert_eq!(std::fs::read(temp.path().join("iter_001/solver.state")).unwrap(), b"hello world");
}

#[test]
fn write_read_roundtrip_compressed() {
    let temp = TempDir::new().unwrap();
    let storage =
        Storage::builder().root(temp.path()).compression(Compression::Lz4).open().unwrap();

    let payload = vec![1u8; 4096];
    storage.write("optimize.state", &payload).unwrap();

    assert!(std::fs::metadata(temp.path().join("optimize.state")).unwrap().len() < 4096);
    assert_eq!(storage.read("optimize.state").unwrap(), payload);
}

#[test]
fn overwrite_replaces_contents_without_leftovers() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp);

    storage.write("parameters.json", b"{\"A\": 1}").unwrap();
    storage.write("parameters.json", b"{\"A\": 2}").unwrap();

    assert_eq!(storage.read("parameters.json").unwrap(), b"{\"A\": 2}");
    assert_eq!(storage.list("").unwrap(), vec!["parameters.json".to_owned()]);
}

#[test]
fn list_is_sorted_and_skips_directories() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp);

    storage.write("workflow.state", b"w").unwrap();
    storage.write("system.state", b"s").unwrap();
    storage.write("nested/solver.state", b"n").unwrap();

    assert_eq!(storage.list(".").unwrap(), ["system.state", "workflow.state"]);
    assert!(matches!(storage.list("absent"), Err(StorageError::FileNotFound { .. })));
}

#[test]
fn missing_root_without_create_fails() {
    let temp = TempDir::new().unwrap();
    let result = Storage::builder().root(temp.path().join("nope")).create(false).open();
    assert!(matches!(result, Err(StorageError::Io { .. })));
}

#[test]
fn read_missing_returns_file_not_found() {
    let temp = TempDir::new().unwrap();
    let storage = open(&temp);

    let err = storage.read("missing.bin").expect_err("expected error");
    match err {
        StorageError::FileNotFound { .. } => {},
        other => panic!("unexpected error: {other:?}"),
    }
}
