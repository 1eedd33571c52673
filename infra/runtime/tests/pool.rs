use seis_runtime::{RuntimeConfig, RuntimeError, WorkerPool};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn pool() -> WorkerPool {
    WorkerPool::new(&RuntimeConfig::lightweight()).unwrap()
}

#[test]
fn results_are_ordered_by_task_id() {
    let out = pool()
        .map(8, 3, |task_id| {
            std::thread::sleep(Duration::from_millis(((8 - task_id) * 2) as u64));
            Ok::<_, String>(task_id * 10)
        })
        .unwrap();
    assert_eq!(out, [0, 10, 20, 30, 40, 50, 60, 70]);
}

#[test]
fn concurrency_never_exceeds_limit() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (r, p) = (Arc::clone(&running), Arc::clone(&peak));

    pool()
        .run(12, 2, move |_| {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            r.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, String>(())
        })
        .unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[test]
fn failure_is_surfaced_after_all_jobs_finish() {
    let finished = Arc::new(AtomicUsize::new(0));
    let done = Arc::clone(&finished);

    let err = pool()
        .run(6, 4, move |task_id| {
            done.fetch_add(1, Ordering::SeqCst);
            if task_id == 2 || task_id == 4 { Err(format!("bad trace {task_id}")) } else { Ok(()) }
        })
        .unwrap_err();

    assert_eq!(finished.load(Ordering::SeqCst), 6);
    match err {
        RuntimeError::Task { task_id, failed, total, message, .. } => {
            assert_eq!((task_id, failed, total), (2, 2, 6));
            assert_eq!(message, "bad trace 2");
        },
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn panics_are_reported_as_aborted() {
    let err = pool()
        .run(3, 3, |task_id| {
            assert!(task_id != 1, "solver crashed");
            Ok::<_, String>(())
        })
        .unwrap_err();

    assert!(matches!(err, RuntimeError::Aborted { task_id: 1, .. }));
    assert!(err.to_string().contains("solver crashed"));
}

#[test]
fn zero_tasks_is_a_no_op() {
    let out = pool().map(0, 1, |_| Ok::<u8, String>(1)).unwrap();
    assert!(out.is_empty());
}
