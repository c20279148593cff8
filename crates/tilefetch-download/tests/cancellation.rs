//! Cancellation and isolation of concurrent sessions driving real child
//! processes.
#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tilefetch_core::NoopSink;
use tilefetch_download::{
    CancellationRegistry, CommandSpec, JobId, JobKind, TransferError, TransferOutcome,
    TransferRequest, TransferSession,
};

fn session() -> TransferSession {
    TransferSession::new(CancellationRegistry::new(), Arc::new(NoopSink::new()))
}

fn shell_job(id: &str, script: &str, dest: &Path) -> TransferRequest {
    TransferRequest::new(
        JobId::new(id),
        JobKind::SingleFile,
        CommandSpec::new("sh").args(["-c", script]),
        dest,
    )
}

async fn wait_until_active(registry: &CancellationRegistry, id: &JobId) {
    while !registry.is_active(id) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn process_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .status()
        .is_ok_and(|status| status.success())
}

#[tokio::test]
async fn immediate_cancel_leaves_no_orphan_process() {
    let temp = TempDir::new().unwrap();
    let pid_file = temp.path().join("pid");
    let session = session();
    let registry = session.registry().clone();
    let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());

    let runner = tokio::spawn({
        let session = session.clone();
        let request = shell_job("early", &script, temp.path());
        async move { session.run(request).await }
    });
    wait_until_active(&registry, &JobId::new("early")).await;
    registry.signal(&JobId::new("early")).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, TransferOutcome::Cancelled);
    assert!(registry.active_jobs().is_empty());

    // The process may never have been started; if it was, it must be gone.
    if let Ok(pid) = std::fs::read_to_string(&pid_file) {
        assert!(!process_alive(pid.trim()));
    }
}

#[tokio::test]
async fn cancelling_one_job_does_not_affect_another() {
    let temp = TempDir::new().unwrap();
    let session = session();
    let registry = session.registry().clone();

    let slow = tokio::spawn({
        let session = session.clone();
        let request = shell_job("slow", "exec sleep 30", temp.path());
        async move { session.run(request).await }
    });
    let quick = tokio::spawn({
        let session = session.clone();
        let request = shell_job("quick", "sleep 0.3", temp.path());
        async move { session.run(request).await }
    });

    wait_until_active(&registry, &JobId::new("slow")).await;
    registry.signal(&JobId::new("slow")).unwrap();

    let slow = tokio::time::timeout(Duration::from_secs(5), slow).await.unwrap().unwrap();
    let quick = tokio::time::timeout(Duration::from_secs(5), quick).await.unwrap().unwrap();

    assert_eq!(slow, TransferOutcome::Cancelled);
    assert_eq!(
        quick,
        TransferOutcome::Completed {
            result_path: temp.path().to_path_buf()
        }
    );
    assert!(registry.active_jobs().is_empty());
}

#[tokio::test]
async fn cancel_after_completion_is_not_found() {
    let temp = TempDir::new().unwrap();
    let session = session();
    let outcome = session.run(shell_job("done", "exit 0", temp.path())).await;
    assert!(matches!(outcome, TransferOutcome::Completed { .. }));

    let err = session.registry().signal(&JobId::new("done")).unwrap_err();
    assert_eq!(err, TransferError::NotFound { id: JobId::new("done") });
}

#[tokio::test]
async fn same_id_can_run_again_after_termination() {
    let temp = TempDir::new().unwrap();
    let session = session();
    for _ in 0..2 {
        let outcome = session.run(shell_job("again", "exit 0", temp.path())).await;
        assert!(matches!(outcome, TransferOutcome::Completed { .. }));
    }
}
