//! End-to-end scenarios driven against the real, compiled `procmon` monitor
//! binary (via `CARGO_BIN_EXE_procmon`) rather than an in-process fake peer.

use std::time::Duration;

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::process_future::ProcessTerminationType;
use crate::process_manager::ProcessManager;

fn manager() -> std::sync::Arc<ProcessManager> {
    let mut config = EngineConfig::default();
    config.monitor_path = env!("CARGO_BIN_EXE_procmon").to_string();
    ProcessManager::new(&config)
}

#[tokio::test]
async fn happy_path_exit_zero() {
    let manager = manager();
    let pf = manager.create_process("/bin/true").await.unwrap();
    pf.get_result().await.unwrap();
    assert_eq!(pf.get_status_code().unwrap(), 0);
    assert_eq!(pf.get_process_termination_type().unwrap(), ProcessTerminationType::ProcessExited);
}

#[tokio::test]
async fn non_zero_exit_status_surfaces_as_typed_error() {
    let manager = manager();
    let pf = manager.create_process("/bin/false").await.unwrap();
    let err = pf.get_result().await.unwrap_err();
    assert_eq!(err, EngineError::TerminatedWithNonZeroStatus(1));
    assert_eq!(pf.get_status_code().unwrap(), 1);
    assert_eq!(pf.get_process_termination_type().unwrap(), ProcessTerminationType::ProcessExited);
}

#[tokio::test]
async fn timeout_then_completion() {
    let manager = manager();
    let pf = manager.create_process("/bin/sleep 2").await.unwrap();

    let timed_out = pf.get_result_timed(Duration::from_millis(200)).await;
    assert_eq!(timed_out.unwrap_err(), EngineError::TimeoutWaitingForResult);

    pf.get_result().await.unwrap();
    assert!(!pf.is_running());
}

#[tokio::test]
async fn cancel_kills_the_child_with_sigterm() {
    let manager = manager();
    let pf = manager.create_process("/bin/sleep 30").await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    pf.cancel().unwrap();
    assert!(pf.is_cancelled());

    let err = pf.get_result().await.unwrap_err();
    assert_eq!(err, EngineError::Killed);
    assert_eq!(pf.get_status_code().unwrap(), libc::SIGTERM);
    assert_eq!(pf.get_process_termination_type().unwrap(), ProcessTerminationType::ProcessKilled);
}

#[tokio::test]
async fn abandonment_leaves_the_child_running_and_reaps_the_monitor() {
    let manager = manager();
    let pf = manager.create_process("/bin/sleep 30").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pid = pf.get_process_pid();
    manager.abandon_process(&pf);

    let err = pf.get_result().await.unwrap_err();
    assert_eq!(err, EngineError::Abandoned);

    // the child itself is untouched by abandonment.
    assert_eq!(unsafe { libc::kill(pid, 0) }, 0);
    unsafe { libc::kill(pid, libc::SIGKILL) };
}

#[tokio::test]
async fn unreadable_input_file_surfaces_as_typed_error() {
    let manager = manager();
    let pf = manager.create_process_dont_run("/bin/sleep 1");
    pf.set_input_filename("/no/such/path/at/all").unwrap();

    let err = manager.run_process(&pf).await.unwrap_err();
    assert!(matches!(err, EngineError::UnableToOpenInputFile(_)));
}

#[tokio::test]
async fn concurrent_children_do_not_serialize_on_a_single_lock() {
    let manager = manager();
    let futures: Vec<_> = futures_join_all(&manager, 8).await;
    for pf in futures {
        pf.get_result().await.unwrap();
        assert_eq!(pf.get_process_termination_type().unwrap(), ProcessTerminationType::ProcessExited);
    }
}

async fn futures_join_all(manager: &ProcessManager, n: usize) -> Vec<std::sync::Arc<crate::process_future::ProcessFuture>> {
    let mut handles = Vec::with_capacity(n);
    for _ in 0..n {
        handles.push(manager.create_process("/bin/true").await.unwrap());
    }
    handles
}

#[tokio::test]
async fn get_info_reports_cmdline_and_positive_elapsed_time() {
    let manager = manager();
    let pf = manager.create_process("/bin/sleep 1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let info = pf.get_info().await.unwrap();
    assert_eq!(info.cmdline, "/bin/sleep 1");
    assert!(info.process_pid > 0);

    pf.get_result().await.unwrap();
}

#[tokio::test]
async fn ready_future_never_reports_running() {
    let manager = manager();
    let pf = manager.create_process_dont_run("/bin/true");
    assert!(!pf.is_running());
    // get_status_code is only legal once the future is terminal.
    assert_eq!(pf.get_status_code().unwrap_err(), EngineError::NotFinished);
}
