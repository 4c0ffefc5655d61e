//! `ProcessManager`: spawns a dedicated monitor helper per supervised child,
//! owns the weak `fd -> ProcessFuture` back-reference table, and routes
//! inbound PDUs from each peer to the right future.

use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dusa_collection_utils::core::logger::LogLevel;
use dusa_collection_utils::log;
use tokio::net::UnixStream;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::pdu_peer::{BufferPolicy, PDUPeer, PDUPeerEvent};
use crate::process_future::ProcessFuture;

struct Supervised {
    future: Weak<ProcessFuture>,
    peer: Arc<PDUPeer>,
}

/// Owns the monitor binary path, the live peer table, and the background
/// reaper for abandoned processes.
pub struct ProcessManager {
    monitor_path: String,
    buffer_policy: BufferPolicy,
    children: Arc<Mutex<HashMap<RawFd, Supervised>>>,
    abandon_tx: mpsc::UnboundedSender<RawFd>,
    temp_counter: AtomicU64,
}

/// The outcome of [`ProcessManager::create_process_and_get_result`]: the
/// terminal result alongside the captured output/error text, since the
/// temporary capture files are unlinked before this returns.
pub struct ProcessOutcome {
    pub result: Result<(), EngineError>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessManager {
    pub fn new(config: &EngineConfig) -> Arc<Self> {
        let (abandon_tx, mut abandon_rx) = mpsc::unbounded_channel::<RawFd>();
        let children: Arc<Mutex<HashMap<RawFd, Supervised>>> = Arc::new(Mutex::new(HashMap::new()));

        let reaper_children = children.clone();
        tokio::spawn(async move {
            while let Some(fd) = abandon_rx.recv().await {
                if let Some(supervised) = reaper_children.lock().await.remove(&fd) {
                    supervised.peer.close();
                }
            }
        });

        Arc::new(ProcessManager {
            monitor_path: config.monitor_path.clone(),
            buffer_policy: config.buffer_policy(),
            children,
            abandon_tx,
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Creates a future in `Ready` state without starting it.
    pub fn create_process_dont_run(&self, cmdline: impl Into<String>) -> Arc<ProcessFuture> {
        ProcessFuture::new(cmdline, self.abandon_tx.clone())
    }

    /// Creates a future and immediately runs it.
    pub async fn create_process(&self, cmdline: impl Into<String>) -> Result<Arc<ProcessFuture>, EngineError> {
        let pf = self.create_process_dont_run(cmdline);
        self.run_process(&pf).await?;
        Ok(pf)
    }

    /// Spawns the monitor helper, wraps the management socket in a
    /// [`PDUPeer`], registers the weak back-reference, and drives the
    /// future's own `run`.
    pub async fn run_process(&self, pf: &Arc<ProcessFuture>) -> Result<(), EngineError> {
        let (stream, monitor_pid) = self.spawn_monitor().await?;

        let pf_for_events = pf.clone();
        let peer = PDUPeer::spawn(stream, self.buffer_policy, move |event| match event {
            PDUPeerEvent::ReceivedPDU(pdu) => {
                let pf = pf_for_events.clone();
                tokio::spawn(async move { pf.handle_pdu(pdu).await });
            }
            PDUPeerEvent::Disconnected | PDUPeerEvent::SendError => pf_for_events.handle_error(),
            PDUPeerEvent::Connected => {}
        });

        log!(LogLevel::Trace, "spawned monitor pid {} for fd {}", monitor_pid, peer.raw_fd());

        self.children.lock().await.insert(
            peer.raw_fd(),
            Supervised { future: Arc::downgrade(pf), peer: peer.clone() },
        );

        pf.run(peer).await
    }

    /// Drops supervision of `pf` without waiting for it to terminate.
    pub fn abandon_process(&self, pf: &Arc<ProcessFuture>) {
        pf.abandon();
    }

    /// Returns every still-live supervised future. Dead weak references are
    /// simply skipped, not removed — removal happens only through the
    /// abandon path or (eventually) through the peer's own disconnect
    /// handling, keeping this a read-only snapshot taken with the lock held
    /// only long enough to collect it.
    pub async fn live_processes(&self) -> Vec<Arc<ProcessFuture>> {
        self.children.lock().await.values().filter_map(|s| s.future.upgrade()).collect()
    }

    /// Convenience wrapper: runs `cmdline` with both stdout and stderr
    /// captured to temporary files under `/tmp`, waits (optionally bounded
    /// by `timeout`), then unlinks the temporary files and returns their
    /// contents alongside the terminal result.
    pub async fn create_process_and_get_result(
        &self,
        cmdline: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutcome, EngineError> {
        let pf = self.create_process_dont_run(cmdline);
        let out_path = self.temp_capture_path("out");
        let err_path = self.temp_capture_path("err");
        pf.set_output_filename(out_path.clone())?;
        pf.set_error_filename(err_path.clone())?;

        self.run_process(&pf).await?;

        let result = match timeout {
            Some(deadline) => pf.get_result_timed(deadline).await,
            None => pf.get_result().await,
        };

        let stderr = pf.get_error_string().unwrap_or_default();
        // On a non-zero exit, stdout is substituted with the captured
        // stderr text rather than the (likely empty or irrelevant) normal
        // stdout capture.
        let stdout = if matches!(result, Err(EngineError::TerminatedWithNonZeroStatus(_))) {
            stderr.clone()
        } else {
            pf.get_output_string().unwrap_or_default()
        };
        let _ = std::fs::remove_file(&out_path);
        let _ = std::fs::remove_file(&err_path);

        Ok(ProcessOutcome { result, stdout, stderr })
    }

    fn temp_capture_path(&self, kind: &str) -> String {
        let n = self.temp_counter.fetch_add(1, Ordering::SeqCst);
        format!("/tmp/procmon-{}-{}-{}.cap", std::process::id(), kind, n)
    }

    /// Opens a UNIX-domain socket pair, execs the monitor binary handing it
    /// the fd number of its end, and reaps the monitor process
    /// asynchronously once it exits. The monitor is a direct, reapable
    /// child of this process rather than a double-forked, init-reparented
    /// daemon (see DESIGN.md) — a disconnected peer already drives the
    /// owning future to `Error` via `handle_error`, so surviving a manager
    /// crash buys nothing this design needs.
    async fn spawn_monitor(&self) -> Result<(UnixStream, i32), EngineError> {
        let (manager_std, monitor_std) = std::os::unix::net::UnixStream::pair()
            .map_err(|e| EngineError::UnableToCreateSocket(e.to_string()))?;
        manager_std
            .set_nonblocking(true)
            .map_err(|e| EngineError::UnableToCreateSocket(e.to_string()))?;
        let manager_stream =
            UnixStream::from_std(manager_std).map_err(|e| EngineError::UnableToCreateSocket(e.to_string()))?;

        let monitor_fd = monitor_std.as_raw_fd();
        let mut command = Command::new(&self.monitor_path);
        command.arg(monitor_fd.to_string());
        // SAFETY: only calls async-signal-safe fcntl in the child between
        // fork and exec, clearing close-on-exec so the monitor inherits the
        // socket fd it was told about via argv.
        unsafe {
            command.pre_exec(move || {
                if libc::fcntl(monitor_fd, libc::F_SETFD, 0) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let mut child = command
            .spawn()
            .map_err(|e| EngineError::UnableToCreateProcmon(e.to_string()))?;
        drop(monitor_std);

        let monitor_pid = child.id().unwrap_or(0) as i32;
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => log!(LogLevel::Trace, "monitor pid {} exited: {}", monitor_pid, status),
                Err(e) => log!(LogLevel::Error, "failed waiting on monitor pid {}: {}", monitor_pid, e),
            }
        });

        Ok((manager_stream, monitor_pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        // a no-op monitor binary used only to exercise the manager's own
        // bookkeeping in tests that don't need a live PDU exchange.
        config.monitor_path = "/bin/true".into();
        config
    }

    #[tokio::test]
    async fn create_process_dont_run_starts_in_ready_state() {
        let manager = ProcessManager::new(&test_config());
        let pf = manager.create_process_dont_run("/bin/true");
        assert!(!pf.is_running());
    }

    #[tokio::test]
    async fn abandon_process_completes_with_abandoned() {
        let manager = ProcessManager::new(&test_config());
        let pf = manager.create_process_dont_run("/bin/true");
        manager.abandon_process(&pf);
        assert_eq!(pf.get_result().await.unwrap_err(), EngineError::Abandoned);
    }

    #[tokio::test]
    async fn live_processes_reports_nothing_for_an_empty_table() {
        let manager = ProcessManager::new(&test_config());
        assert!(manager.live_processes().await.is_empty());
    }
}
