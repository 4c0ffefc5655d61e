//! `ProcessFuture`: the per-child state machine, exception mapping, and
//! result access.

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dusa_collection_utils::core::logger::LogLevel;
use dusa_collection_utils::log;
use tokio::sync::{mpsc, oneshot, Notify};

use crate::clock::Timespec;
use crate::errors::EngineError;
use crate::future::{Future, FutureError};
use crate::monitor_protocol::{
    ProcessControlReqPdu, ProcessControlResPdu, ProcessInfoReqPdu, ProcessInfoResPdu, ProcessParamCode,
    ProcessParamPdu, ProcessStatusPdu, ProcessStatusType,
};
use crate::pdu::Pdu;
use crate::pdu_peer::PDUPeer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Starting,
    Running,
    Error,
    Exited,
    Killed,
    Stopped,
    Abandoned,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Error | ProcessState::Exited | ProcessState::Killed | ProcessState::Abandoned)
    }

    pub fn is_active(self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Running | ProcessState::Stopped)
    }

    pub fn is_running(self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Stopped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessTerminationType {
    ProcessExited,
    ProcessKilled,
    ProcessStopped,
    ProcessUnknownTermination,
}

pub type ProcessCompleteCallback = Box<dyn Fn(Arc<ProcessFuture>) + Send + Sync>;

pub struct ProcessInfo {
    pub started_by: String,
    pub started_by_pid: i32,
    pub start_time: Timespec,
    pub elapsed: Timespec,
    pub cmdline: String,
    pub cwd: String,
    pub monitor_pid: i32,
    pub process_pid: i32,
}

struct Inner {
    state: ProcessState,
    cmdline: String,
    cwd: String,
    infile: String,
    outfile: String,
    errfile: String,
    env: HashMap<String, String>,
    callback: Option<ProcessCompleteCallback>,
    status_code: Option<i32>,
    termination_type: Option<ProcessTerminationType>,
    peer: Option<Arc<PDUPeer>>,
    start_time: Option<Timespec>,
}

/// A handle to a process managed by the engine. Completion is modeled
/// directly with [`Future<()>`]: the producer (this module's own
/// state-transition code) sets the value on a clean exit and the typed
/// exception on every other terminal outcome, so `get_result`/
/// `get_result_timed` are thin wrappers over the generic future.
pub struct ProcessFuture {
    inner: Mutex<Inner>,
    completion: Future<()>,
    starting_done: Notify,
    pending_info: tokio::sync::Mutex<Option<oneshot::Sender<ProcessInfoResPdu>>>,
    monitor_pid: AtomicI32,
    process_pid: AtomicI32,
    abandon_tx: mpsc::UnboundedSender<RawFd>,
}

impl ProcessFuture {
    pub fn new(cmdline: impl Into<String>, abandon_tx: mpsc::UnboundedSender<RawFd>) -> Arc<Self> {
        Arc::new(ProcessFuture {
            inner: Mutex::new(Inner {
                state: ProcessState::Ready,
                cmdline: cmdline.into(),
                cwd: String::new(),
                infile: "/dev/null".into(),
                outfile: "/dev/null".into(),
                errfile: "/dev/null".into(),
                env: HashMap::new(),
                callback: None,
                status_code: None,
                termination_type: None,
                peer: None,
                start_time: None,
            }),
            completion: Future::new(),
            starting_done: Notify::new(),
            pending_info: tokio::sync::Mutex::new(None),
            monitor_pid: AtomicI32::new(-1),
            process_pid: AtomicI32::new(-1),
            abandon_tx,
        })
    }

    fn state(&self) -> ProcessState {
        self.inner.lock().expect("process future mutex poisoned").state
    }

    /// Mutates configuration fields that are only legal in `Ready`.
    fn configure<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, EngineError> {
        let mut inner = self.inner.lock().expect("process future mutex poisoned");
        if inner.state != ProcessState::Ready {
            return Err(EngineError::Started);
        }
        Ok(f(&mut inner))
    }

    pub fn set_current_working_directory(&self, cwd: impl Into<String>) -> Result<(), EngineError> {
        self.configure(|inner| inner.cwd = cwd.into())
    }

    pub fn set_environment(&self, env: HashMap<String, String>) -> Result<(), EngineError> {
        self.configure(|inner| inner.env = env)
    }

    pub fn set_input_filename(&self, path: impl Into<String>) -> Result<(), EngineError> {
        self.configure(|inner| inner.infile = path.into())
    }

    pub fn set_output_filename(&self, path: impl Into<String>) -> Result<(), EngineError> {
        self.configure(|inner| inner.outfile = path.into())
    }

    pub fn set_error_filename(&self, path: impl Into<String>) -> Result<(), EngineError> {
        self.configure(|inner| inner.errfile = path.into())
    }

    pub fn set_process_complete_callback(&self, cb: ProcessCompleteCallback) -> Result<(), EngineError> {
        self.configure(|inner| inner.callback = Some(cb))
    }

    pub fn get_command(&self) -> String {
        self.inner.lock().expect("process future mutex poisoned").cmdline.clone()
    }

    pub fn get_monitor_pid(&self) -> i32 {
        self.monitor_pid.load(Ordering::SeqCst)
    }

    pub fn get_process_pid(&self) -> i32 {
        self.process_pid.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn is_cancelled(&self) -> bool {
        self.completion.is_cancelled()
    }

    /// Brings a `Ready` future to life: attaches the management channel,
    /// sends the five `Param` PDUs (cmdline, cwd, infile, outfile, errfile —
    /// always five, not four; see the supplemented-features note), then
    /// `ControlReq{Start}`, then waits for the state to leave `Starting`.
    pub async fn run(self: &Arc<Self>, peer: Arc<PDUPeer>) -> Result<(), EngineError> {
        let (cmdline, cwd, infile, outfile, errfile) = {
            let mut inner = self.inner.lock().expect("process future mutex poisoned");
            if inner.state != ProcessState::Ready {
                return Err(EngineError::Started);
            }
            inner.state = ProcessState::Starting;
            inner.peer = Some(peer.clone());
            inner.start_time = Some(Timespec::from_duration(
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default(),
            ));
            (inner.cmdline.clone(), inner.cwd.clone(), inner.infile.clone(), inner.outfile.clone(), inner.errfile.clone())
        };

        log!(LogLevel::Trace, "sending process parameters for '{}'", cmdline);

        // Register for the startup-complete wakeup before sending a single
        // byte: the monitor can reply fast enough that `handle_control_res`
        // calls `notify_waiters` before this task would otherwise reach an
        // unregistered `.await`, which would park this waiter past the only
        // notification it will ever get.
        let starting_done = self.starting_done.notified();
        tokio::pin!(starting_done);
        starting_done.as_mut().enable();

        for (param, value) in [
            (ProcessParamCode::Cmdline, cmdline),
            (ProcessParamCode::Cwd, cwd),
            (ProcessParamCode::Infile, infile),
            (ProcessParamCode::Outfile, outfile),
            (ProcessParamCode::Errfile, errfile),
        ] {
            peer.send(ProcessParamPdu { param, value }.to_pdu())?;
        }
        peer.send(ProcessControlReqPdu::start().to_pdu())?;

        starting_done.await;

        match self.state() {
            // `handle_control_res` already mapped the monitor's result code
            // through `into_engine_error` and routed it into `completion`
            // before waking this waiter; read the same typed exception back
            // instead of rebuilding a generic one from the raw string.
            ProcessState::Error => Err(self.completion.get_result().await.unwrap_err()),
            _ => Ok(()),
        }
    }

    pub fn signal(&self, signum: i32) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::NotRunning);
        }
        let peer = self
            .inner
            .lock()
            .expect("process future mutex poisoned")
            .peer
            .clone()
            .ok_or(EngineError::NotRunning)?;
        peer.send(ProcessControlReqPdu::signal(signum).to_pdu())
    }

    /// Sends `SIGTERM` and marks the advisory cancellation flag; the
    /// terminal `Killed` transition arrives later via the normal status
    /// path, not synchronously here.
    pub fn cancel(&self) -> Result<(), EngineError> {
        self.completion.cancel();
        self.signal(libc::SIGTERM)
    }

    pub async fn get_result(&self) -> Result<(), EngineError> {
        self.completion.get_result().await
    }

    pub async fn get_result_timed(&self, timeout: Duration) -> Result<(), EngineError> {
        self.completion.get_result_timed(timeout).await
    }

    fn require_terminal<R>(&self, f: impl FnOnce(&Inner) -> R) -> Result<R, EngineError> {
        let inner = self.inner.lock().expect("process future mutex poisoned");
        if !inner.state.is_terminal() {
            return Err(EngineError::NotFinished);
        }
        Ok(f(&inner))
    }

    pub fn get_status_code(&self) -> Result<i32, EngineError> {
        self.require_terminal(|inner| inner.status_code.unwrap_or(-1))
    }

    pub fn get_process_termination_type(&self) -> Result<ProcessTerminationType, EngineError> {
        self.require_terminal(|inner| inner.termination_type.unwrap_or(ProcessTerminationType::ProcessUnknownTermination))
    }

    pub fn get_output_string(&self) -> Result<String, EngineError> {
        let path = self.require_terminal(|inner| inner.outfile.clone())?;
        read_captured_file(&path)
    }

    pub fn get_error_string(&self) -> Result<String, EngineError> {
        let path = self.require_terminal(|inner| inner.errfile.clone())?;
        read_captured_file(&path)
    }

    /// Sends `InfoReq` and awaits the next `InfoRes` reply, combining it
    /// with the locally captured start time to compute elapsed time.
    pub async fn get_info(&self) -> Result<ProcessInfo, EngineError> {
        let peer = self
            .inner
            .lock()
            .expect("process future mutex poisoned")
            .peer
            .clone()
            .ok_or(EngineError::NotStarted)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending_info.lock().await;
            *pending = Some(tx);
        }
        peer.send(ProcessInfoReqPdu.to_pdu())?;

        let reply = rx.await.map_err(|_| EngineError::InvalidPeer)?;
        let start_time = self
            .inner
            .lock()
            .expect("process future mutex poisoned")
            .start_time
            .unwrap_or_else(Timespec::zero);

        Ok(ProcessInfo {
            started_by: reply.started_by,
            started_by_pid: reply.started_by_pid,
            start_time,
            elapsed: Timespec::new(reply.elapsed.seconds, (reply.elapsed.micros * 1000) as u32),
            cmdline: reply.cmdline,
            cwd: reply.cwd,
            monitor_pid: reply.monitor_pid,
            process_pid: reply.process_pid,
        })
    }

    /// Drops supervision without waiting for the child to terminate: sets
    /// state to `Abandoned` and asks the manager to close the peer, which
    /// causes the monitor to exit. Any non-terminal state may move to
    /// `Abandoned`; terminal states are left untouched.
    pub fn abandon(self: &Arc<Self>) {
        let fd = {
            let inner = self.inner.lock().expect("process future mutex poisoned");
            if inner.state.is_terminal() {
                return;
            }
            inner.peer.as_ref().map(|p| p.raw_fd())
        };
        self.set_state(ProcessState::Abandoned, None, None, Some(EngineError::Abandoned));
        if let Some(fd) = fd {
            let _ = self.abandon_tx.send(fd);
        }
    }

    /// Dispatches one received PDU. Inbound PDUs from a single peer are
    /// delivered in arrival order and processed strictly sequentially by
    /// the caller (the manager's engine loop awaits this call before
    /// reading the next PDU for the same peer).
    pub async fn handle_pdu(self: &Arc<Self>, pdu: Pdu) {
        use crate::monitor_protocol::opcode;
        match pdu.opcode {
            opcode::CONTROL_RES => self.handle_control_res(pdu),
            opcode::STATUS => self.handle_status(pdu),
            opcode::INFO_RES => self.handle_info_res(pdu).await,
            opcode::OUTPUT => { /* streaming stdout is out of scope */ }
            _ => log!(LogLevel::Warn, "process future received unexpected opcode {}", pdu.opcode),
        }
    }

    fn handle_control_res(self: &Arc<Self>, pdu: Pdu) {
        let res = match ProcessControlResPdu::from_pdu(&pdu) {
            Ok(res) => res,
            Err(_) => {
                self.force_error(EngineError::ManagementProcFailed("malformed ControlRes".into()));
                self.starting_done.notify_waiters();
                return;
            }
        };

        use crate::monitor_protocol::ProcessControlResultCode as RC;
        match res.result {
            RC::Success => {
                self.monitor_pid.store(res.monitor_pid, Ordering::SeqCst);
                self.process_pid.store(res.process_pid, Ordering::SeqCst);
                self.set_state(ProcessState::Running, None, None, None);
            }
            other => {
                let err = other.into_engine_error(res.error);
                self.set_state(ProcessState::Error, None, None, Some(err));
            }
        }
        self.starting_done.notify_waiters();
    }

    fn handle_status(self: &Arc<Self>, pdu: Pdu) {
        let status = match ProcessStatusPdu::from_pdu(&pdu) {
            Ok(status) => status,
            Err(_) => {
                self.force_error(EngineError::ManagementProcFailed("malformed Status".into()));
                return;
            }
        };

        match status.status_type {
            ProcessStatusType::Started | ProcessStatusType::NotTerminated => {
                // Running was already entered on ControlRes{Success}; this
                // is a reinforcing notification, not a new transition.
            }
            ProcessStatusType::Exited => {
                self.set_state(
                    ProcessState::Exited,
                    Some(status.status_code),
                    Some(ProcessTerminationType::ProcessExited),
                    None,
                );
            }
            ProcessStatusType::Killed => {
                self.set_state(
                    ProcessState::Killed,
                    Some(status.status_code),
                    Some(ProcessTerminationType::ProcessKilled),
                    Some(EngineError::Killed),
                );
            }
            ProcessStatusType::Stopped => {
                self.set_state(
                    ProcessState::Stopped,
                    Some(status.status_code),
                    Some(ProcessTerminationType::ProcessStopped),
                    None,
                );
            }
            ProcessStatusType::Continued => {
                self.set_state(ProcessState::Running, None, None, None);
            }
            ProcessStatusType::Error => {
                self.set_state(
                    ProcessState::Error,
                    Some(status.status_code),
                    None,
                    Some(EngineError::ManagementProcFailed(status.msg)),
                );
            }
            ProcessStatusType::UnknownTermination => {
                self.set_state(
                    ProcessState::Error,
                    Some(status.status_code),
                    Some(ProcessTerminationType::ProcessUnknownTermination),
                    Some(EngineError::TerminatedDueToUnknownReason),
                );
            }
        }
    }

    async fn handle_info_res(&self, pdu: Pdu) {
        let info = match ProcessInfoResPdu::from_pdu(&pdu) {
            Ok(info) => info,
            Err(_) => return,
        };
        let mut pending = self.pending_info.lock().await;
        if let Some(tx) = pending.take() {
            let _ = tx.send(info);
        }
    }

    /// Forces the future to `Error` with `ProcmonFailure`-equivalent
    /// semantics; used when the peer itself fails (disconnects, sends
    /// garbage) rather than reporting a typed monitor result.
    pub fn handle_error(self: &Arc<Self>) {
        if !self.state().is_terminal() {
            self.force_error(EngineError::ManagementProcFailed("monitor channel failed".into()));
        }
    }

    fn force_error(self: &Arc<Self>, err: EngineError) {
        self.set_state(ProcessState::Error, None, None, Some(err));
    }

    /// Validates and applies a state transition, invoking the completion
    /// callback exactly once at entry into a terminal state (before
    /// waiters are released) and routing the outcome into the completion
    /// future. Transitions that violate the state machine's invariants are
    /// logged and ignored rather than panicking — a stray or duplicate PDU
    /// must never corrupt an already-settled future.
    fn set_state(
        self: &Arc<Self>,
        new_state: ProcessState,
        status_code: Option<i32>,
        termination_type: Option<ProcessTerminationType>,
        error: Option<EngineError>,
    ) {
        let became_terminal = {
            let mut inner = self.inner.lock().expect("process future mutex poisoned");
            if inner.state.is_terminal() {
                return;
            }
            if !valid_transition(inner.state, new_state) {
                log!(LogLevel::Warn, "ignoring invalid process state transition {:?} -> {:?}", inner.state, new_state);
                return;
            }
            inner.state = new_state;
            if let Some(code) = status_code {
                inner.status_code = Some(code);
            }
            if let Some(tt) = termination_type {
                inner.termination_type = Some(tt);
            }
            new_state.is_terminal()
        };

        if became_terminal {
            let callback = self.inner.lock().expect("process future mutex poisoned").callback.take();
            if let Some(callback) = callback {
                let this = self.clone();
                let _ = std::panic::catch_unwind(AssertUnwindSafe(|| callback(this)));
            }

            match (new_state, error) {
                (ProcessState::Exited, _) => {
                    let code = self.inner.lock().expect("process future mutex poisoned").status_code.unwrap_or(0);
                    if code == 0 {
                        let _ = self.completion.set_result(());
                    } else {
                        self.completion
                            .set_exception(FutureError::from_engine_error(EngineError::TerminatedWithNonZeroStatus(code)));
                    }
                }
                (_, Some(err)) => self.completion.set_exception(FutureError::from_engine_error(err)),
                (ProcessState::Killed, None) => {
                    self.completion.set_exception(FutureError::from_engine_error(EngineError::Killed))
                }
                (ProcessState::Abandoned, None) => {
                    self.completion.set_exception(FutureError::from_engine_error(EngineError::Abandoned))
                }
                _ => self
                    .completion
                    .set_exception(FutureError::from_engine_error(EngineError::TerminatedDueToUnknownReason)),
            }
        }
    }
}

fn valid_transition(from: ProcessState, to: ProcessState) -> bool {
    use ProcessState::*;
    if to == Abandoned {
        return !from.is_terminal();
    }
    matches!(
        (from, to),
        (Ready, Starting)
            | (Starting, Running)
            | (Starting, Error)
            | (Running, Exited)
            | (Running, Killed)
            | (Running, Stopped)
            | (Running, Error)
            | (Stopped, Running)
            | (Stopped, Exited)
            | (Stopped, Killed)
            | (Stopped, Error)
    )
}

fn read_captured_file(path: &str) -> Result<String, EngineError> {
    if path == "/dev/null" || path.is_empty() {
        return Ok(String::new());
    }
    std::fs::read_to_string(path).map_err(|e| EngineError::UnableToOpenOutputFile(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor_protocol::{ProcessControlResultCode, WireTimeval};
    use crate::pdu_peer::{BufferPolicy, PDUPeerEvent};
    use tokio::net::UnixStream;

    fn new_future(cmdline: &str) -> Arc<ProcessFuture> {
        let (tx, _rx) = mpsc::unbounded_channel::<RawFd>();
        ProcessFuture::new(cmdline, tx)
    }

    /// Wires up two in-process `PDUPeer`s over a socket pair: one plays the
    /// manager side (handed to `ProcessFuture::run`), the other plays a
    /// scripted fake monitor whose received PDUs are forwarded to the
    /// returned channel so a test can assert on them and reply by hand.
    async fn future_and_fake_monitor(
        pf: &Arc<ProcessFuture>,
    ) -> (mpsc::UnboundedReceiver<Pdu>, Arc<PDUPeer>) {
        let (manager_side, monitor_side) = UnixStream::pair().unwrap();
        let (from_future_tx, from_future_rx) = mpsc::unbounded_channel::<Pdu>();

        let pf_for_events = pf.clone();
        let manager_peer = PDUPeer::spawn(manager_side, BufferPolicy::default(), move |event| {
            if let PDUPeerEvent::ReceivedPDU(pdu) = event {
                let pf = pf_for_events.clone();
                tokio::spawn(async move { pf.handle_pdu(pdu).await });
            }
        });
        let monitor_peer = PDUPeer::spawn(monitor_side, BufferPolicy::default(), move |event| {
            if let PDUPeerEvent::ReceivedPDU(pdu) = event {
                let _ = from_future_tx.send(pdu);
            }
        });

        let pf_run = pf.clone();
        tokio::spawn(async move { let _ = pf_run.run(manager_peer).await; });

        (from_future_rx, monitor_peer)
    }

    #[tokio::test]
    async fn run_to_clean_exit_reports_ok_and_exit_status() {
        let pf = new_future("/bin/true");
        let (mut from_future, monitor) = future_and_fake_monitor(&pf).await;

        // five Param PDUs + one ControlReq{Start}
        for _ in 0..6 {
            from_future.recv().await.expect("expected a param/control PDU");
        }

        monitor
            .send(
                ProcessControlResPdu {
                    result: ProcessControlResultCode::Success,
                    monitor_pid: 111,
                    process_pid: 222,
                    error: String::new(),
                }
                .to_pdu(),
            )
            .unwrap();

        // run() returns once the future leaves Starting.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pf.is_running());
        assert_eq!(pf.get_process_pid(), 222);
        assert_eq!(pf.get_monitor_pid(), 111);

        monitor
            .send(
                ProcessStatusPdu {
                    status_type: ProcessStatusType::Exited,
                    status_code: 0,
                    timestamp: WireTimeval::now(),
                    msg: String::new(),
                }
                .to_pdu(),
            )
            .unwrap();

        pf.get_result().await.unwrap();
        assert_eq!(pf.get_status_code().unwrap(), 0);
        assert_eq!(pf.get_process_termination_type().unwrap(), ProcessTerminationType::ProcessExited);
    }

    #[tokio::test]
    async fn cancel_sends_sigterm_and_killed_status_completes_with_killed_error() {
        let pf = new_future("/bin/sleep 5");
        let (mut from_future, monitor) = future_and_fake_monitor(&pf).await;
        for _ in 0..6 {
            from_future.recv().await.expect("expected a param/control PDU");
        }
        monitor
            .send(
                ProcessControlResPdu {
                    result: ProcessControlResultCode::Success,
                    monitor_pid: 1,
                    process_pid: 2,
                    error: String::new(),
                }
                .to_pdu(),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        pf.cancel().unwrap();
        assert!(pf.is_cancelled());

        // the real SIGTERM ControlReq shows up on the fake monitor's side.
        let sig_req = from_future.recv().await.expect("expected a signal ControlReq");
        assert_eq!(sig_req.opcode, crate::monitor_protocol::opcode::CONTROL_REQ);

        monitor
            .send(
                ProcessStatusPdu {
                    status_type: ProcessStatusType::Killed,
                    status_code: libc::SIGTERM,
                    timestamp: WireTimeval::now(),
                    msg: String::new(),
                }
                .to_pdu(),
            )
            .unwrap();

        let err = pf.get_result().await.unwrap_err();
        assert_eq!(err, EngineError::Killed);
        assert_eq!(pf.get_process_termination_type().unwrap(), ProcessTerminationType::ProcessKilled);
    }

    #[test]
    fn configuration_setters_reject_once_started() {
        let pf = new_future("/bin/true");
        pf.set_current_working_directory("/tmp").unwrap();
        {
            let mut inner = pf.inner.lock().unwrap();
            inner.state = ProcessState::Running;
        }
        assert_eq!(pf.set_output_filename("/tmp/out").unwrap_err(), EngineError::Started);
    }

    #[test]
    fn abandon_on_a_ready_future_completes_with_abandoned() {
        let pf = new_future("/bin/true");
        pf.abandon();
        assert_eq!(pf.state(), ProcessState::Abandoned);
        assert!(pf.completion.is_ready());
    }

    #[test]
    fn output_and_error_strings_default_to_empty_for_null_sink() {
        let pf = new_future("/bin/true");
        {
            let mut inner = pf.inner.lock().unwrap();
            inner.state = ProcessState::Exited;
        }
        assert_eq!(pf.get_output_string().unwrap(), "");
        assert_eq!(pf.get_error_string().unwrap(), "");
    }
}
