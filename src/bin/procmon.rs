//! The monitor helper process: one instance per supervised child.
//!
//! Invoked as `procmon <fd>`, where `<fd>` is the number of an inherited
//! UNIX-domain socket connected back to the `ProcessManager`. Deliberately
//! synchronous and nix-based rather than tokio-based — this is a small,
//! single-purpose process with exactly one child to supervise, and the
//! fork/exec/waitpid sequence it runs is inherently a sequence of blocking
//! syscalls anyway.

use std::ffi::CString;
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{chdir, dup2, execv, fork, pipe, setsid, ForkResult, Pid};

use procmon_engine::monitor_protocol::{
    opcode, ProcessControlCode, ProcessControlReqPdu, ProcessControlResPdu, ProcessControlResultCode,
    ProcessInfoResPdu, ProcessParamCode, ProcessParamPdu, ProcessStatusPdu, ProcessStatusType, WireTimeval,
};
use procmon_engine::pdu::Pdu;

struct ChildParams {
    cmdline: String,
    cwd: String,
    infile: String,
    outfile: String,
    errfile: String,
}

impl Default for ChildParams {
    fn default() -> Self {
        ChildParams {
            cmdline: String::new(),
            cwd: String::new(),
            infile: "/dev/null".into(),
            outfile: "/dev/null".into(),
            errfile: "/dev/null".into(),
        }
    }
}

fn recv_pdu(stream: &mut UnixStream, buf: &mut Vec<u8>) -> std::io::Result<Pdu> {
    loop {
        match Pdu::try_decode(buf) {
            Ok(Some((pdu, consumed))) => {
                buf.drain(..consumed);
                return Ok(pdu);
            }
            Ok(None) => {}
            Err(_) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "PDU version mismatch")),
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "peer closed"));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn send_pdu(stream: &Mutex<UnixStream>, pdu: Pdu) -> std::io::Result<()> {
    let mut stream = stream.lock().expect("writer mutex poisoned");
    stream.write_all(&pdu.encode())
}

fn open_capture(path: &str, writable: bool) -> std::io::Result<std::fs::File> {
    if writable {
        std::fs::OpenOptions::new().create(true).write(true).truncate(true).open(path)
    } else {
        std::fs::OpenOptions::new().read(true).open(path)
    }
}

fn control_result(code: ProcessControlResultCode, monitor_pid: i32, process_pid: i32, error: String) -> Pdu {
    ProcessControlResPdu { result: code, monitor_pid, process_pid, error }.to_pdu()
}

fn status_pdu(status_type: ProcessStatusType, status_code: i32, msg: &str) -> Pdu {
    ProcessStatusPdu { status_type, status_code, timestamp: WireTimeval::now(), msg: msg.to_string() }.to_pdu()
}

fn main() {
    let fd: RawFd = match std::env::args().nth(1).and_then(|s| s.parse().ok()) {
        Some(fd) => fd,
        None => {
            eprintln!("procmon: expected an inherited socket fd as argv[1]");
            std::process::exit(2);
        }
    };

    let mut control_stream = unsafe { UnixStream::from_raw_fd(fd) };
    let mut buf = Vec::with_capacity(4096);
    let mut params = ChildParams::default();

    // Collect Param PDUs until ControlReq{Start} arrives.
    let start_req = loop {
        let pdu = match recv_pdu(&mut control_stream, &mut buf) {
            Ok(pdu) => pdu,
            Err(e) => {
                eprintln!("procmon: error reading startup PDUs: {e}");
                std::process::exit(1);
            }
        };
        match pdu.opcode {
            opcode::PARAM => {
                if let Ok(param) = ProcessParamPdu::from_pdu(&pdu) {
                    match param.param {
                        ProcessParamCode::Cmdline => params.cmdline = param.value,
                        ProcessParamCode::Cwd => params.cwd = param.value,
                        ProcessParamCode::Infile => params.infile = param.value,
                        ProcessParamCode::Outfile => params.outfile = param.value,
                        ProcessParamCode::Errfile => params.errfile = param.value,
                    }
                }
            }
            opcode::CONTROL_REQ => {
                if let Ok(req) = ProcessControlReqPdu::from_pdu(&pdu) {
                    if req.control == ProcessControlCode::Start {
                        break req;
                    }
                }
            }
            _ => {}
        }
    };
    let _ = start_req;

    if !params.cwd.is_empty() && !std::path::Path::new(&params.cwd).is_dir() {
        let _ = send_pdu_once(
            &mut control_stream,
            control_result(ProcessControlResultCode::UnableToCWD, std::process::id() as i32, -1, "no such directory".into()),
        );
        std::process::exit(1);
    }

    let infile = match open_capture(&params.infile, false) {
        Ok(f) => f,
        Err(e) => {
            let _ = send_pdu_once(
                &mut control_stream,
                control_result(ProcessControlResultCode::UnableToOpenInputFile, std::process::id() as i32, -1, e.to_string()),
            );
            std::process::exit(1);
        }
    };
    let outfile = match open_capture(&params.outfile, true) {
        Ok(f) => f,
        Err(e) => {
            let _ = send_pdu_once(
                &mut control_stream,
                control_result(ProcessControlResultCode::UnableToOpenOutputFile, std::process::id() as i32, -1, e.to_string()),
            );
            std::process::exit(1);
        }
    };
    let errfile = match open_capture(&params.errfile, true) {
        Ok(f) => f,
        Err(e) => {
            let _ = send_pdu_once(
                &mut control_stream,
                control_result(ProcessControlResultCode::UnableToOpenErrorFile, std::process::id() as i32, -1, e.to_string()),
            );
            std::process::exit(1);
        }
    };

    let (pipe_read, pipe_write) = match pipe() {
        Ok(fds) => fds,
        Err(e) => {
            let _ = send_pdu_once(
                &mut control_stream,
                control_result(ProcessControlResultCode::UnableToFork, std::process::id() as i32, -1, e.to_string()),
            );
            std::process::exit(1);
        }
    };

    let monitor_pid = std::process::id() as i32;
    let start_time = Instant::now();

    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            drop(pipe_read);
            let mut write_file = std::fs::File::from(pipe_write);

            let _ = dup2(infile.as_raw_fd(), 0);
            let _ = dup2(outfile.as_raw_fd(), 1);
            let _ = dup2(errfile.as_raw_fd(), 2);
            drop(infile);
            drop(outfile);
            drop(errfile);
            unsafe { libc::close(fd) };

            if !params.cwd.is_empty() {
                let _ = chdir(params.cwd.as_str());
            }
            let _ = setsid();

            let shell = CString::new("/bin/bash").unwrap();
            let dash_c = CString::new("-c").unwrap();
            let cmd = CString::new(params.cmdline.as_str()).unwrap();
            let errno = execv(&shell, &[shell.clone(), dash_c, cmd]).unwrap_err();

            let errno_bytes = (errno as i32).to_le_bytes();
            let _ = write_file.write_all(&errno_bytes);
            unsafe { libc::_exit(127) };
        }
        Ok(ForkResult::Parent { child }) => {
            drop(pipe_write);
            drop(infile);
            drop(outfile);
            drop(errfile);

            let mut errno_buf = [0u8; 4];
            let mut read_file = std::fs::File::from(pipe_read);
            let exec_failed = matches!(read_file.read(&mut errno_buf), Ok(4));

            if exec_failed {
                let errno = i32::from_le_bytes(errno_buf);
                let _ = waitpid(child, None);
                let _ = send_pdu_once(
                    &mut control_stream,
                    control_result(
                        ProcessControlResultCode::UnableToExec,
                        monitor_pid,
                        -1,
                        format!("exec failed: errno {errno}"),
                    ),
                );
                std::process::exit(0);
            }

            let _ = send_pdu_once(
                &mut control_stream,
                control_result(ProcessControlResultCode::Success, monitor_pid, child.as_raw(), String::new()),
            );
            let _ = send_pdu_once(&mut control_stream, status_pdu(ProcessStatusType::Started, 0, ""));

            let writer = Arc::new(Mutex::new(control_stream.try_clone().expect("socket clone")));
            let reader_writer = writer.clone();
            let child_pgid = child;
            let started_by = std::env::var("USER").unwrap_or_else(|_| "unknown".into());

            let reader_handle = std::thread::spawn(move || {
                let mut reader = control_stream;
                let mut buf = Vec::with_capacity(4096);
                loop {
                    let pdu = match recv_pdu(&mut reader, &mut buf) {
                        Ok(pdu) => pdu,
                        Err(_) => break,
                    };
                    match pdu.opcode {
                        opcode::CONTROL_REQ => {
                            if let Ok(req) = ProcessControlReqPdu::from_pdu(&pdu) {
                                if req.control == ProcessControlCode::Signal {
                                    if let Ok(sig) = Signal::try_from(req.signum) {
                                        let _ = kill(Pid::from_raw(-child_pgid.as_raw()), sig);
                                    }
                                }
                            }
                        }
                        opcode::INFO_REQ => {
                            let elapsed = start_time.elapsed();
                            let reply = ProcessInfoResPdu {
                                started_by: started_by.clone(),
                                started_by_pid: monitor_pid,
                                start_time: WireTimeval::now(),
                                elapsed: WireTimeval { seconds: elapsed.as_secs() as i64, micros: elapsed.subsec_micros() as i64 },
                                cmdline: params.cmdline.clone(),
                                cwd: params.cwd.clone(),
                                monitor_pid,
                                process_pid: child_pgid.as_raw(),
                            };
                            let _ = send_pdu(&reader_writer, reply.to_pdu());
                        }
                        _ => {}
                    }
                }
            });

            loop {
                match waitpid(child, Some(WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED)) {
                    Ok(WaitStatus::Exited(_, code)) => {
                        let _ = send_pdu(&writer, status_pdu(ProcessStatusType::Exited, code, ""));
                        break;
                    }
                    Ok(WaitStatus::Signaled(_, sig, _)) => {
                        let _ = send_pdu(&writer, status_pdu(ProcessStatusType::Killed, sig as i32, ""));
                        break;
                    }
                    Ok(WaitStatus::Stopped(_, sig)) => {
                        let _ = send_pdu(&writer, status_pdu(ProcessStatusType::Stopped, sig as i32, ""));
                    }
                    Ok(WaitStatus::Continued(_)) => {
                        let _ = send_pdu(&writer, status_pdu(ProcessStatusType::Continued, 0, ""));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = send_pdu(&writer, status_pdu(ProcessStatusType::UnknownTermination, 0, &e.to_string()));
                        break;
                    }
                }
            }

            let _ = reader_handle.join();
            std::process::exit(0);
        }
        Err(e) => {
            let _ = send_pdu_once(
                &mut control_stream,
                control_result(ProcessControlResultCode::UnableToFork, monitor_pid, -1, e.to_string()),
            );
            std::process::exit(1);
        }
    }
}

fn send_pdu_once(stream: &mut UnixStream, pdu: Pdu) -> std::io::Result<()> {
    stream.write_all(&pdu.encode())
}
