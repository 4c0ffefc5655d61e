//! Monitor PDU schema: opcodes and payload records exchanged between a
//! `ProcessManager`/`ProcessFuture` and its dedicated monitor helper
//! process.
//!
//! Field layouts are little-endian packed Rust structs with zero-padded
//! fixed string buffers: `Param.str` = 2048, `ControlRes.error` = 1024,
//! `Status.msg` = 1024, `InfoRes.cmdline` = 2048, `InfoRes.cwd` = 1024,
//! `InfoRes.startedBy` = 64.

use crate::errors::EngineError;
use crate::pdu::{read_fixed_string, write_fixed_string, Pdu};

pub mod opcode {
    pub const PARAM: u16 = 0;
    pub const STATUS: u16 = 1;
    pub const OUTPUT: u16 = 2;
    pub const CONTROL_REQ: u16 = 3;
    pub const CONTROL_RES: u16 = 4;
    pub const INFO_REQ: u16 = 5;
    pub const INFO_RES: u16 = 6;
}

macro_rules! enum_u32 {
    ($name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn to_u32(self) -> u32 {
                match self {
                    $(Self::$variant => $value),+
                }
            }

            pub fn from_u32(v: u32) -> Result<Self, EngineError> {
                match v {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(EngineError::ManagementProcFailed(format!(
                        concat!(stringify!($name), ": unrecognized wire value {}"),
                        v
                    ))),
                }
            }
        }
    };
}

enum_u32!(ProcessParamCode {
    Cmdline = 0,
    Cwd = 1,
    Infile = 2,
    Outfile = 3,
    Errfile = 4,
});

enum_u32!(ProcessStatusType {
    Started = 0,
    Error = 1,
    Exited = 2,
    Killed = 3,
    Stopped = 4,
    Continued = 5,
    UnknownTermination = 6,
    NotTerminated = 7,
});

enum_u32!(ProcessControlCode {
    Start = 0,
    Signal = 1,
});

enum_u32!(ProcessControlResultCode {
    Success = 0,
    UnableToOpenInputFile = 1,
    UnableToOpenOutputFile = 2,
    UnableToOpenErrorFile = 3,
    UnableToCWD = 4,
    UnableToFork = 5,
    UnableToExec = 6,
    NotRunning = 7,
    Running = 8,
    ProcmonFailure = 9,
    UnknownError = 10,
});

impl ProcessControlResultCode {
    /// Maps a monitor result code onto the engine's typed failure.
    /// `Success`/`NotRunning`/`Running` never reach this — they are not
    /// error outcomes.
    pub fn into_engine_error(self, detail: String) -> EngineError {
        match self {
            ProcessControlResultCode::UnableToOpenInputFile => EngineError::UnableToOpenInputFile(detail),
            ProcessControlResultCode::UnableToOpenOutputFile => EngineError::UnableToOpenOutputFile(detail),
            ProcessControlResultCode::UnableToOpenErrorFile => EngineError::UnableToOpenErrorFile(detail),
            ProcessControlResultCode::UnableToCWD => EngineError::UnableToCWD(detail),
            ProcessControlResultCode::UnableToFork => EngineError::UnableToFork(detail),
            ProcessControlResultCode::UnableToExec => EngineError::UnableToExec(detail),
            ProcessControlResultCode::ProcmonFailure => EngineError::ManagementProcFailed(detail),
            ProcessControlResultCode::Success
            | ProcessControlResultCode::NotRunning
            | ProcessControlResultCode::Running
            | ProcessControlResultCode::UnknownError => EngineError::ManagementProcFailed(detail),
        }
    }
}

const STR_LEN: usize = 2048;
const ERR_LEN: usize = 1024;
const MSG_LEN: usize = 1024;
const NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessParamPdu {
    pub param: ProcessParamCode,
    pub value: String,
}

impl ProcessParamPdu {
    pub fn to_pdu(&self) -> Pdu {
        let mut payload = Vec::with_capacity(4 + STR_LEN);
        payload.extend_from_slice(&self.param.to_u32().to_le_bytes());
        payload.extend_from_slice(&write_fixed_string::<STR_LEN>(&self.value));
        Pdu::new(opcode::PARAM, payload)
    }

    pub fn from_pdu(pdu: &Pdu) -> Result<Self, EngineError> {
        if pdu.payload.len() < 4 + STR_LEN {
            return Err(EngineError::ManagementProcFailed("short ProcessParam payload".into()));
        }
        let param = ProcessParamCode::from_u32(u32::from_le_bytes(pdu.payload[0..4].try_into().unwrap()))?;
        let value = read_fixed_string(&pdu.payload[4..4 + STR_LEN]);
        Ok(ProcessParamPdu { param, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessControlReqPdu {
    pub control: ProcessControlCode,
    pub signum: i32,
}

impl ProcessControlReqPdu {
    pub fn start() -> Self {
        ProcessControlReqPdu { control: ProcessControlCode::Start, signum: 0 }
    }

    pub fn signal(signum: i32) -> Self {
        ProcessControlReqPdu { control: ProcessControlCode::Signal, signum }
    }

    pub fn to_pdu(&self) -> Pdu {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&self.control.to_u32().to_le_bytes());
        payload.extend_from_slice(&self.signum.to_le_bytes());
        Pdu::new(opcode::CONTROL_REQ, payload)
    }

    pub fn from_pdu(pdu: &Pdu) -> Result<Self, EngineError> {
        if pdu.payload.len() < 8 {
            return Err(EngineError::ManagementProcFailed("short ControlReq payload".into()));
        }
        let control = ProcessControlCode::from_u32(u32::from_le_bytes(pdu.payload[0..4].try_into().unwrap()))?;
        let signum = i32::from_le_bytes(pdu.payload[4..8].try_into().unwrap());
        Ok(ProcessControlReqPdu { control, signum })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessControlResPdu {
    pub result: ProcessControlResultCode,
    pub monitor_pid: i32,
    pub process_pid: i32,
    pub error: String,
}

impl ProcessControlResPdu {
    pub fn to_pdu(&self) -> Pdu {
        let mut payload = Vec::with_capacity(4 + 4 + 4 + ERR_LEN);
        payload.extend_from_slice(&self.result.to_u32().to_le_bytes());
        payload.extend_from_slice(&self.monitor_pid.to_le_bytes());
        payload.extend_from_slice(&self.process_pid.to_le_bytes());
        payload.extend_from_slice(&write_fixed_string::<ERR_LEN>(&self.error));
        Pdu::new(opcode::CONTROL_RES, payload)
    }

    pub fn from_pdu(pdu: &Pdu) -> Result<Self, EngineError> {
        if pdu.payload.len() < 12 + ERR_LEN {
            return Err(EngineError::ManagementProcFailed("short ControlRes payload".into()));
        }
        let result = ProcessControlResultCode::from_u32(u32::from_le_bytes(pdu.payload[0..4].try_into().unwrap()))?;
        let monitor_pid = i32::from_le_bytes(pdu.payload[4..8].try_into().unwrap());
        let process_pid = i32::from_le_bytes(pdu.payload[8..12].try_into().unwrap());
        let error = read_fixed_string(&pdu.payload[12..12 + ERR_LEN]);
        Ok(ProcessControlResPdu { result, monitor_pid, process_pid, error })
    }
}

/// Wall-clock timestamp with microsecond resolution, mirroring a C
/// `struct timeval`'s fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireTimeval {
    pub seconds: i64,
    pub micros: i64,
}

impl WireTimeval {
    pub fn now() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        WireTimeval { seconds: now.as_secs() as i64, micros: now.subsec_micros() as i64 }
    }

    fn to_bytes(self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[0..8].copy_from_slice(&self.seconds.to_le_bytes());
        buf[8..16].copy_from_slice(&self.micros.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        WireTimeval {
            seconds: i64::from_le_bytes(buf[0..8].try_into().unwrap()),
            micros: i64::from_le_bytes(buf[8..16].try_into().unwrap()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStatusPdu {
    pub status_type: ProcessStatusType,
    pub status_code: i32,
    pub timestamp: WireTimeval,
    pub msg: String,
}

impl ProcessStatusPdu {
    pub fn to_pdu(&self) -> Pdu {
        let mut payload = Vec::with_capacity(4 + 4 + 16 + 4 + MSG_LEN);
        payload.extend_from_slice(&self.status_type.to_u32().to_le_bytes());
        payload.extend_from_slice(&self.status_code.to_le_bytes());
        payload.extend_from_slice(&self.timestamp.to_bytes());
        let msg_bytes = write_fixed_string::<MSG_LEN>(&self.msg);
        payload.extend_from_slice(&(self.msg.len().min(MSG_LEN - 1) as u32).to_le_bytes());
        payload.extend_from_slice(&msg_bytes);
        Pdu::new(opcode::STATUS, payload)
    }

    pub fn from_pdu(pdu: &Pdu) -> Result<Self, EngineError> {
        let fixed_len = 4 + 4 + 16 + 4 + MSG_LEN;
        if pdu.payload.len() < fixed_len {
            return Err(EngineError::ManagementProcFailed("short ProcessStatus payload".into()));
        }
        let status_type = ProcessStatusType::from_u32(u32::from_le_bytes(pdu.payload[0..4].try_into().unwrap()))?;
        let status_code = i32::from_le_bytes(pdu.payload[4..8].try_into().unwrap());
        let timestamp = WireTimeval::from_bytes(&pdu.payload[8..24]);
        let msg = read_fixed_string(&pdu.payload[28..28 + MSG_LEN]);
        Ok(ProcessStatusPdu { status_type, status_code, timestamp, msg })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInfoReqPdu;

impl ProcessInfoReqPdu {
    pub fn to_pdu(&self) -> Pdu {
        Pdu::new(opcode::INFO_REQ, Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfoResPdu {
    pub started_by: String,
    pub started_by_pid: i32,
    pub start_time: WireTimeval,
    pub elapsed: WireTimeval,
    pub cmdline: String,
    pub cwd: String,
    pub monitor_pid: i32,
    pub process_pid: i32,
}

impl ProcessInfoResPdu {
    pub fn to_pdu(&self) -> Pdu {
        let mut payload = Vec::with_capacity(NAME_LEN + 4 + 16 + 16 + STR_LEN + ERR_LEN + 4 + 4);
        payload.extend_from_slice(&write_fixed_string::<NAME_LEN>(&self.started_by));
        payload.extend_from_slice(&self.started_by_pid.to_le_bytes());
        payload.extend_from_slice(&self.start_time.to_bytes());
        payload.extend_from_slice(&self.elapsed.to_bytes());
        payload.extend_from_slice(&write_fixed_string::<STR_LEN>(&self.cmdline));
        payload.extend_from_slice(&write_fixed_string::<ERR_LEN>(&self.cwd));
        payload.extend_from_slice(&self.monitor_pid.to_le_bytes());
        payload.extend_from_slice(&self.process_pid.to_le_bytes());
        Pdu::new(opcode::INFO_RES, payload)
    }

    pub fn from_pdu(pdu: &Pdu) -> Result<Self, EngineError> {
        let mut offset = 0usize;
        let total = NAME_LEN + 4 + 16 + 16 + STR_LEN + ERR_LEN + 4 + 4;
        if pdu.payload.len() < total {
            return Err(EngineError::ManagementProcFailed("short ProcessInfoRes payload".into()));
        }
        let started_by = read_fixed_string(&pdu.payload[offset..offset + NAME_LEN]);
        offset += NAME_LEN;
        let started_by_pid = i32::from_le_bytes(pdu.payload[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let start_time = WireTimeval::from_bytes(&pdu.payload[offset..offset + 16]);
        offset += 16;
        let elapsed = WireTimeval::from_bytes(&pdu.payload[offset..offset + 16]);
        offset += 16;
        let cmdline = read_fixed_string(&pdu.payload[offset..offset + STR_LEN]);
        offset += STR_LEN;
        let cwd = read_fixed_string(&pdu.payload[offset..offset + ERR_LEN]);
        offset += ERR_LEN;
        let monitor_pid = i32::from_le_bytes(pdu.payload[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let process_pid = i32::from_le_bytes(pdu.payload[offset..offset + 4].try_into().unwrap());

        Ok(ProcessInfoResPdu {
            started_by,
            started_by_pid,
            start_time,
            elapsed,
            cmdline,
            cwd,
            monitor_pid,
            process_pid,
        })
    }
}
