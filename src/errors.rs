//! Typed failure kinds for the supervised-subprocess execution engine.
//!
//! Every variant here maps to a distinct failure kind: usage/state
//! violations, resource failures, lifecycle outcomes, timing, protocol
//! errors, and ActiveObject shutdown semantics. The enum converts
//! to and from [`ErrorArrayItem`] so code that calls through the rest of the
//! dusa ecosystem's `?`-propagation idiom keeps working unchanged.

use dusa_collection_utils::core::errors::{ErrorArrayItem, Errors};
use std::fmt;

/// A typed failure produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // usage / state
    NotStarted,
    Started,
    NotRunning,
    NotFinished,
    Running,
    HandleInvalid,
    AlreadySet,

    // resource
    UnableToOpenInputFile(String),
    UnableToOpenOutputFile(String),
    UnableToOpenErrorFile(String),
    UnableToCWD(String),
    UnableToFork(String),
    UnableToExec(String),
    UnableToCreateSocket(String),
    UnableToCreateProcmon(String),

    // lifecycle
    Abandoned,
    Killed,
    TerminatedWithNonZeroStatus(i32),
    TerminatedDueToUnknownReason,

    // timing
    TimeoutWaitingForResult,

    // protocol
    PDUVersionInvalid,
    PeerBufferOverflow,
    PeerBufferOutOfMemory,
    InvalidPeer,

    // active object
    ShuttingDown,
    NoCurrentInvocation,
    Dropped,
    ExceptionUnknown,

    /// A result code the monitor reported that carries no more specific
    /// mapping; the management process failed in a way that only a string
    /// description is available for.
    ManagementProcFailed(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotStarted => write!(f, "process has not been started"),
            EngineError::Started => write!(f, "method called on a process that has already started"),
            EngineError::NotRunning => write!(f, "wait called on a non-running process"),
            EngineError::NotFinished => write!(f, "method called on a process that is not finished yet"),
            EngineError::Running => write!(f, "method called on a running process"),
            EngineError::HandleInvalid => write!(f, "process handle is invalid"),
            EngineError::AlreadySet => write!(f, "future result already set"),
            EngineError::UnableToOpenInputFile(e) => write!(f, "unable to open input file: {e}"),
            EngineError::UnableToOpenOutputFile(e) => write!(f, "unable to open output file: {e}"),
            EngineError::UnableToOpenErrorFile(e) => write!(f, "unable to open error file: {e}"),
            EngineError::UnableToCWD(e) => write!(f, "unable to change to working directory: {e}"),
            EngineError::UnableToFork(e) => write!(f, "unable to fork child process: {e}"),
            EngineError::UnableToExec(e) => write!(f, "unable to exec child process: {e}"),
            EngineError::UnableToCreateSocket(e) => write!(f, "unable to create a socketpair: {e}"),
            EngineError::UnableToCreateProcmon(e) => write!(f, "unable to create monitor process: {e}"),
            EngineError::Abandoned => write!(f, "process has been abandoned"),
            EngineError::Killed => write!(f, "the process was killed"),
            EngineError::TerminatedWithNonZeroStatus(code) => {
                write!(f, "the process terminated with a non-zero status code: {code}")
            }
            EngineError::TerminatedDueToUnknownReason => {
                write!(f, "the process terminated due to unknown reason")
            }
            EngineError::TimeoutWaitingForResult => write!(f, "timed out waiting for result"),
            EngineError::PDUVersionInvalid => write!(f, "PDU version mismatch"),
            EngineError::PeerBufferOverflow => write!(f, "peer receive buffer exceeded its configured cap"),
            EngineError::PeerBufferOutOfMemory => write!(f, "peer receive buffer allocation failed"),
            EngineError::InvalidPeer => write!(f, "peer is invalid or disconnected"),
            EngineError::ShuttingDown => write!(f, "active object is shutting down"),
            EngineError::NoCurrentInvocation => write!(f, "no invocation is currently executing"),
            EngineError::Dropped => write!(f, "invocation was dropped before it ran"),
            EngineError::ExceptionUnknown => write!(f, "an untranslatable exception was captured"),
            EngineError::ManagementProcFailed(e) => write!(f, "management process failed: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<EngineError> for ErrorArrayItem {
    fn from(value: EngineError) -> Self {
        ErrorArrayItem::new(Errors::GeneralError, value.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(value: std::io::Error) -> Self {
        EngineError::UnableToCreateSocket(value.to_string())
    }
}
