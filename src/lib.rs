//! A supervised-subprocess execution engine: fork/exec supervision through a
//! dedicated monitor process per child, a PDU-framed control channel, and a
//! generic active-object work queue built on top of it.

pub mod active_object;
pub mod async_invocation;
pub mod clock;
pub mod config;
pub mod errors;
pub mod event_queue;
pub mod future;
pub mod monitor_protocol;
pub mod pdu;
pub mod pdu_peer;
pub mod process_future;
pub mod process_manager;

pub use active_object::ActiveObject;
pub use async_invocation::AsyncInvocation;
pub use config::EngineConfig;
pub use errors::EngineError;
pub use future::{CancellationToken, Future, FutureError};
pub use process_future::{ProcessFuture, ProcessInfo, ProcessState, ProcessTerminationType};
pub use process_manager::{ProcessManager, ProcessOutcome};

#[cfg(test)]
#[path = "tests/engine_scenarios.rs"]
mod engine_scenarios;
