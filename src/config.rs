//! Engine-wide configuration: the monitor binary path override and the
//! handful of tunables that would otherwise be hardcoded literals scattered
//! through `pdu_peer`/`event_queue`/`process_manager`.
//!
//! Built with `config::Config::builder()` layering defaults under an env
//! source, rather than hand-rolled `std::env::var` calls.

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

use crate::event_queue::DEFAULT_CAPACITY;
use crate::pdu_peer::BufferPolicy;

/// Environment variable carrying an override for the monitor binary's path.
pub const MONITOR_PATH_ENV: &str = "FORTE_PROCMON";

const DEFAULT_MONITOR_PATH: &str = "/usr/libexec/procmon";

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct EngineConfig {
    /// Path to the monitor helper binary exec'd for every supervised child.
    /// Defaults to [`DEFAULT_MONITOR_PATH`]; overridden by `FORTE_PROCMON`.
    pub monitor_path: String,

    /// Initial size, in bytes, of a `PDUPeer`'s inbound receive buffer.
    pub recv_buffer_size: usize,

    /// Amount the receive buffer grows by once it is exhausted.
    pub recv_buffer_step_size: usize,

    /// Hard cap on the receive buffer; exceeding it tears the peer down.
    pub recv_buffer_max_size: usize,

    /// Default `EventQueue` capacity for a new `ActiveObject`.
    pub event_queue_capacity: usize,

    /// Deadline for one `PDUPeer::send` call before it is treated as failed.
    pub send_deadline_millis: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            monitor_path: DEFAULT_MONITOR_PATH.to_string(),
            recv_buffer_size: 4096,
            recv_buffer_step_size: 4096,
            recv_buffer_max_size: 1 << 20,
            event_queue_capacity: DEFAULT_CAPACITY,
            send_deadline_millis: 5000,
        }
    }
}

impl EngineConfig {
    /// Builds configuration from defaults overlaid with `PROCMON_`-prefixed
    /// environment variables (e.g. `PROCMON_RECV_BUFFER_MAX_SIZE`), plus the
    /// dedicated `FORTE_PROCMON` override for the monitor path.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = EngineConfig::default();
        let config = Config::builder()
            .set_default("monitor_path", defaults.monitor_path.clone())?
            .set_default("recv_buffer_size", defaults.recv_buffer_size as i64)?
            .set_default("recv_buffer_step_size", defaults.recv_buffer_step_size as i64)?
            .set_default("recv_buffer_max_size", defaults.recv_buffer_max_size as i64)?
            .set_default("event_queue_capacity", defaults.event_queue_capacity as i64)?
            .set_default("send_deadline_millis", defaults.send_deadline_millis as i64)?
            .add_source(Environment::with_prefix("PROCMON"))
            .build()?;

        let mut engine_config: EngineConfig = config.try_deserialize()?;
        if let Ok(path) = std::env::var(MONITOR_PATH_ENV) {
            engine_config.monitor_path = path;
        }
        Ok(engine_config)
    }

    pub fn buffer_policy(&self) -> BufferPolicy {
        BufferPolicy {
            initial: self.recv_buffer_size,
            step: self.recv_buffer_step_size,
            max: self.recv_buffer_max_size,
            send_deadline: Duration::from_millis(self.send_deadline_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = EngineConfig::default();
        assert!(config.recv_buffer_size <= config.recv_buffer_max_size);
        assert!(config.recv_buffer_step_size > 0);
    }

    #[test]
    fn forte_procmon_env_overrides_monitor_path() {
        std::env::set_var(MONITOR_PATH_ENV, "/tmp/fake-procmon");
        let config = EngineConfig::load().expect("config should load");
        assert_eq!(config.monitor_path, "/tmp/fake-procmon");
        std::env::remove_var(MONITOR_PATH_ENV);
    }
}
