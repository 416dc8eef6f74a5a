//! Server configuration.

use std::time::Duration;

use buzzer_room::StoreConfig;
use buzzer_transport::DEFAULT_OUTBOUND_CAPACITY;

use crate::BuzzerError;

/// Environment variable holding the listen address.
pub const ENV_BIND: &str = "BUZZER_BIND";
/// Environment variable holding the idle timeout, in whole seconds.
pub const ENV_IDLE_TIMEOUT_SECS: &str = "BUZZER_IDLE_TIMEOUT_SECS";

/// Settings for a [`BuzzerServer`](crate::BuzzerServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// A connection that sends nothing for this long is dropped. Clients
    /// keep quiet connections alive with heartbeats. Also bounds the
    /// WebSocket handshake.
    pub idle_timeout: Duration,

    /// Frames queued for one connection before it is treated as too slow
    /// and dropped from room updates.
    pub outbound_capacity: usize,

    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            idle_timeout: Duration::from_secs(30),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            store: StoreConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, overridden by `BUZZER_BIND` and
    /// `BUZZER_IDLE_TIMEOUT_SECS` when set.
    pub fn from_env() -> Result<Self, BuzzerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BuzzerError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_BIND) {
            if addr.trim().is_empty() {
                return Err(BuzzerError::Config(format!("{ENV_BIND} is empty")));
            }
            config.bind_addr = addr;
        }

        if let Some(raw) = lookup(ENV_IDLE_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                BuzzerError::Config(format!(
                    "{ENV_IDLE_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            if secs == 0 {
                return Err(BuzzerError::Config(format!(
                    "{ENV_IDLE_TIMEOUT_SECS} must be at least 1"
                )));
            }
            config.idle_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
