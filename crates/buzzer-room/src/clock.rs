//! Server time source.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the server-side timestamp recorded when a command is applied.
///
/// Client clocks are never consulted. The room actor reads the clock at
/// the moment it applies a command, so the value doubles as the order key.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
