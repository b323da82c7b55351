//! Liveness polling configuration.

use std::time::Duration;

use crate::config::HarnessConfig;

pub const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Doubling delay starting at [`INITIAL_POLL_INTERVAL`], capped at `cap`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    next: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(cap: Duration) -> Self {
        let cap = cap.max(MIN_POLL_INTERVAL);
        Self {
            next: INITIAL_POLL_INTERVAL.min(cap),
            cap,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.cap);
        delay
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    pub poll_interval: Duration,
    pub give_up_after: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            poll_interval: MAX_POLL_INTERVAL,
            give_up_after: SHUTDOWN_TIMEOUT,
        }
    }
}

impl StopPolicy {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            poll_interval: config.stop_poll_interval(),
            give_up_after: config.stop_timeout(),
        }
    }
}
