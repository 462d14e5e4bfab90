//! Runtime configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host loop and dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval for timers started without one, in milliseconds
    pub default_timer_interval_ms: u64,
    /// Upper bound on messages drained from one thread per frame
    pub max_thread_messages_per_frame: usize,
    /// Send `ThreadSendMsg::Tick` to every running thread once per frame
    pub send_thread_ticks: bool,
    /// Catch panics in user callbacks instead of unwinding through the host
    pub isolate_callback_panics: bool,
    /// Stop timers attached to nodes when the DOM is regenerated
    pub stop_node_timers_on_refresh: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timer_interval_ms: 10,
            max_thread_messages_per_frame: 64,
            send_thread_ticks: true,
            isolate_callback_panics: true,
            stop_node_timers_on_refresh: true,
        }
    }
}

impl Config {
    pub fn default_timer_interval(&self) -> Duration {
        Duration::from_millis(self.default_timer_interval_ms)
    }
}
