//! # Runtime configuration.
//!
//! Provides [`Config`] centralized settings for [`Runtime`](crate::Runtime).
//!
//! ## Sentinel values
//! - `start_delay = 0s` → units start immediately
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Settings for one [`Runtime`](crate::Runtime).
///
/// ## Field semantics
/// - `start_delay`: idle time before each unit invokes its work function (`0s` = none)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `handle_signals`: listen for SIGINT/SIGTERM (Ctrl-C on Windows) while running
/// - `force_exit_code`: exit status used by the third interrupt
#[derive(Clone, Debug)]
pub struct Config {
    /// Initial start delay; see [`Runtime::set_start_delay`](crate::Runtime::set_start_delay).
    pub start_delay: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers lagging behind more than `bus_capacity` events skip older ones.
    pub bus_capacity: usize,

    /// Whether `run` installs OS interrupt listeners driving the escalation machine.
    ///
    /// Disable when embedding under a host that owns signal handling, or in tests; the
    /// machine can still be driven by [`Runtime::interrupt`](crate::Runtime::interrupt).
    pub handle_signals: bool,

    /// Process exit status on forced termination.
    pub force_exit_code: i32,
}

impl Config {
    /// Returns the start delay as an `Option` (`None` when zero).
    #[inline]
    pub fn start_delay(&self) -> Option<Duration> {
        (!self.start_delay.is_zero()).then_some(self.start_delay)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `start_delay = 0s`
    /// - `bus_capacity = 1024`
    /// - `handle_signals = true`
    /// - `force_exit_code = 130` (conventional for SIGINT)
    fn default() -> Self {
        Self {
            start_delay: Duration::ZERO,
            bus_capacity: 1024,
            handle_signals: true,
            force_exit_code: 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let mut cfg = Config::default();
        assert_eq!(cfg.start_delay(), None);
        cfg.start_delay = Duration::from_millis(5);
        assert_eq!(cfg.start_delay(), Some(Duration::from_millis(5)));

        cfg.bus_capacity = 0;
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
