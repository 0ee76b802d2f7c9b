#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for WebSocket client behavior.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Config {
    /// Delay before re-dialing after an unexpected connection loss.
    ///
    /// The delay is fixed: every loss schedules exactly one retry after this
    /// duration, indefinitely, for as long as the caller wants the connection.
    /// There is no exponential growth and no attempt ceiling.
    pub reconnect_delay: Duration,
    /// Interval between keepalive frames sent while the connection is open
    pub keepalive_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

impl Config {
    /// Retry policy for the reconnect scheduler: a constant interval.
    pub(crate) fn reconnect_policy(&self) -> Constant {
        Constant::new(self.reconnect_delay)
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn reconnect_delay_is_constant_across_attempts() {
        let config = Config {
            reconnect_delay: Duration::from_millis(250),
            ..Config::default()
        };
        let mut policy = config.reconnect_policy();

        // Never gives up and never grows
        for _ in 0..10 {
            assert_eq!(policy.next_backoff(), Some(Duration::from_millis(250)));
        }
    }

    #[test]
    fn default_reconnect_delay_is_one_second() {
        let config = Config::default();
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
    }

    #[test]
    fn default_keepalive_interval_is_one_minute() {
        let config = Config::default();
        assert_eq!(config.keepalive_interval, Duration::from_secs(60));
    }
}
