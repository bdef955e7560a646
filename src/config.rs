use std::time::Duration;

/// How a blocked call waits for the ring to make progress.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum WaitStrategy {
    /// Busy-spin without yielding the processor.
    ///
    /// Lowest latency; burns a core while blocked.
    Spin,

    /// Spin briefly, then yield to the scheduler between polls.
    #[default]
    Yield,

    /// Spin briefly, then park the thread until the other side signals
    /// progress.
    ///
    /// Publishing into a channel configured to park pays for a waiter check;
    /// the other strategies keep the hot path free of it.
    Park,
}

impl WaitStrategy {
    #[inline]
    pub(crate) fn parks(&self) -> bool {
        matches!(self, WaitStrategy::Park)
    }
}

/// Channel configuration beyond the capacity.
///
/// `timeout` is the default deadline applied by [`Sender::send`] and
/// [`Receiver::recv`]; `None` means those calls block until the channel makes
/// progress or closes. The `*_timeout` call variants override it.
///
/// [`Sender::send`]: crate::Sender::send
/// [`Receiver::recv`]: crate::Receiver::recv
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Config {
    pub wait: WaitStrategy,
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn new() -> Self {
        Default::default()
    }

    /// Replaces the wait strategy.
    pub fn wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Sets the default deadline for the blocking calls.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_calls_default_to_yielding_without_a_deadline() {
        let config = Config::new();
        assert_eq!(config.wait, WaitStrategy::Yield);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn only_the_park_strategy_parks() {
        assert!(!WaitStrategy::Spin.parks());
        assert!(!WaitStrategy::Yield.parks());
        assert!(WaitStrategy::Park.parks());
    }

    #[test]
    fn config_is_built_by_chaining() {
        let config = Config::new()
            .wait(WaitStrategy::Park)
            .timeout(Duration::from_millis(50));

        assert_eq!(config.wait, WaitStrategy::Park);
        assert_eq!(config.timeout, Some(Duration::from_millis(50)));
    }
}
