use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

/// How a failed request is retried.
///
/// Only transient failures that happen before the first fragment arrives
/// are retried. Delays double from `base_delay` up to `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// The delay before the first retry.
    pub base_delay: Duration,
    /// The upper bound of a single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that sends every request exactly once.
    pub const NEVER: Self = Self {
        max_attempts: 1,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    pub(crate) fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(self.max_delay)
            .with_max_elapsed_time(None)
            .build()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff;

    use super::*;

    #[test]
    fn test_delays_are_capped() {
        let mut backoff = RetryPolicy::default().backoff();
        let delays: Vec<_> = (0..4)
            .filter_map(|_| backoff.next_backoff())
            .map(|delay| delay.as_secs())
            .collect();
        assert_eq!(delays, [5, 10, 15, 15]);
    }
}
