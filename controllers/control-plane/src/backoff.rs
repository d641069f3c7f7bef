//! Fibonacci requeue backoff.
//!
//! Failed cycles are requeued by the controller error policy with a
//! Fibonacci-growing delay, reset as soon as a cycle succeeds. The sequence
//! grows more slowly than exponential backoff, which suits convergence
//! against a backend that is usually only briefly unavailable.

use std::time::Duration;

/// Stateful Fibonacci backoff in minutes, capped at a maximum.
///
/// Sequence for min=1, max=10: 1m, 1m, 2m, 3m, 5m, 8m, 10m, 10m, ...
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Backoff bounded by `min_minutes` and `max_minutes`.
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Returns the current delay and advances the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let result = Duration::from_secs(self.current_minutes * 60);
        let next = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next.min(self.max_minutes);
        result
    }

    /// Restarts the sequence after a successful cycle.
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn follows_the_fibonacci_sequence_in_minutes() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        assert_eq!(backoff.next_backoff(), minutes(1));
        assert_eq!(backoff.next_backoff(), minutes(1));
        assert_eq!(backoff.next_backoff(), minutes(2));
        assert_eq!(backoff.next_backoff(), minutes(3));
        assert_eq!(backoff.next_backoff(), minutes(5));
        assert_eq!(backoff.next_backoff(), minutes(8));
    }

    #[test]
    fn caps_at_the_maximum() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        for _ in 0..7 {
            backoff.next_backoff();
        }
        assert_eq!(backoff.next_backoff(), minutes(10));
        assert_eq!(backoff.next_backoff(), minutes(10));
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        backoff.next_backoff();
        backoff.next_backoff();
        backoff.next_backoff();
        backoff.reset();
        assert_eq!(backoff.next_backoff(), minutes(1));
        assert_eq!(backoff.next_backoff(), minutes(1));
        assert_eq!(backoff.next_backoff(), minutes(2));
    }
}
