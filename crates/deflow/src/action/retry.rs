//! Exponential delays for re-scheduling an item.

use std::time::Duration;

/// Exponential backoff between re-schedulings of an item.
///
/// # Backoff Calculation
///
/// The delay before recurrence N is: `min(base_delay * 2^(N-1), max_delay)`
///
/// With defaults (base=1s, max=300s):
/// - Recurrence 1: 1s delay
/// - Recurrence 2: 2s delay
/// - Recurrence 3: 4s delay
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use deflow::Backoff;
///
/// let backoff = Backoff::default();
/// assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
///
/// let capped = Backoff::new(Duration::from_secs(10), Duration::from_secs(30));
/// assert_eq!(capped.delay_for(5), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first re-scheduling. Default: 1 second.
    pub base_delay: Duration,

    /// Upper bound on any delay. Default: 5 minutes.
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl Backoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay before the given recurrence (1-based).
    pub fn delay_for(&self, recurrence: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(recurrence.saturating_sub(1));
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }
}
