use std::time::Duration;

/// Exponential reconnection backoff.
///
/// The delay before attempt `n` (zero-indexed from the last successful
/// connect) is `min(base * 2^n, max)`. The attempt counter advances only
/// when an attempt is scheduled after a failure; a successful connect resets
/// it, so the first reattempt after any established connection waits `base`.
#[derive(Debug)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl ReconnectBackoff {
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    /// Delay to wait before the next attempt. Advances the attempt counter.
    pub fn delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(31));
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
