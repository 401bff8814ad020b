//! Jittered exponential backoff for watch reconnection.
//!
//! Repeated transport failures back off exponentially with full jitter: each
//! delay is drawn uniformly between the minimum and the current envelope,
//! and the envelope doubles per failure up to a hard cap. Any successful
//! event resets the envelope to the minimum.

use std::time::{Duration, SystemTime};

/// Default minimum delay (1 second).
pub const BACKOFF_MIN: Duration = Duration::from_secs(1);

/// Default maximum delay (10 minutes).
pub const BACKOFF_MAX: Duration = Duration::from_secs(600);

/// Exponential backoff generator with full jitter.
///
/// ```rust
/// use gru_core::backoff::Backoff;
///
/// let mut backoff = Backoff::new();
/// let first = backoff.next_delay();
/// let second = backoff.next_delay();
/// assert!(second <= first * 4);
/// backoff.reset();
/// ```
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    envelope: Duration,
    state: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    /// Creates a generator with the default 1 s → 10 min bounds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bounds(BACKOFF_MIN, BACKOFF_MAX)
    }

    /// Creates a generator with custom bounds.
    #[must_use]
    pub fn with_bounds(min: Duration, max: Duration) -> Self {
        // Simple linear congruential generator for jitter
        // (avoids a full rand dependency for this simple case)
        let seed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        Self {
            min,
            max: max.max(min),
            envelope: min,
            state: u64::from(seed) | 1,
        }
    }

    /// Replaces the jitter seed, for deterministic tests.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.state = seed | 1;
        self
    }

    /// Returns the current envelope the next delay will be drawn from.
    #[must_use]
    pub const fn envelope(&self) -> Duration {
        self.envelope
    }

    /// Draws the next delay and doubles the envelope up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let cap = self.envelope;
        self.envelope = cap.saturating_mul(2).min(self.max);

        let span_ms = u64::try_from(cap.saturating_sub(self.min).as_millis()).unwrap_or(u64::MAX);
        if span_ms == 0 {
            return self.min;
        }
        let jitter_ms = self.next_u64() % (span_ms + 1);
        self.min + Duration::from_millis(jitter_ms)
    }

    /// Resets the envelope to the minimum after a successful event.
    pub fn reset(&mut self) {
        self.envelope = self.min;
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state >> 16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_stay_within_envelope() {
        let mut backoff = Backoff::new().with_seed(42);
        let mut cap = BACKOFF_MIN;
        for _ in 0..16 {
            let expected_cap = cap;
            let delay = backoff.next_delay();
            assert!(delay >= BACKOFF_MIN, "delay {delay:?} below minimum");
            assert!(delay <= expected_cap, "delay {delay:?} above {expected_cap:?}");
            cap = cap.saturating_mul(2).min(BACKOFF_MAX);
        }
    }

    #[test]
    fn envelope_doubles_and_caps() {
        let mut backoff = Backoff::new().with_seed(7);
        let mut previous = Duration::ZERO;
        for _ in 0..16 {
            let envelope = backoff.envelope();
            assert!(envelope >= previous);
            assert!(envelope <= BACKOFF_MAX);
            previous = envelope;
            let _ = backoff.next_delay();
        }
        assert_eq!(backoff.envelope(), BACKOFF_MAX);
    }

    #[test]
    fn reset_returns_to_minimum() {
        let mut backoff = Backoff::new().with_seed(9);
        for _ in 0..5 {
            let _ = backoff.next_delay();
        }
        assert!(backoff.envelope() > BACKOFF_MIN);

        backoff.reset();
        assert_eq!(backoff.envelope(), BACKOFF_MIN);
        assert_eq!(backoff.next_delay(), BACKOFF_MIN);
    }

    #[test]
    fn custom_bounds_are_respected() {
        let mut backoff =
            Backoff::with_bounds(Duration::from_millis(10), Duration::from_millis(40))
                .with_seed(3);
        for _ in 0..10 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(40));
        }
    }
}
