use std::time::Duration;

/// Immutable configuration for one race.
///
/// The delay schedule staggers redundant variants instead of firing them all
/// at once: index 0 dispatches immediately, index 1 after `stagger_delay`,
/// index k >= 2 after `fallback_delay` plus `(k - 2) * stagger_delay`. Zero
/// delays are legal and dispatch variants back-to-back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaceOptions {
    timeout: Duration,
    max_concurrent: usize,
    stagger_delay: Duration,
    fallback_delay: Duration,
    retry_on_failure: bool,
}

impl RaceOptions {
    pub const fn standard() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_concurrent: 3,
            stagger_delay: Duration::from_millis(500),
            fallback_delay: Duration::from_millis(2000),
            retry_on_failure: true,
        }
    }

    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub const fn stagger_delay(mut self, stagger_delay: Duration) -> Self {
        self.stagger_delay = stagger_delay;
        self
    }

    pub const fn fallback_delay(mut self, fallback_delay: Duration) -> Self {
        self.fallback_delay = fallback_delay;
        self
    }

    pub const fn retry_on_failure(mut self, retry_on_failure: bool) -> Self {
        self.retry_on_failure = retry_on_failure;
        self
    }

    pub const fn configured_timeout(self) -> Duration {
        self.timeout
    }

    pub const fn configured_max_concurrent(self) -> usize {
        self.max_concurrent
    }

    pub const fn configured_stagger_delay(self) -> Duration {
        self.stagger_delay
    }

    pub const fn configured_fallback_delay(self) -> Duration {
        self.fallback_delay
    }

    pub const fn configured_retry_on_failure(self) -> bool {
        self.retry_on_failure
    }

    /// Delay before the variant at `index` is dispatched.
    pub(crate) fn dispatch_delay(self, index: usize) -> Duration {
        match index {
            0 => Duration::ZERO,
            1 => self.stagger_delay,
            later => self.fallback_delay + self.stagger_delay * (later as u32 - 2),
        }
    }

    /// Derives the conservative option set for the single escalation pass:
    /// longer timeout, at most two concurrent variants, doubled stagger, and
    /// escalation itself switched off so the rerun cannot recurse.
    pub(crate) fn escalated(self, variant_count: usize) -> Self {
        Self {
            timeout: self.timeout.mul_f64(1.5),
            max_concurrent: 2.min(variant_count.max(1)),
            stagger_delay: self.stagger_delay * 2,
            fallback_delay: self.fallback_delay,
            retry_on_failure: false,
        }
    }
}

impl Default for RaceOptions {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RaceOptions;

    #[test]
    fn dispatch_schedule_staggers_later_variants() {
        let options = RaceOptions::standard()
            .stagger_delay(Duration::from_millis(500))
            .fallback_delay(Duration::from_millis(2000));

        assert_eq!(options.dispatch_delay(0), Duration::ZERO);
        assert_eq!(options.dispatch_delay(1), Duration::from_millis(500));
        assert_eq!(options.dispatch_delay(2), Duration::from_millis(2000));
        assert_eq!(options.dispatch_delay(3), Duration::from_millis(2500));
        assert_eq!(options.dispatch_delay(4), Duration::from_millis(3000));
    }

    #[test]
    fn zero_delays_dispatch_back_to_back() {
        let options = RaceOptions::standard()
            .stagger_delay(Duration::ZERO)
            .fallback_delay(Duration::ZERO);

        for index in 0..4 {
            assert_eq!(options.dispatch_delay(index), Duration::ZERO);
        }
    }

    #[test]
    fn escalated_options_are_more_conservative() {
        let primary = RaceOptions::standard()
            .timeout(Duration::from_secs(60))
            .max_concurrent(3)
            .stagger_delay(Duration::from_millis(800))
            .fallback_delay(Duration::from_millis(3000))
            .retry_on_failure(true);

        let escalated = primary.escalated(3);
        assert_eq!(escalated.configured_timeout(), Duration::from_secs(90));
        assert_eq!(escalated.configured_max_concurrent(), 2);
        assert_eq!(escalated.configured_stagger_delay(), Duration::from_millis(1600));
        assert_eq!(escalated.configured_fallback_delay(), Duration::from_millis(3000));
        assert!(!escalated.configured_retry_on_failure());
    }

    #[test]
    fn escalated_concurrency_never_exceeds_variant_count() {
        let primary = RaceOptions::standard();
        assert_eq!(primary.escalated(1).configured_max_concurrent(), 1);
        assert_eq!(primary.escalated(2).configured_max_concurrent(), 2);
        assert_eq!(primary.escalated(5).configured_max_concurrent(), 2);
    }

    #[test]
    fn max_concurrent_is_clamped_to_at_least_one() {
        assert_eq!(RaceOptions::standard().max_concurrent(0).configured_max_concurrent(), 1);
    }
}
