use std::time::Duration;

use http::StatusCode;
use rand::Rng;

/// Jittered delay applied between attempts after a `429 Too Many Requests`.
///
/// Each delay is the full rate `unit` plus a uniformly random extra in
/// `[0, unit / 2)`, so callers rejected together do not retry together.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Backoff {
    unit: Duration,
}

impl Backoff {
    pub(crate) fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay_with(&mut rand::rng())
    }

    pub(crate) fn delay_with<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter = self.unit.mul_f64(rng.random::<f64>() / 2.0);
        self.unit.saturating_add(jitter)
    }
}

/// What to do with a response the wrapped sender produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Hand the response to the caller; its body keeps the slot.
    Final,
    /// Rejected, but attempts remain: back off and send again.
    Retry,
    /// Rejected and out of attempts: free the slot and hand back the rejection.
    Exhausted,
}

impl Outcome {
    pub(crate) fn classify(status: StatusCode, attempt: usize, retries: usize) -> Self {
        if status != StatusCode::TOO_MANY_REQUESTS {
            Outcome::Final
        } else if attempt < retries {
            Outcome::Retry
        } else {
            Outcome::Exhausted
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn delay_is_unit_plus_bounded_jitter() {
        let unit = Duration::from_secs(1);
        let backoff = Backoff::new(unit);
        let mut rng = StdRng::seed_from_u64(0x5eed);

        let mut jittered = false;
        for _ in 0..1_000 {
            let delay = backoff.delay_with(&mut rng);
            assert!(delay >= unit, "{delay:?} is shorter than the unit");
            assert!(delay < unit + unit / 2, "{delay:?} exceeds the jitter bound");
            jittered |= delay != unit;
        }
        assert!(jittered, "Delays should not all be identical");
    }

    #[test]
    fn zero_unit_has_no_delay() {
        assert_eq!(Backoff::new(Duration::ZERO).delay(), Duration::ZERO);
    }

    #[test]
    fn huge_unit_saturates() {
        let backoff = Backoff::new(Duration::MAX);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(backoff.delay_with(&mut rng), Duration::MAX);
    }

    #[test]
    fn only_too_many_requests_is_retried() {
        for status in [
            StatusCode::OK,
            StatusCode::NO_CONTENT,
            StatusCode::BAD_REQUEST,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            assert_eq!(Outcome::classify(status, 0, 5), Outcome::Final);
        }
        assert_eq!(
            Outcome::classify(StatusCode::TOO_MANY_REQUESTS, 0, 5),
            Outcome::Retry
        );
    }

    #[test]
    fn last_attempt_is_exhausted() {
        let rejected = StatusCode::TOO_MANY_REQUESTS;

        assert_eq!(Outcome::classify(rejected, 0, 0), Outcome::Exhausted);
        assert_eq!(Outcome::classify(rejected, 1, 2), Outcome::Retry);
        assert_eq!(Outcome::classify(rejected, 2, 2), Outcome::Exhausted);
    }
}
