use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use quanta::Clock;
use quanta::Instant;

use crate::Reason;

/// Token bucket pacer expressed as a Generic Cell Rate Algorithm.
///
/// Tokens are emitted every `period / limit`. The bucket holds `burst` tokens
/// (1 unless configured otherwise), so after an idle period at most `burst`
/// requests proceed without waiting.
#[derive(Debug)]
pub struct Pacer {
    /// Theoretical Arrival Time (TAT) in nanoseconds since `anchor`.
    tat: AtomicU64,
    interval_ns: u64,
    tolerance_ns: u64,
    burst: usize,
    clock: Clock,
    /// A fixed point in time (TSC tick) to calculate deltas from.
    anchor: Instant,
}

/// A token claimed from a [`Pacer`].
///
/// The token may only be used once `delay` has elapsed. A reservation that will not
/// be used should be handed back with [`Pacer::cancel`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a reservation holds a token until its delay elapses or it is cancelled"]
pub struct Reservation {
    delay: Duration,
    previous: u64,
    tat: u64,
}

impl Reservation {
    /// How long the caller must wait before acting on this token.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Pacer {
    pub fn new(limit: NonZeroUsize, period: Duration) -> Self {
        Self::with_clock(limit, period, Clock::new())
    }

    pub fn with_clock(limit: NonZeroUsize, period: Duration, clock: Clock) -> Self {
        let anchor = clock.now();
        let period_ns = u64::try_from(period.as_nanos()).unwrap_or(u64::MAX);

        Self {
            tat: AtomicU64::new(0),
            interval_ns: period_ns / limit.get() as u64,
            tolerance_ns: 0,
            burst: 1,
            clock,
            anchor,
        }
    }

    /// Allow up to `burst` tokens to accumulate while the pacer is idle.
    pub fn with_burst(mut self, burst: NonZeroUsize) -> Self {
        self.burst = burst.get();
        self.tolerance_ns = (burst.get() as u64 - 1).saturating_mul(self.interval_ns);
        self
    }

    /// Time between two consecutive tokens.
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_ns)
    }

    pub fn burst(&self) -> usize {
        self.burst
    }

    /// Claims the next token, however far in the future it is.
    ///
    /// Never fails: under contention callers simply queue up further along the
    /// timeline, one emission interval apart.
    pub fn reserve(&self) -> Reservation {
        let now = self.now_ns();

        loop {
            let tat = self.tat.load(Ordering::Acquire);

            let start = tat.max(now);
            let next_tat = start.saturating_add(self.interval_ns);
            let ready = start.saturating_sub(self.tolerance_ns).max(now);

            if self
                .tat
                .compare_exchange_weak(tat, next_tat, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Reservation {
                    delay: Duration::from_nanos(ready - now),
                    previous: tat,
                    tat: next_tat,
                };
            }
        }
    }

    /// Takes a token only if one is available right now.
    ///
    /// # Errors
    ///
    /// Returns `Reason` with the time until the next token if the bucket is empty.
    /// Nothing is consumed in that case.
    pub fn process(&self) -> ControlFlow<Reason> {
        let now = self.now_ns();

        loop {
            let tat = self.tat.load(Ordering::Acquire);

            let start = tat.max(now);
            let ready = start.saturating_sub(self.tolerance_ns);
            if ready > now {
                return ControlFlow::Break(Reason::Overloaded {
                    retry_after: Duration::from_nanos(ready - now),
                });
            }

            if self
                .tat
                .compare_exchange_weak(
                    tat,
                    start.saturating_add(self.interval_ns),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return ControlFlow::Continue(());
            }
        }
    }

    /// Returns an unused reservation to the bucket.
    ///
    /// Only the most recent reservation can be rolled back; if later callers have
    /// already queued behind it the token stays spent. Returns whether the token
    /// was restored.
    pub fn cancel(&self, reservation: Reservation) -> bool {
        self.tat
            .compare_exchange(
                reservation.tat,
                reservation.previous,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    fn now_ns(&self) -> u64 {
        let elapsed = self.clock.now().duration_since(self.anchor);
        u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
    }
}
