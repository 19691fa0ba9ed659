//! # pace-limit
//!
//! `pace-limit` provides a lock-free token bucket pacer with reservations.
//!
//! ## Core Philosophy
//!
//! A pacer does not reject work, it schedules it. Each caller reserves the next
//! token and is told how long to wait before using it. The reservation is a single
//! Compare-And-Swap on the bucket's Theoretical Arrival Time (TAT), so concurrent
//! callers never contend on a `Mutex` and never receive the same token twice.
//!
//! ## Key Concepts
//!
//! * **Lock-Free**: No `Mutex` or `RwLock` in the hot path.
//! * **Lazy Evaluation**: Tokens are derived from the clock at the moment of the
//!   request, so there is no background refill task.
//! * **Runtime Agnostic**: The pacer only computes delays. Sleeping (and honoring
//!   cancellation while asleep) is left to the caller's runtime.
//! * **Small Bursts**: By default the bucket holds a single token, so an idle period
//!   never lets more than one request through instantly.
//!
//! ## Example
//!
//! ```rust
//! use pace_limit::Pacer;
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! let limit = NonZeroUsize::new(100).unwrap();
//! let pacer = Pacer::new(limit, Duration::from_secs(1));
//!
//! // The bucket starts full.
//! assert!(pacer.reserve().delay().is_zero());
//!
//! // The next token is (at most) one emission interval away.
//! let next = pacer.reserve();
//! assert!(next.delay() <= Duration::from_millis(10));
//! ```

use std::time::Duration;

mod pacer;

pub use pacer::Pacer;
pub use pacer::Reservation;

/// Reasons why a request might be refused by [`Pacer::process`].
#[derive(Debug, PartialEq)]
pub enum Reason {
    Overloaded { retry_after: Duration },
}
