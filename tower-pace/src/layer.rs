use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower::Layer;

use crate::service::DEFAULT_RETRIES;
use crate::service::RateLimitService;
use crate::service::Shared;

/// Applies pacing, a concurrency ceiling and 429 retries to requests.
///
/// Every service produced by one layer (and every clone of those services) draws
/// from the same pacer and the same pool of `limit` concurrency slots.
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    shared: Arc<Shared>,
}

impl RateLimitLayer {
    /// Create a RateLimitLayer admitting at most `limit` requests per `unit`.
    pub fn new(limit: NonZeroUsize, unit: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::new(
                limit,
                unit,
                DEFAULT_RETRIES,
                CancellationToken::new(),
            )),
        }
    }

    /// Set how many times a `429 Too Many Requests` response is retried.
    ///
    /// With `0` the first rejection is returned to the caller as-is.
    pub fn with_retries(self, retries: usize) -> Self {
        self.shared.set_retries(retries);
        self
    }

    /// Set the token that aborts pending pacing waits.
    ///
    /// Once `token` is cancelled, calls still waiting for a pacing token fail with
    /// `PaceError::Cancelled`. Requests already dispatched, and retries already
    /// backing off, run to completion.
    ///
    /// This starts a fresh pacer and concurrency gate, so configure the layer before
    /// building services from it.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            shared: Arc::new(Shared::new(
                self.shared.limit(),
                self.shared.unit(),
                self.shared.retries(),
                token,
            )),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService::with_shared(service, Arc::clone(&self.shared))
    }
}
