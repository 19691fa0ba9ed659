use std::num::NonZeroUsize;
use std::time::Duration;

use tower::ServiceBuilder;
use tower::layer::util::Stack;

use crate::RateLimitLayer;

/// Service Builder Extension with additional useful functions for tower::ServiceBuilder.
pub trait ServiceBuilderExt<L> {
    /// Pace requests to `limit` per `unit` and retry `429` responses up to `retries` times.
    fn rate_limit_retry(
        self,
        limit: NonZeroUsize,
        unit: Duration,
        retries: usize,
    ) -> ServiceBuilder<Stack<RateLimitLayer, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn rate_limit_retry(
        self,
        limit: NonZeroUsize,
        unit: Duration,
        retries: usize,
    ) -> ServiceBuilder<Stack<RateLimitLayer, L>> {
        self.layer(RateLimitLayer::new(limit, unit).with_retries(retries))
    }
}
