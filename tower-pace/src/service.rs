use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use http::Response;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pace_limit::Pacer;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tower::Service;
use tower::ServiceExt;
use tracing::debug;
use tracing::trace;

use crate::PaceError;
use crate::PermitBody;
use crate::backoff::Backoff;
use crate::backoff::Outcome;
use crate::gate::ConcurrencyGate;

/// Number of times a `429 Too Many Requests` is retried unless configured otherwise.
pub const DEFAULT_RETRIES: usize = 5;

#[derive(Clone, Debug)]
struct RateLimitServiceMetrics {
    retries: Counter<u64>,
    exhausted: Counter<u64>,
    cancelled: Counter<u64>,
}

/// State shared by every clone of a [`RateLimitService`] and every service built by
/// the same [`RateLimitLayer`](crate::RateLimitLayer).
#[derive(Debug)]
pub(crate) struct Shared {
    limit: NonZeroUsize,
    unit: Duration,
    retries: AtomicUsize,
    pacer: Pacer,
    gate: ConcurrencyGate,
    backoff: Backoff,
    cancel: CancellationToken,
    instruments: RateLimitServiceMetrics,
}

impl Shared {
    pub(crate) fn new(
        limit: NonZeroUsize,
        unit: Duration,
        retries: usize,
        cancel: CancellationToken,
    ) -> Self {
        let meter = global::meter("rate_limit_service");
        let instruments = RateLimitServiceMetrics {
            retries: meter.u64_counter("retries").build(),
            exhausted: meter.u64_counter("retries_exhausted").build(),
            cancelled: meter.u64_counter("pacer_cancelled").build(),
        };

        Self {
            limit,
            unit,
            retries: AtomicUsize::new(retries),
            pacer: Pacer::new(limit, unit),
            gate: ConcurrencyGate::new(limit),
            backoff: Backoff::new(unit),
            cancel,
            instruments,
        }
    }

    pub(crate) fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    pub(crate) fn unit(&self) -> Duration {
        self.unit
    }

    pub(crate) fn retries(&self) -> usize {
        self.retries.load(Ordering::Relaxed)
    }

    pub(crate) fn set_retries(&self, retries: usize) {
        self.retries.store(retries, Ordering::Relaxed);
    }

    /// Waits for the next pacing token, giving up if the cancellation token fires.
    async fn pace(&self) -> Result<(), PaceError> {
        if self.cancel.is_cancelled() {
            self.instruments.cancelled.add(1, &[]);
            return Err(PaceError::Cancelled);
        }

        let reservation = self.pacer.reserve();
        let delay = reservation.delay();
        if delay.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = sleep(delay) => Ok(()),
            _ = self.cancel.cancelled() => {
                let restored = self.pacer.cancel(reservation);
                self.instruments.cancelled.add(1, &[]);
                debug!(?delay, restored, "cancelled while waiting for a pacing token");
                Err(PaceError::Cancelled)
            }
        }
    }

    async fn send<S, Req, B>(
        &self,
        mut inner: S,
        req: Req,
    ) -> Result<Response<PermitBody<B>>, BoxError>
    where
        S: Service<Req, Response = Response<B>>,
        S::Error: Into<BoxError>,
        Req: Clone,
    {
        // Released on every early return below, unless moved into the body.
        let slot = self.gate.acquire().await?;
        trace!(
            in_use = self.gate.in_use(),
            capacity = self.gate.capacity(),
            "admitted by concurrency gate"
        );

        self.pace().await?;

        let retries = self.retries();
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                inner.ready().await.map_err(Into::<BoxError>::into)?;
            }
            let response = inner
                .call(req.clone())
                .await
                .map_err(Into::<BoxError>::into)?;

            match Outcome::classify(response.status(), attempt, retries) {
                Outcome::Final => {
                    return Ok(response.map(|body| PermitBody::new(body, slot)));
                }
                Outcome::Exhausted => {
                    drop(slot);
                    self.instruments
                        .exhausted
                        .add(1, &[KeyValue::new("retries", retries as i64)]);
                    debug!(attempts = attempt + 1, "rate limit retries exhausted");
                    return Ok(response.map(PermitBody::released));
                }
                Outcome::Retry => {
                    drop(response);
                    let delay = self.backoff.delay();
                    self.instruments.retries.add(1, &[]);
                    debug!(attempt, ?delay, "rate limited by downstream; backing off");
                    // The slot stays claimed while we back off.
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Paces requests to a wrapped sender and retries `429 Too Many Requests`.
///
/// Every call:
///
/// 1. claims one of `limit` concurrency slots, waiting while all are taken;
/// 2. waits for a pacing token (`limit` per `unit`, burst of one), unless the
///    cancellation token fires first;
/// 3. sends the request, retrying after `unit` plus jitter whenever the response is
///    a 429, up to [`retries`](Self::retries) times.
///
/// A successful response carries the slot in its [`PermitBody`]; dropping, closing or
/// draining the body frees it. Transport errors are returned as-is and never retried.
/// A 429 that survives every retry is returned as an ordinary response, so callers
/// must check the status code as well as the error.
///
/// The request is cloned for every attempt, which is why it must be `Clone`. A request
/// whose body can only be read once cannot be retried.
#[derive(Debug)]
pub struct RateLimitService<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S> Clone for RateLimitService<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, Req, B> Service<Req> for RateLimitService<S>
where
    S: Service<Req, Response = Response<B>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    B: Send + 'static,
{
    type Response = Response<PermitBody<B>>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // The ready service moves into the future and a fresh clone stays behind.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let shared = Arc::clone(&self.shared);

        Box::pin(async move { shared.send(inner, req).await })
    }
}

impl<S> RateLimitService<S> {
    /// Wraps `inner`, admitting at most `limit` requests per `unit`.
    pub fn new(inner: S, limit: NonZeroUsize, unit: Duration) -> Self {
        let shared = Shared::new(limit, unit, DEFAULT_RETRIES, CancellationToken::new());
        Self::with_shared(inner, Arc::new(shared))
    }

    pub(crate) fn with_shared(inner: S, shared: Arc<Shared>) -> Self {
        Self { inner, shared }
    }

    pub fn with_retries(self, retries: usize) -> Self {
        self.set_retries(retries);
        self
    }

    /// Changes the retry count for calls that start from now on.
    ///
    /// The count is shared with every clone of this service.
    pub fn set_retries(&self, retries: usize) {
        self.shared.set_retries(retries);
    }

    pub fn retries(&self) -> usize {
        self.shared.retries()
    }

    pub fn limit(&self) -> NonZeroUsize {
        self.shared.limit()
    }

    pub fn unit(&self) -> Duration {
        self.shared.unit()
    }

    /// Concurrency slots not currently held by a request or a response body.
    pub fn available_slots(&self) -> usize {
        self.shared.gate.available()
    }

    /// Token that aborts pending pacing waits when cancelled.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.shared.cancel
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}
