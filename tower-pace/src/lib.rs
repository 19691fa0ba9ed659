//! # Tower Pace
//!
//! `tower-pace` is a client-side rate limiting middleware for HTTP senders built on
//! the [Tower](https://github.com/tower-rs/tower) ecosystem.
//!
//! Wrap any `tower::Service` that turns a request into an `http::Response` and the
//! resulting [`RateLimitService`] behaves like the wrapped sender, except that it:
//!
//! 1. **Bounds Concurrency**: At most `limit` requests are admitted at once. A slot is
//!    held until the caller is done with the response body, so slow readers count
//!    against the limit just like slow servers do.
//! 2. **Paces Requests**: A shared token bucket emits `limit` tokens per `unit` with a
//!    burst of one, turning bursts of calls into a steady stream.
//! 3. **Retries Rejections**: `429 Too Many Requests` responses are retried after the
//!    full `unit` plus up to half a `unit` of random jitter. When the retries run out
//!    the final 429 is returned as a normal response, not an error.
//!
//! Waiting for a pacing token can be aborted through a
//! [`CancellationToken`](tokio_util::sync::CancellationToken), which surfaces as
//! [`PaceError::Cancelled`]. Errors from the wrapped sender are passed through
//! untouched and are never retried.
//!
//! ## Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! use tower::ServiceBuilder;
//! use tower::ServiceExt;
//! use tower_pace::ServiceBuilderExt;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tower::BoxError> {
//! let sender = tower::service_fn(|_req: http::Request<()>| async {
//!     Ok::<_, tower::BoxError>(http::Response::new("hello"))
//! });
//!
//! let client = ServiceBuilder::new()
//!     .rate_limit_retry(NonZeroUsize::new(10).unwrap(), Duration::from_secs(1), 3)
//!     .service(sender);
//!
//! let response = client.oneshot(http::Request::new(())).await?;
//! assert_eq!(response.status(), http::StatusCode::OK);
//!
//! // Dropping the response (or closing its body) frees the concurrency slot.
//! drop(response);
//! # Ok(())
//! # }
//! ```

mod backoff;
mod body;
mod error;
mod gate;
mod layer;
mod service;
mod utils;


pub use body::PermitBody;
pub use error::PaceError;
pub use layer::RateLimitLayer;
pub use service::DEFAULT_RETRIES;
pub use service::RateLimitService;
pub use utils::ServiceBuilderExt;
