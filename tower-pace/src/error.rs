/// Errors produced by the Tower Pace middleware itself.
///
/// Failures of the wrapped sender are never converted into a `PaceError`; they are
/// returned to the caller unchanged. Use `downcast_ref::<PaceError>()` on the
/// returned [`tower::BoxError`] to tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaceError {
    /// The cancellation token fired before a pacing token became available.
    ///
    /// No request was dispatched and the concurrency slot has been released.
    #[error("Cancelled while waiting for rate limit capacity")]
    Cancelled,

    /// The concurrency gate was closed and can no longer admit requests.
    #[error("Concurrency gate is closed")]
    GateClosed,
}
