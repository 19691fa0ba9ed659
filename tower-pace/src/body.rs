use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use http_body::Body;
use http_body::Frame;
use http_body::SizeHint;
use pin_project_lite::pin_project;

use crate::gate::Slot;

pin_project! {
    /// A response body that holds its request's concurrency slot.
    ///
    /// A caller still reading the body is still using capacity, so the slot is only
    /// handed back when the body is closed, drained to the end, or dropped,
    /// whichever happens first. Holding on to the body (or the response it came
    /// in) keeps the slot occupied.
    #[derive(Debug)]
    pub struct PermitBody<B> {
        #[pin]
        inner: B,
        slot: Option<Slot>,
    }
}

impl<B> PermitBody<B> {
    pub(crate) fn new(inner: B, slot: Slot) -> Self {
        Self {
            inner,
            slot: Some(slot),
        }
    }

    /// A body whose slot has already been given back.
    pub(crate) fn released(inner: B) -> Self {
        Self { inner, slot: None }
    }

    /// Releases the slot without waiting for the body to be dropped.
    ///
    /// Returns `true` only for the call that actually released it; closing an
    /// already closed body is a no-op.
    pub fn close(&mut self) -> bool {
        self.slot.take().is_some()
    }

    /// Whether this body still occupies a concurrency slot.
    pub fn holds_slot(&self) -> bool {
        self.slot.is_some()
    }

    pub fn get_ref(&self) -> &B {
        &self.inner
    }

    /// Unwraps the body, releasing the slot.
    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B> Body for PermitBody<B>
where
    B: Body,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let frame = ready!(this.inner.poll_frame(cx));
        if frame.is_none() {
            // Drained.
            this.slot.take();
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
