//! [`AsyncRead`] and [`AsyncWrite`] rate limiters.
//!
//! These spend tokens from the same kind of [`Bucket`] as the blocking
//! adapters, but never block a thread: where [`Bucket::take`] would sleep,
//! they register a tokio timer and return [`Poll::Pending`].  The bucket's lock
//! is not held while waiting, so other users of the bucket are not held up.
//!
//! Unlike the blocking adapters, each poll performs at most one transfer on
//! the inner stream, as usual for async I/O.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::{AsyncRead, AsyncWrite};
use tokio_crate::time::Sleep;
use tracing::trace;

use crate::bucket::Bucket;
use crate::clock::{Clock, TokioClock};
use crate::throttle::{to_u64, to_usize_saturating};

/// A pending sleep, if we are waiting for the bucket to refill.
type SleepSlot = Option<Pin<Box<Sleep>>>;

/// Wait until `bucket` hands out tokens to move up to `want` bytes.
///
/// Must not be called with `want == 0`.
fn poll_tokens<C: Clock>(
    bucket: &Bucket<C>,
    sleep_fut: &mut SleepSlot,
    cx: &mut Context<'_>,
    want: usize,
) -> Poll<u64> {
    loop {
        if let Some(fut) = sleep_fut.as_mut() {
            ready!(fut.as_mut().poll(cx));
            *sleep_fut = None;
        }
        match bucket.try_take(to_u64(want)) {
            Ok(granted) => return Poll::Ready(granted),
            Err(wait) => {
                trace!("Waiting {:?} for bucket refill", wait);
                *sleep_fut = Some(Box::pin(tokio_crate::time::sleep(wait)));
            }
        }
    }
}

/// Give back the tokens that an inner poll did not use.
///
/// `len` is the number of bytes the inner stream was offered.
fn settle<C: Clock>(bucket: &Bucket<C>, granted: u64, len: usize, rv: &Poll<io::Result<usize>>) {
    let used = match rv {
        // nothing was transferred, so give everything back
        Poll::Pending | Poll::Ready(Err(_)) => 0,
        Poll::Ready(Ok(n)) => std::cmp::min(*n, len),
    };
    let unused = granted - to_u64(used);
    if unused > 0 {
        trace!("Returning {} unused tokens", unused);
        bucket.return_tokens(unused);
    }
}

/// A rate-limited async [reader](AsyncRead).
///
/// The bucket should use a [`TokioClock`], so that it agrees with the timers
/// this reader sleeps on.
#[derive(educe::Educe)]
#[educe(Debug)]
#[pin_project::pin_project]
pub struct AsyncRateLimitedReader<R, C: Clock = TokioClock> {
    /// The inner reader.
    #[educe(Debug(ignore))]
    #[pin]
    inner: R,
    /// The bucket we take tokens from.
    bucket: Arc<Bucket<C>>,
    /// Set while we wait for the bucket to refill.
    #[educe(Debug(ignore))]
    sleep_fut: SleepSlot,
}

impl<R: AsyncRead, C: Clock> AsyncRateLimitedReader<R, C> {
    /// Create a new [`AsyncRateLimitedReader`] drawing tokens from `bucket`.
    pub fn new(inner: R, bucket: Arc<Bucket<C>>) -> Self {
        AsyncRateLimitedReader {
            inner,
            bucket,
            sleep_fut: None,
        }
    }

    /// Access the inner reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Unwrap this reader, returning the inner one.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// The bucket this reader takes tokens from.
    pub fn bucket(&self) -> &Arc<Bucket<C>> {
        &self.bucket
    }
}

impl<R: AsyncRead, C: Clock> AsyncRead for AsyncRateLimitedReader<R, C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        if buf.is_empty() {
            return this.inner.poll_read(cx, buf);
        }

        let bucket: &Bucket<C> = this.bucket;
        let granted = ready!(poll_tokens(bucket, this.sleep_fut, cx, buf.len()));
        let len = std::cmp::min(to_usize_saturating(granted), buf.len());
        let rv = this.inner.poll_read(cx, &mut buf[..len]);
        settle(bucket, granted, len, &rv);
        rv
    }
}

/// A rate-limited async [writer](AsyncWrite).
///
/// The bucket should use a [`TokioClock`], so that it agrees with the timers
/// this writer sleeps on.
#[derive(educe::Educe)]
#[educe(Debug)]
#[pin_project::pin_project]
pub struct AsyncRateLimitedWriter<W, C: Clock = TokioClock> {
    /// The inner writer.
    #[educe(Debug(ignore))]
    #[pin]
    inner: W,
    /// The bucket we take tokens from.
    bucket: Arc<Bucket<C>>,
    /// Set while we wait for the bucket to refill.
    #[educe(Debug(ignore))]
    sleep_fut: SleepSlot,
}

impl<W: AsyncWrite, C: Clock> AsyncRateLimitedWriter<W, C> {
    /// Create a new [`AsyncRateLimitedWriter`] drawing tokens from `bucket`.
    pub fn new(inner: W, bucket: Arc<Bucket<C>>) -> Self {
        AsyncRateLimitedWriter {
            inner,
            bucket,
            sleep_fut: None,
        }
    }

    /// Access the inner writer.
    pub fn inner(&self) -> &W {
        &self.inner
    }

    /// Unwrap this writer, returning the inner one.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// The bucket this writer takes tokens from.
    pub fn bucket(&self) -> &Arc<Bucket<C>> {
        &self.bucket
    }
}

impl<W: AsyncWrite, C: Clock> AsyncWrite for AsyncRateLimitedWriter<W, C> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        // for an empty buffer, just defer to the inner writer's impl
        if buf.is_empty() {
            return this.inner.poll_write(cx, buf);
        }

        let bucket: &Bucket<C> = this.bucket;
        let granted = ready!(poll_tokens(bucket, this.sleep_fut, cx, buf.len()));
        let len = std::cmp::min(to_usize_saturating(granted), buf.len());
        let rv = this.inner.poll_write(cx, &buf[..len]);
        settle(bucket, granted, len, &rv);
        rv
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_close(cx)
    }
}

/// Implementations of tokio's I/O traits, in terms of the `futures` ones.
mod tokio_impl {
    use super::*;

    use tokio_crate::io::{AsyncRead as TokioAsyncRead, AsyncWrite as TokioAsyncWrite, ReadBuf};
    use tokio_util::compat::FuturesAsyncReadCompatExt;

    impl<R: AsyncRead, C: Clock> TokioAsyncRead for AsyncRateLimitedReader<R, C> {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            // `compat` deals with filling a `ReadBuf` from a plain byte slice.
            TokioAsyncRead::poll_read(Pin::new(&mut self.compat()), cx, buf)
        }
    }

    // Writing needs no adaptation: both traits take a plain byte slice.
    impl<W: AsyncWrite, C: Clock> TokioAsyncWrite for AsyncRateLimitedWriter<W, C> {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            AsyncWrite::poll_write(self, cx, buf)
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            AsyncWrite::poll_flush(self, cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            AsyncWrite::poll_close(self, cx)
        }
    }
}

impl<C: Clock> Bucket<C> {
    /// Wrap the async `reader`, limiting its transfer rate with this bucket.
    pub fn async_reader<R: AsyncRead>(self: &Arc<Self>, reader: R) -> AsyncRateLimitedReader<R, C> {
        AsyncRateLimitedReader::new(reader, Arc::clone(self))
    }

    /// Wrap the async `writer`, limiting its transfer rate with this bucket.
    pub fn async_writer<W: AsyncWrite>(
        self: &Arc<Self>,
        writer: W,
    ) -> AsyncRateLimitedWriter<W, C> {
        AsyncRateLimitedWriter::new(writer, Arc::clone(self))
    }
}
