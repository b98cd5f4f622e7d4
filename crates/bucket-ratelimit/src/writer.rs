//! A rate-limited [`Write`]r.

use std::io::{self, Write};
use std::sync::Arc;

use crate::bucket::Bucket;
use crate::clock::{Clock, SystemClock};
use crate::throttle::transfer;

/// A rate-limited [writer](Write).
///
/// This can be used as a wrapper around an existing [`Write`] writer.  Every
/// byte written spends one token from a [`Bucket`], which may be shared with
/// other readers and writers.
#[derive(educe::Educe)]
#[educe(Debug)]
pub struct RateLimitedWriter<W, C: Clock = SystemClock> {
    /// The inner writer.
    #[educe(Debug(ignore))]
    inner: W,
    /// The bucket we take tokens from.
    bucket: Arc<Bucket<C>>,
}

impl<W: Write, C: Clock> RateLimitedWriter<W, C> {
    /// Create a new [`RateLimitedWriter`] drawing tokens from `bucket`.
    pub fn new(inner: W, bucket: Arc<Bucket<C>>) -> Self {
        RateLimitedWriter { inner, bucket }
    }
}

impl<W, C: Clock> RateLimitedWriter<W, C> {
    /// Access the inner writer.
    pub fn inner(&self) -> &W {
        &self.inner
    }

    /// Mutably access the inner writer.
    ///
    /// Bytes written directly to it are not rate-limited.
    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.inner
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

impl<W: Write, C: Clock> Write for RateLimitedWriter<W, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // for an empty buffer, just defer to the inner writer's impl
        if buf.is_empty() {
            return self.inner.write(buf);
        }
        let bucket: &Bucket<C> = &self.bucket;
        let inner = &mut self.inner;
        transfer(bucket, buf.len(), |range| inner.write(&buf[range]))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<C: Clock> Bucket<C> {
    /// Wrap `writer`, limiting its transfer rate with this bucket.
    pub fn writer<W: Write>(self: &Arc<Self>, writer: W) -> RateLimitedWriter<W, C> {
        RateLimitedWriter::new(writer, Arc::clone(self))
    }
}
