//! A rate-limited [`Read`]er.

use std::io::{self, Read};
use std::sync::Arc;

use crate::bucket::Bucket;
use crate::clock::{Clock, SystemClock};
use crate::throttle::transfer;

/// A rate-limited [reader](Read).
///
/// Wraps an existing reader, and spends one token from a shared [`Bucket`]
/// for every byte read through it.  A call to [`read`](Read::read) blocks
/// until the whole buffer is filled, the inner reader returns less than it
/// was asked for (for instance at end of stream), or it fails.
#[derive(educe::Educe)]
#[educe(Debug)]
pub struct RateLimitedReader<R, C: Clock = SystemClock> {
    /// The inner reader.
    #[educe(Debug(ignore))]
    inner: R,
    /// The bucket we take tokens from.
    bucket: Arc<Bucket<C>>,
}

impl<R: Read, C: Clock> RateLimitedReader<R, C> {
    /// Create a new [`RateLimitedReader`] drawing tokens from `bucket`.
    pub fn new(inner: R, bucket: Arc<Bucket<C>>) -> Self {
        RateLimitedReader { inner, bucket }
    }
}

impl<R, C: Clock> RateLimitedReader<R, C> {
    /// Access the inner reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Mutably access the inner reader.
    ///
    /// Bytes read directly from it are not rate-limited.
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.inner
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

impl<R: Read, C: Clock> Read for RateLimitedReader<R, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return self.inner.read(buf);
        }
        let bucket: &Bucket<C> = &self.bucket;
        let inner = &mut self.inner;
        transfer(bucket, buf.len(), |range| inner.read(&mut buf[range]))
    }
}

impl<C: Clock> Bucket<C> {
    /// Wrap `reader`, limiting its transfer rate with this bucket.
    pub fn reader<R: Read>(self: &Arc<Self>, reader: R) -> RateLimitedReader<R, C> {
        RateLimitedReader::new(reader, Arc::clone(self))
    }
}
