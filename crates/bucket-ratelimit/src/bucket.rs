//! The token bucket itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};

/// One second, in nanoseconds.
///
/// This is also the highest rate we accept, in bytes per second: above it, a
/// token would have to be generated more often than once per nanosecond.
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A thread-safe token bucket, for limiting a transfer rate.
///
/// One token is permission to move one byte.  Tokens are generated at one per
/// [`fill_interval`](Bucket::fill_interval), up to
/// [`capacity`](Bucket::capacity).  They are only ever generated in response to
/// a [`take`](Bucket::take) that finds too few of them, and then never less than
/// a [`transfer_unit`](Bucket::transfer_unit) at a time: to get there, `take`
/// may block for up to [`least_time`](Bucket::least_time).
///
/// Buckets are always handed out behind an [`Arc`]: every reader, writer or
/// caller holding a clone of it draws from the same tokens.
///
/// # Blocking
///
/// A blocked [`take`](Bucket::take) holds the bucket's lock while it sleeps, so
/// every other `take` and [`return_tokens`](Bucket::return_tokens) on the same
/// bucket waits for it.  [`try_take`](Bucket::try_take) reports the wait
/// instead of sleeping, for callers that can sleep without the lock.
pub struct Bucket<C: Clock = SystemClock> {
    /// Maximum number of tokens held.  Always at least 2.
    capacity: u64,
    /// Time to generate one token.  Never zero.
    fill_interval: Duration,
    /// Tokens generated per refill, at least.  Always at least 1.
    transfer_unit: u64,
    /// `transfer_unit × fill_interval`: the shortest time between two refills.
    least_time: Duration,
    /// Our time source.
    clock: C,
    /// The mutable state.
    inner: Mutex<Inner>,
}

/// The mutable state of a [`Bucket`].
#[derive(Debug)]
struct Inner {
    /// Tokens that can be taken right now.
    ///
    /// Invariant: `available <= capacity`.
    available: u64,
    /// When we last converted elapsed time into tokens.
    last_refill: Instant,
}

/// The outcome of looking at an underfunded bucket.
enum Refill {
    /// We refilled; this many tokens are now available.
    Filled(u64),
    /// At least this much more time has to pass before we may refill.
    TooSoon(Duration),
}

impl Bucket<SystemClock> {
    /// Create a bucket that generates one token every `fill_interval`.
    ///
    /// `capacity` is the most tokens the bucket holds, and so the largest burst
    /// it allows.  `transfer_unit` is the smallest number of tokens generated
    /// by a refill; 0 means `capacity / 2`.
    ///
    /// Bad values are corrected rather than rejected: `capacity` is raised to
    /// 2, a zero `fill_interval` to one nanosecond.
    ///
    /// The bucket starts empty.  You usually want [`Bucket::from_rate`].
    pub fn new(fill_interval: Duration, capacity: u64, transfer_unit: u64) -> Arc<Self> {
        Self::new_with_clock(SystemClock, fill_interval, capacity, transfer_unit)
    }

    /// Create a bucket that allows `rate` bytes per second, with bursts of up
    /// to `burst` bytes.
    ///
    /// `rate` is capped at 1,000,000,000 (one token per nanosecond) and raised
    /// to at least 1.  A `transfer_unit` of 0 means `rate / 10`.
    pub fn from_rate(rate: u64, burst: u64, transfer_unit: u64) -> Arc<Self> {
        Self::from_rate_with_clock(SystemClock, rate, burst, transfer_unit)
    }
}

impl<C: Clock> Bucket<C> {
    /// As [`Bucket::new`], but take time from `clock`.
    pub fn new_with_clock(
        clock: C,
        fill_interval: Duration,
        capacity: u64,
        transfer_unit: u64,
    ) -> Arc<Self> {
        let capacity = if capacity < 2 {
            debug!("Raising bucket capacity from {} to 2", capacity);
            2
        } else {
            capacity
        };
        let transfer_unit = if transfer_unit == 0 {
            std::cmp::max(capacity / 2, 1)
        } else {
            transfer_unit
        };
        let fill_interval = if fill_interval.is_zero() {
            debug!("Raising bucket fill interval from 0 to 1ns");
            Duration::from_nanos(1)
        } else {
            fill_interval
        };
        let least_time = mul_saturating(fill_interval, transfer_unit);
        let last_refill = clock.now();

        Arc::new(Bucket {
            capacity,
            fill_interval,
            transfer_unit,
            least_time,
            clock,
            inner: Mutex::new(Inner {
                available: 0,
                last_refill,
            }),
        })
    }

    /// As [`Bucket::from_rate`], but take time from `clock`.
    pub fn from_rate_with_clock(clock: C, rate: u64, burst: u64, transfer_unit: u64) -> Arc<Self> {
        let rate = rate.clamp(1, NANOS_PER_SEC);
        let transfer_unit = if transfer_unit == 0 {
            rate / 10
        } else {
            transfer_unit
        };
        let fill_interval = Duration::from_nanos(NANOS_PER_SEC / rate);
        Self::new_with_clock(clock, fill_interval, burst, transfer_unit)
    }

    /// Lock the mutable state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Nothing panics while holding this lock with `Inner` half-updated,
        // so a poisoned lock still holds consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take up to `n` tokens, and return how many we got.
    ///
    /// The result is never more than `n`, nor more than the capacity.  If
    /// fewer than `n` tokens are available, this refills the bucket, first
    /// blocking until at least [`least_time`](Bucket::least_time) has passed
    /// since the last refill; this happens even when `n` is smaller than the
    /// transfer unit.  After one refill we hand out whatever there is rather
    /// than waiting more.
    pub fn take(&self, n: u64) -> u64 {
        let mut inner = self.lock();
        let n = std::cmp::min(n, self.capacity);
        if n <= inner.available {
            inner.available -= n;
            return n;
        }

        let available = match self.refill(&mut inner, self.clock.now()) {
            Refill::Filled(available) => available,
            Refill::TooSoon(wait) => {
                trace!("Waiting {:?} for bucket refill", wait);
                self.clock.sleep(wait);
                // Refill even if the clock moved less than we asked it to.
                self.add_elapsed(&mut inner, self.clock.now())
            }
        };

        let granted = std::cmp::min(n, available);
        inner.available -= granted;
        granted
    }

    /// Take up to `n` tokens without blocking.
    ///
    /// Behaves like [`take`](Bucket::take), except that where `take` would
    /// sleep, this changes nothing and returns `Err` with the time to wait
    /// before trying again.
    ///
    /// `Ok(0)` is only returned for `n == 0`.
    pub fn try_take(&self, n: u64) -> Result<u64, Duration> {
        let mut inner = self.lock();
        let n = std::cmp::min(n, self.capacity);
        if n <= inner.available {
            inner.available -= n;
            return Ok(n);
        }

        match self.refill(&mut inner, self.clock.now()) {
            Refill::Filled(available) => {
                let granted = std::cmp::min(n, available);
                inner.available -= granted;
                Ok(granted)
            }
            Refill::TooSoon(wait) => Err(wait),
        }
    }

    /// Convert the time since the last refill into tokens, if at least
    /// `least_time` has passed.
    fn refill(&self, inner: &mut Inner, now: Instant) -> Refill {
        let waited = now.saturating_duration_since(inner.last_refill);
        if waited < self.least_time {
            return Refill::TooSoon(self.least_time - waited);
        }
        Refill::Filled(self.add_elapsed(inner, now))
    }

    /// Add the tokens generated since the last refill, and return how many
    /// are now available.
    fn add_elapsed(&self, inner: &mut Inner, now: Instant) -> u64 {
        let waited = now.saturating_duration_since(inner.last_refill);
        inner.last_refill = now;
        let generated = tokens_in(waited, self.fill_interval);
        inner.available = std::cmp::min(inner.available.saturating_add(generated), self.capacity);
        trace!(
            "Refilled bucket with {} tokens after {:?}; {} available",
            generated, waited, inner.available
        );
        inner.available
    }

    /// Give back `n` tokens that were taken but not used.
    ///
    /// The bucket never holds more than its capacity; any excess is dropped.
    /// This never blocks, except on another caller's [`take`](Bucket::take).
    pub fn return_tokens(&self, n: u64) {
        if n == 0 {
            return;
        }
        let mut inner = self.lock();
        inner.available = std::cmp::min(inner.available.saturating_add(n), self.capacity);
    }

    /// The largest number of tokens this bucket can hold.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The number of tokens that could be taken right now without refilling.
    pub fn available(&self) -> u64 {
        self.lock().available
    }

    /// The time it takes to generate one token.
    pub fn fill_interval(&self) -> Duration {
        self.fill_interval
    }

    /// The smallest number of tokens generated by one refill.
    pub fn transfer_unit(&self) -> u64 {
        self.transfer_unit
    }

    /// The shortest time between two refills.
    pub fn least_time(&self) -> Duration {
        self.least_time
    }

    /// The clock this bucket takes its time from.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> std::fmt::Debug for Bucket<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("capacity", &self.capacity)
            .field("fill_interval", &self.fill_interval)
            .field("transfer_unit", &self.transfer_unit)
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}

/// Return `d × n`, saturating at [`Duration::MAX`].
fn mul_saturating(d: Duration, n: u64) -> Duration {
    let nanos = d.as_nanos().saturating_mul(u128::from(n));
    let secs = u64::try_from(nanos / u128::from(NANOS_PER_SEC));
    let subsec = u32::try_from(nanos % u128::from(NANOS_PER_SEC));
    match (secs, subsec) {
        (Ok(secs), Ok(subsec)) => Duration::new(secs, subsec),
        _ => Duration::MAX,
    }
}

/// Return how many whole tokens are generated over `waited`.
fn tokens_in(waited: Duration, fill_interval: Duration) -> u64 {
    let tokens = waited.as_nanos() / fill_interval.as_nanos();
    tokens.try_into().unwrap_or(u64::MAX)
}
