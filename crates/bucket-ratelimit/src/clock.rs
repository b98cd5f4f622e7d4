//! Time sources for a [`Bucket`](crate::Bucket).
//!
//! A bucket never calls [`Instant::now`] or [`std::thread::sleep`] itself:
//! it asks its [`Clock`].  Production code uses [`SystemClock`]; tests can use
//! a simulated clock so that refill arithmetic is exactly reproducible.

use std::time::{Duration, Instant};

/// A source of the current time, and a way to block until time has passed.
pub trait Clock: Send + Sync + 'static {
    /// Return this clock's view of the current instant.
    fn now(&self) -> Instant;

    /// Block the calling thread until `duration` has elapsed on this clock.
    fn sleep(&self, duration: Duration);
}

/// The real system clock.
#[derive(Clone, Copy, Debug, Default)]
#[allow(clippy::exhaustive_structs)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that follows tokio's timer.
///
/// Under `tokio::time::pause()` the instants it reports are tokio's simulated
/// ones, which keeps a bucket in agreement with the sleeps registered by the
/// [async adapters](crate::AsyncRateLimitedReader).
///
/// [`Clock::sleep`] on this clock still blocks the thread for real time; use it
/// from the async adapters, not the blocking ones.
#[cfg(feature = "tokio")]
#[derive(Clone, Copy, Debug, Default)]
#[allow(clippy::exhaustive_structs)]
pub struct TokioClock;

#[cfg(feature = "tokio")]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio_crate::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(any(test, feature = "testing"))]
pub use mock::MockClock;

/// Simulated time.
#[cfg(any(test, feature = "testing"))]
mod mock {
    use super::Clock;
    use std::sync::{Arc, Mutex, MutexGuard};
    use std::time::{Duration, Instant};

    /// A simulated clock.
    ///
    /// Time moves only when [`advance`](MockClock::advance) or
    /// [`Clock::sleep`] is called.  Sleeping returns immediately, after moving
    /// the simulated time forward by exactly the requested amount.
    ///
    /// Clones share the same simulated time.
    #[derive(Clone, Debug)]
    pub struct MockClock {
        /// The shared state.
        state: Arc<Mutex<State>>,
    }

    /// Mutable state for a [`MockClock`].
    #[derive(Debug)]
    struct State {
        /// Current simulated time.
        now: Instant,
        /// Sum of every duration passed to `sleep`.
        slept: Duration,
        /// Number of calls to `sleep`.
        sleeps: usize,
    }

    impl MockClock {
        /// Make a new simulated clock, starting at the real current instant.
        pub fn new() -> Self {
            MockClock {
                state: Arc::new(Mutex::new(State {
                    now: Instant::now(),
                    slept: Duration::ZERO,
                    sleeps: 0,
                })),
            }
        }

        /// Lock the state.
        fn lock(&self) -> MutexGuard<'_, State> {
            // A panic while holding this lock can only happen in a failing test.
            self.state.lock().unwrap_or_else(|e| e.into_inner())
        }

        /// Move the simulated time forward by `d`, without counting it as a sleep.
        pub fn advance(&self, d: Duration) {
            let mut state = self.lock();
            state.now += d;
        }

        /// Total simulated time spent in [`Clock::sleep`].
        pub fn total_slept(&self) -> Duration {
            self.lock().slept
        }

        /// Number of calls to [`Clock::sleep`].
        pub fn sleep_count(&self) -> usize {
            self.lock().sleeps
        }
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            self.lock().now
        }

        fn sleep(&self, duration: Duration) {
            let mut state = self.lock();
            state.now += duration;
            state.slept += duration;
            state.sleeps += 1;
        }
    }
}
