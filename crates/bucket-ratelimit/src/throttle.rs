//! The loop shared by the blocking reader and writer.

use std::io;
use std::ops::Range;

use tracing::trace;

use crate::bucket::Bucket;
use crate::clock::Clock;

/// Convert a `usize` to `u64`, saturating.
pub(crate) fn to_u64(x: usize) -> u64 {
    x.try_into().unwrap_or(u64::MAX)
}

/// Convert a `u64` to `usize`, saturating.
pub(crate) fn to_usize_saturating(x: u64) -> usize {
    x.try_into().unwrap_or(usize::MAX)
}

/// Move `len` bytes, spending one token from `bucket` per byte.
///
/// `op` is called with the range of the caller's buffer to transfer next, and
/// returns how many bytes of that range it moved.  We keep going until all
/// `len` bytes are moved, `op` moves less than it was given, or `op` fails.
///
/// Tokens taken for bytes that were not moved are always given back.
///
/// An error is only returned if no bytes at all were moved; otherwise we
/// report the bytes moved so far.
pub(crate) fn transfer<C, F>(bucket: &Bucket<C>, len: usize, mut op: F) -> io::Result<usize>
where
    C: Clock,
    F: FnMut(Range<usize>) -> io::Result<usize>,
{
    let mut done = 0;
    while done < len {
        let remaining = len - done;
        let granted = bucket.take(to_u64(remaining));
        if granted == 0 {
            // Only possible if the clock went backwards; take() will wait again.
            continue;
        }
        let granted_len = std::cmp::min(to_usize_saturating(granted), remaining);

        match op(done..done + granted_len) {
            Ok(n) => {
                let n = std::cmp::min(n, granted_len);
                done += n;
                if n < granted_len {
                    let unused = granted - to_u64(n);
                    trace!("Short transfer; returning {} unused tokens", unused);
                    bucket.return_tokens(unused);
                    return Ok(done);
                }
            }
            Err(e) => {
                trace!("Transfer failed; returning {} unused tokens", granted);
                bucket.return_tokens(granted);
                return if done == 0 { Err(e) } else { Ok(done) };
            }
        }
    }
    Ok(done)
}

#[cfg(test)]
mod test {
    // @@ begin test lint list maintained by maint/add_warning @@
    #![allow(clippy::bool_assert_comparison)]
    #![allow(clippy::clone_on_copy)]
    #![allow(clippy::dbg_macro)]
    #![allow(clippy::mixed_attributes_style)]
    #![allow(clippy::print_stderr)]
    #![allow(clippy::print_stdout)]
    #![allow(clippy::single_char_pattern)]
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::unchecked_time_subtraction)]
    #![allow(clippy::useless_vec)]
    #![allow(clippy::needless_pass_by_value)]
    //! <!-- @@ end test lint list maintained by maint/add_warning @@ -->
    use super::*;

    use crate::clock::MockClock;

    use std::io::Read;

    /// A reader that claims to have read more than it was given room for.
    struct Boastful;

    impl Read for Boastful {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            Ok(buf.len() + 30)
        }
    }

    #[test]
    fn overlong_result_is_clamped() {
        let clock = MockClock::new();
        let b = Bucket::from_rate_with_clock(clock.clone(), 1000, 100, 0);
        b.return_tokens(100);

        assert_eq!(transfer(&b, 50, |range| Ok(range.len() + 30)).unwrap(), 50);
        assert_eq!(b.available(), 50);

        let mut r = b.reader(Boastful);
        assert_eq!(r.read(&mut [0; 20]).unwrap(), 20);
        assert_eq!(b.available(), 30);
        assert_eq!(clock.sleep_count(), 0);
    }
}
