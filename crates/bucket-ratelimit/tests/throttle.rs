//! Rate limiting against the real clock.

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

use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bucket_ratelimit::{Bucket, KB};

/// One timing scenario.
struct Case {
    name: &'static str,
    rate: u64,
    burst: u64,
    /// Whether to fill the bucket to its burst before starting.
    prefill: bool,
    expect: Duration,
}

const CASES: &[Case] = &[
    Case {
        name: "R1K-B1K",
        rate: KB,
        burst: KB,
        prefill: false,
        expect: Duration::from_secs(2),
    },
    Case {
        name: "R1K-B5K",
        rate: KB,
        burst: 5 * KB,
        prefill: false,
        expect: Duration::from_secs(2),
    },
    Case {
        name: "R1K-B5K*burst",
        rate: KB,
        burst: 5 * KB,
        prefill: true,
        expect: Duration::ZERO,
    },
];

/// Check that `elapsed` is within a second above `expect`.
///
/// We allow `expect` to be undershot by a hair: the per-token interval is
/// rounded down to whole nanoseconds.
fn check_time(name: &str, elapsed: Duration, expect: Duration) {
    assert!(
        elapsed + Duration::from_millis(50) >= expect && elapsed <= expect + Duration::from_secs(1),
        "{}: unexpected time {:?}",
        name,
        elapsed,
    );
}

#[test]
fn reader() {
    for c in CASES {
        let b = Bucket::from_rate(c.rate, c.burst, 0);
        let mut r = b.reader(Cursor::new(vec![0; 2 * c.rate as usize]));
        if c.prefill {
            b.return_tokens(c.burst);
        }

        let begin = Instant::now();
        let mut data = vec![0; c.rate as usize];
        for _ in 0..2 {
            let n = r.read(&mut data).unwrap();
            assert_eq!(n as u64, c.rate, "{}", c.name);
        }
        check_time(c.name, begin.elapsed(), c.expect);
    }
}

#[test]
fn writer() {
    for c in CASES {
        let b = Bucket::from_rate(c.rate, c.burst, 0);
        let mut w = b.writer(io::sink());
        if c.prefill {
            b.return_tokens(c.burst);
        }

        let begin = Instant::now();
        let data = vec![0; c.rate as usize];
        for _ in 0..2 {
            let n = w.write(&data).unwrap();
            assert_eq!(n as u64, c.rate, "{}", c.name);
        }
        check_time(c.name, begin.elapsed(), c.expect);
    }
}

#[test]
fn shared_between_threads() {
    // Four writers of 512 bytes each share 1 KB/s: about 2 seconds in all.
    let b = Bucket::from_rate(KB, KB, 0);
    let begin = Instant::now();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mut w = b.writer(io::sink());
            std::thread::spawn(move || {
                w.write_all(&[0; 512]).unwrap();
                Arc::strong_count(w.bucket())
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap() >= 2);
    }
    check_time("shared", begin.elapsed(), Duration::from_secs(2));
    assert!(b.available() <= b.capacity());
}
