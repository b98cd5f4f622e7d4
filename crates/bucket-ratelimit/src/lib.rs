#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![doc = include_str!("../README.md")]
// @@ begin lint list maintained by maint/add_warning @@
#![allow(renamed_and_removed_lints)] // @@REMOVE_WHEN(ci_arti_stable)
#![allow(unknown_lints)] // @@REMOVE_WHEN(ci_arti_nightly)
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::cargo_common_metadata)]
#![deny(clippy::cast_lossless)]
#![deny(clippy::checked_conversions)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::implicit_clone)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![warn(clippy::rc_buffer)]
#![deny(clippy::ref_option_ref)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::trait_duplication_in_bounds)]
#![deny(clippy::unchecked_duration_subtraction)]
#![deny(clippy::unnecessary_wraps)]
#![warn(clippy::unseparated_literal_suffix)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::let_unit_value)] // This can reasonably be done for explicitness
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::significant_drop_in_scrutinee)] // arti/-/merge_requests/588/#note_2812945
#![allow(clippy::result_large_err)] // temporary workaround for arti#587
#![allow(clippy::needless_raw_string_hashes)] // complained-about code is fine, often best
//! <!-- @@ end lint list maintained by maint/add_warning @@ -->

/// Implementation notes
///
/// Everything is built on [`Bucket`], which owns the token count and turns
/// elapsed time into tokens.  It knows nothing about I/O.
///
/// The blocking [`RateLimitedReader`] and [`RateLimitedWriter`] share one
/// loop: take tokens for what is left of the caller's buffer, move at most that
/// many bytes, give back whatever was not moved.  The async adapters do one
/// step of the same loop per poll, using [`Bucket::try_take`] so that they can
/// wait on a timer instead of inside the bucket.
///
/// Time always comes from the bucket's [`Clock`]; tests use a simulated one.
mod implementation_notes {}

#[cfg(feature = "tokio")]
mod async_io;
mod bucket;
mod clock;
mod config;
mod err;
mod reader;
mod throttle;
pub mod units;
mod writer;

#[cfg(feature = "tokio")]
pub use async_io::{AsyncRateLimitedReader, AsyncRateLimitedWriter};
pub use bucket::Bucket;
#[cfg(feature = "tokio")]
pub use clock::TokioClock;
#[cfg(any(test, feature = "testing"))]
pub use clock::MockClock;
pub use clock::{Clock, SystemClock};
pub use config::{BucketConfig, BucketConfigBuilder};
pub use err::ConfigBuildError;
pub use reader::RateLimitedReader;
pub use units::{KB, KiB, MB, MiB};
pub use writer::RateLimitedWriter;
