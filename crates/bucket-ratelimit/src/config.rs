//! Configuration for a [`Bucket`].
//!
//! A [`BucketConfig`] is usually deserialized (through its
//! [`BucketConfigBuilder`]) from a section of some larger configuration file,
//! then turned into a bucket with [`Bucket::from_config`].

use std::sync::Arc;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::err::ConfigBuildError;
use crate::units::MB;
use crate::Bucket;

/// Rate limit configuration.
///
/// This type is immutable once constructed.  To build one, use
/// [`BucketConfigBuilder`], or deserialize it from a string.
///
/// Unlike [`Bucket::from_rate`], which quietly corrects bad values, building a
/// configuration rejects a zero `rate` or `burst`.
#[derive(Debug, Clone, Builder, Eq, PartialEq)]
#[builder(build_fn(error = "ConfigBuildError", validate = "Self::validate"))]
#[builder(derive(Debug, Serialize, Deserialize))]
pub struct BucketConfig {
    /// Sustained transfer rate, in bytes per second.
    #[builder(default = "MB")]
    pub(crate) rate: u64,
    /// Largest burst, in bytes.
    #[builder(default = "MB")]
    pub(crate) burst: u64,
    /// Tokens generated by each refill, at least.  0 means `rate / 10`.
    #[builder(default)]
    pub(crate) transfer_unit: u64,
}

impl BucketConfigBuilder {
    /// Check that the configured values are usable.
    fn validate(&self) -> Result<(), ConfigBuildError> {
        for (field, value) in [("rate", self.rate), ("burst", self.burst)] {
            if value == Some(0) {
                return Err(ConfigBuildError::Invalid {
                    field: field.to_string(),
                    problem: "must not be zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl BucketConfig {
    /// Returns a fresh, default, builder
    pub fn builder() -> BucketConfigBuilder {
        Default::default()
    }

    /// Sustained transfer rate, in bytes per second.
    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// Largest burst, in bytes.
    pub fn burst(&self) -> u64 {
        self.burst
    }

    /// Configured transfer unit; 0 if it is to be derived from the rate.
    pub fn transfer_unit(&self) -> u64 {
        self.transfer_unit
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        // The defaults pass validation; `default_builds` checks this.
        BucketConfigBuilder::default()
            .build()
            .expect("default bucket configuration is invalid")
    }
}

impl Bucket<SystemClock> {
    /// Create a bucket as described by `config`.
    pub fn from_config(config: &BucketConfig) -> Arc<Self> {
        Self::from_config_with_clock(SystemClock, config)
    }
}

impl<C: Clock> Bucket<C> {
    /// As [`Bucket::from_config`], but take time from `clock`.
    pub fn from_config_with_clock(clock: C, config: &BucketConfig) -> Arc<Self> {
        let BucketConfig {
            rate,
            burst,
            transfer_unit,
        } = *config;
        Self::from_rate_with_clock(clock, rate, burst, transfer_unit)
    }
}
