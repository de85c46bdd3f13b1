// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::time::Duration;

/// TIME_BASED_FILTER QoS policy.
///
/// Reader-side filtering that enforces a minimum separation between
/// accepted samples of the same instance. A zero separation disables filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeBasedFilter {
    /// Minimum source-time distance between successive accepted samples.
    pub minimum_separation: Duration,
}

impl TimeBasedFilter {
    #[must_use]
    pub fn new(minimum_separation: Duration) -> Self {
        Self { minimum_separation }
    }

    /// Construct a filter that accepts all samples (no throttling).
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.minimum_separation == Duration::ZERO
    }

    /// # Examples
    ///
    /// ```
    /// use hdds_dcps::qos::time_based_filter::TimeBasedFilter;
    ///
    /// let filter = TimeBasedFilter::from_millis(100);
    /// assert_eq!(filter.minimum_separation.as_millis(), 100);
    /// ```
    #[must_use]
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}
