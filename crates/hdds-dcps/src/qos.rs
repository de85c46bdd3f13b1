// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Quality of Service policies.
//!
//! Each policy lives in its own module with its compatibility rule. The
//! aggregated endpoint configuration is [`QoS`].
//!
//! | Policy | Applies to | Effect |
//! |--------|------------|--------|
//! | [`History`] | reader | per-instance depth or keep-all |
//! | [`ResourceLimits`] | reader | hard caps on retained samples/instances |
//! | [`Reliability`] | both | matching only (writer must offer >= requested) |
//! | [`Ownership`] | both | SHARED merge or EXCLUSIVE arbitration |
//! | [`TimeBasedFilter`] | reader | minimum source-time separation per instance |
//! | [`Partition`] | both | glob-aware name intersection |
//! | [`Presentation`] | publisher/subscriber | access scope, coherent and ordered access |

/// OWNERSHIP and OWNERSHIP_STRENGTH policies.
pub mod ownership;
/// PARTITION policy with glob matching.
pub mod partition;
/// PRESENTATION policy.
pub mod presentation;
mod profile;
/// TIME_BASED_FILTER policy and per-instance checker.
pub mod time_based_filter;

pub use ownership::{Ownership, OwnershipArbiter, OwnershipKind, OwnershipStrength};
pub use partition::Partition;
pub use presentation::{Presentation, PresentationAccessScope};
pub use profile::QoS;
pub use time_based_filter::{TimeBasedFilter, TimeBasedFilterChecker};

/// RELIABILITY policy.
///
/// Ordered so that a writer offering `Reliable` satisfies a reader requesting
/// `BestEffort`, never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Reliability {
    #[default]
    BestEffort,
    Reliable,
}

impl Reliability {
    /// Offered (writer) vs requested (reader) compatibility.
    #[must_use]
    pub fn is_compatible_with(&self, requested: &Reliability) -> bool {
        *self >= *requested
    }
}

/// HISTORY policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum History {
    /// Keep the most recent `depth` samples per instance.
    KeepLast(u32),
    /// Keep everything, bounded only by [`ResourceLimits`].
    KeepAll,
}

impl Default for History {
    fn default() -> Self {
        History::KeepLast(1)
    }
}

/// RESOURCE_LIMITS policy. `usize::MAX` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum total samples across all instances (loaned samples included)
    pub max_samples: usize,
    /// Maximum number of instances tracked by one reader
    pub max_instances: usize,
    /// Maximum samples per instance
    pub max_samples_per_instance: usize,
}

impl ResourceLimits {
    pub const UNLIMITED: usize = usize::MAX;

    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_samples: Self::UNLIMITED,
            max_instances: Self::UNLIMITED,
            max_samples_per_instance: Self::UNLIMITED,
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reliability_compatibility() {
        assert!(Reliability::Reliable.is_compatible_with(&Reliability::BestEffort));
        assert!(Reliability::Reliable.is_compatible_with(&Reliability::Reliable));
        assert!(Reliability::BestEffort.is_compatible_with(&Reliability::BestEffort));
        assert!(!Reliability::BestEffort.is_compatible_with(&Reliability::Reliable));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(History::default(), History::KeepLast(1));
        assert_eq!(ResourceLimits::default().max_samples, usize::MAX);
    }
}
