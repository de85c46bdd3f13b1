// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Aggregated endpoint configuration with builder-style setters.

use super::{
    History, Ownership, OwnershipStrength, Partition, Presentation, Reliability, ResourceLimits,
    TimeBasedFilter,
};
use crate::dds::{Error, Result};
use std::time::Duration;

/// Configuration record for writers, readers, publishers and subscribers.
///
/// Policies that do not apply to an entity kind are ignored by it
/// (e.g. `ownership_strength` on a reader, `presentation` on a writer).
///
/// ```
/// use hdds_dcps::QoS;
///
/// let qos = QoS::reliable().keep_last(5).ownership_exclusive(10).partition(&["sensors.*"]);
/// assert!(qos.validate().is_ok());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QoS {
    pub reliability: Reliability,
    pub history: History,
    pub resource_limits: ResourceLimits,
    pub ownership: Ownership,
    pub ownership_strength: OwnershipStrength,
    pub time_based_filter: TimeBasedFilter,
    pub partition: Partition,
    pub presentation: Presentation,
}

impl QoS {
    pub fn best_effort() -> Self {
        Self::default()
    }

    pub fn reliable() -> Self {
        Self {
            reliability: Reliability::Reliable,
            ..Self::default()
        }
    }

    /// Set KEEP_LAST history depth.
    pub fn keep_last(mut self, depth: u32) -> Self {
        self.history = History::KeepLast(depth);
        self
    }

    /// Set KEEP_ALL history policy.
    pub fn keep_all(mut self) -> Self {
        self.history = History::KeepAll;
        self
    }

    pub fn resource_limits(mut self, limits: ResourceLimits) -> Self {
        self.resource_limits = limits;
        self
    }

    pub fn max_samples(mut self, max: usize) -> Self {
        self.resource_limits.max_samples = max;
        self
    }

    pub fn max_instances(mut self, max: usize) -> Self {
        self.resource_limits.max_instances = max;
        self
    }

    pub fn max_samples_per_instance(mut self, max: usize) -> Self {
        self.resource_limits.max_samples_per_instance = max;
        self
    }

    pub fn ownership_shared(mut self) -> Self {
        self.ownership = Ownership::shared();
        self
    }

    /// EXCLUSIVE ownership with the given strength (strength only matters on writers).
    pub fn ownership_exclusive(mut self, strength: i32) -> Self {
        self.ownership = Ownership::exclusive();
        self.ownership_strength = OwnershipStrength::new(strength);
        self
    }

    pub fn time_based_filter(mut self, minimum_separation: Duration) -> Self {
        self.time_based_filter = TimeBasedFilter::new(minimum_separation);
        self
    }

    pub fn partition(mut self, names: &[&str]) -> Self {
        self.partition = Partition::new(names.iter().map(|n| (*n).to_string()).collect());
        self
    }

    pub fn presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = presentation;
        self
    }

    /// Reject inconsistent policy combinations.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.resource_limits;
        if limits.max_samples == 0 || limits.max_instances == 0 || limits.max_samples_per_instance == 0
        {
            return Err(Error::InconsistentPolicy(
                "resource limits must be positive".to_string(),
            ));
        }
        if limits.max_samples_per_instance > limits.max_samples {
            return Err(Error::InconsistentPolicy(format!(
                "max_samples_per_instance ({}) exceeds max_samples ({})",
                limits.max_samples_per_instance, limits.max_samples
            )));
        }
        if let History::KeepLast(depth) = self.history {
            if depth == 0 {
                return Err(Error::InconsistentPolicy(
                    "KEEP_LAST depth must be at least 1".to_string(),
                ));
            }
            if depth as usize > limits.max_samples_per_instance {
                return Err(Error::InconsistentPolicy(format!(
                    "KEEP_LAST depth {} exceeds max_samples_per_instance {}",
                    depth, limits.max_samples_per_instance
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::OwnershipKind;

    #[test]
    fn test_builder_chain() {
        let qos = QoS::reliable()
            .keep_all()
            .max_samples(10)
            .ownership_exclusive(3)
            .time_based_filter(Duration::from_secs(2));

        assert_eq!(qos.reliability, Reliability::Reliable);
        assert_eq!(qos.history, History::KeepAll);
        assert_eq!(qos.resource_limits.max_samples, 10);
        assert_eq!(qos.ownership.kind, OwnershipKind::Exclusive);
        assert_eq!(qos.ownership_strength.value, 3);
        assert_eq!(qos.time_based_filter.minimum_separation, Duration::from_secs(2));
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        assert!(matches!(
            QoS::default().keep_last(0).validate(),
            Err(Error::InconsistentPolicy(_))
        ));
    }

    #[test]
    fn test_validate_depth_against_limits() {
        let qos = QoS::default().keep_last(5).max_samples_per_instance(2);
        assert!(qos.validate().is_err());
    }

    #[test]
    fn test_validate_per_instance_above_total() {
        let qos = QoS::default()
            .keep_all()
            .max_samples(2)
            .max_samples_per_instance(4);
        assert!(qos.validate().is_err());
    }

    #[test]
    fn test_default_is_valid() {
        assert!(QoS::default().validate().is_ok());
        assert!(QoS::reliable().keep_last(100).validate().is_ok());
    }
}
