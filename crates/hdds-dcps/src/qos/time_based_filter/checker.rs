// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::TimeBasedFilter;
use crate::core::types::{InstanceHandle, Timestamp};
use std::collections::HashMap;

/// Stateful helper that enforces a [`TimeBasedFilter`] for one reader.
///
/// Tracks the source timestamp of the last delivered sample per instance.
#[derive(Debug, Default)]
pub struct TimeBasedFilterChecker {
    filter: TimeBasedFilter,
    last_accepted: HashMap<InstanceHandle, Timestamp>,
}

impl TimeBasedFilterChecker {
    #[must_use]
    pub fn new(filter: TimeBasedFilter) -> Self {
        Self {
            filter,
            last_accepted: HashMap::new(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> TimeBasedFilter {
        self.filter
    }

    /// Whether a sample of `instance` stamped `timestamp` passes the filter.
    ///
    /// A timestamp older than the last delivered one never passes.
    #[must_use]
    pub fn should_accept(&self, instance: InstanceHandle, timestamp: Timestamp) -> bool {
        if self.filter.is_disabled() {
            return true;
        }

        let Some(last) = self.last_accepted.get(&instance) else {
            return true;
        };

        match timestamp.duration_since(*last) {
            Some(elapsed) => elapsed >= self.filter.minimum_separation,
            None => false,
        }
    }

    /// Record that a sample of `instance` stamped `timestamp` was delivered.
    pub fn mark_accepted(&mut self, instance: InstanceHandle, timestamp: Timestamp) {
        if !self.filter.is_disabled() {
            self.last_accepted.insert(instance, timestamp);
        }
    }

    /// Forget an instance so its next sample is accepted.
    pub fn forget(&mut self, instance: InstanceHandle) {
        self.last_accepted.remove(&instance);
    }
}
