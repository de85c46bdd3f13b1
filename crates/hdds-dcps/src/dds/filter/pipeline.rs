// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{ContentFilter, FilterEvaluator};
use crate::core::types::{Data, InstanceHandle, Timestamp};
use crate::qos::{TimeBasedFilter, TimeBasedFilterChecker};

/// Outcome of running a sample through a reader's filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    ContentFiltered,
    TimeFiltered,
}

/// Delivery-time filters of one reader.
///
/// Content filter first, then the time-based filter. Samples without a
/// payload (lifecycle notifications) bypass both. The time filter only
/// advances when the caller reports the sample as stored.
#[derive(Debug)]
pub struct FilterPipeline {
    content: Option<FilterEvaluator>,
    time: TimeBasedFilterChecker,
}

impl FilterPipeline {
    #[must_use]
    pub fn new(content: Option<&ContentFilter>, time_filter: TimeBasedFilter) -> Self {
        Self {
            content: content.map(ContentFilter::evaluator),
            time: TimeBasedFilterChecker::new(time_filter),
        }
    }

    #[must_use]
    pub fn evaluate(
        &self,
        instance: InstanceHandle,
        source_timestamp: Timestamp,
        data: Option<&Data>,
    ) -> Verdict {
        let Some(data) = data else {
            return Verdict::Pass;
        };

        if let Some(content) = &self.content {
            match content.matches(data) {
                Ok(true) => {}
                Ok(false) => return Verdict::ContentFiltered,
                Err(e) => {
                    log::trace!("[reader] content filter error on {}: {}", instance, e);
                    return Verdict::ContentFiltered;
                }
            }
        }

        if !self.time.should_accept(instance, source_timestamp) {
            return Verdict::TimeFiltered;
        }
        Verdict::Pass
    }

    /// A payload sample of `instance` was stored.
    pub fn mark_delivered(&mut self, instance: InstanceHandle, source_timestamp: Timestamp) {
        self.time.mark_accepted(instance, source_timestamp);
    }

    /// Drop per-instance state once the reader forgets the instance.
    pub fn forget(&mut self, instance: InstanceHandle) {
        self.time.forget(instance);
    }

    /// Whether the time filter alone would pass a payload sample now.
    #[must_use]
    pub fn time_accepts(&self, instance: InstanceHandle, source_timestamp: Timestamp) -> bool {
        self.time.should_accept(instance, source_timestamp)
    }

    /// Whether `later` keeps the minimum separation from `earlier`.
    #[must_use]
    pub fn spaced(&self, earlier: Timestamp, later: Timestamp) -> bool {
        let policy = self.time.policy();
        policy.is_disabled()
            || later
                .duration_since(earlier)
                .is_some_and(|elapsed| elapsed >= policy.minimum_separation)
    }
}
