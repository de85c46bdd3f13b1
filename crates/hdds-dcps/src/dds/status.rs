// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Communication status records and the counters behind them.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Samples a reader discarded instead of storing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedSampleStatus {
    /// Rejected by EXCLUSIVE ownership arbitration.
    pub ownership_dropped: u64,
    /// Did not satisfy the content filter.
    pub content_filter_dropped: u64,
    /// Arrived within the time-based filter's minimum separation.
    pub time_filter_dropped: u64,
    /// Refused because a resource limit was reached.
    pub resource_limit_rejected: u64,
}

/// Snapshot of a reader's cache occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatus {
    pub sample_count: usize,
    pub loaned_count: usize,
    pub alive_instances: usize,
    pub disposed_instances: usize,
    pub no_writers_instances: usize,
    /// Instances the reader has forgotten after all their samples were taken.
    pub reclaimed_instances: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionMatchedStatus {
    pub total_count: u64,
    pub total_count_change: i64,
    pub current_count: u64,
    pub current_count_change: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicationMatchedStatus {
    pub total_count: u64,
    pub total_count_change: i64,
    pub current_count: u64,
    pub current_count_change: i64,
}

/// Requested (reader) or offered (writer) incompatible QoS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncompatibleQosStatus {
    pub total_count: u64,
    pub total_count_change: i64,
    /// Name of the policy that failed most recently.
    pub last_policy: Option<&'static str>,
}

#[derive(Debug, Default)]
pub(crate) struct DropCounters {
    ownership: AtomicU64,
    content_filter: AtomicU64,
    time_filter: AtomicU64,
    resource_limit: AtomicU64,
}

impl DropCounters {
    pub fn ownership(&self) {
        self.ownership.fetch_add(1, Ordering::Relaxed);
    }

    pub fn content_filter(&self) {
        self.content_filter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn time_filter(&self) {
        self.time_filter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resource_limit(&self) {
        self.resource_limit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DroppedSampleStatus {
        DroppedSampleStatus {
            ownership_dropped: self.ownership.load(Ordering::Relaxed),
            content_filter_dropped: self.content_filter.load(Ordering::Relaxed),
            time_filter_dropped: self.time_filter.load(Ordering::Relaxed),
            resource_limit_rejected: self.resource_limit.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct MatchCounts {
    total: u64,
    current: u64,
    reported_total: u64,
    reported_current: u64,
}

/// Matched-endpoint counter with "change since last read" semantics.
#[derive(Debug, Default)]
pub(crate) struct MatchTracker {
    counts: Mutex<MatchCounts>,
}

impl MatchTracker {
    pub fn matched(&self) {
        let mut c = self.counts.lock();
        c.total += 1;
        c.current += 1;
    }

    pub fn unmatched(&self) {
        let mut c = self.counts.lock();
        c.current = c.current.saturating_sub(1);
    }

    pub fn current(&self) -> u64 {
        self.counts.lock().current
    }

    /// `(total, total_change, current, current_change)`; resets the changes.
    pub fn take(&self) -> (u64, i64, u64, i64) {
        let mut c = self.counts.lock();
        let total_change = c.total as i64 - c.reported_total as i64;
        let current_change = c.current as i64 - c.reported_current as i64;
        c.reported_total = c.total;
        c.reported_current = c.current;
        (c.total, total_change, c.current, current_change)
    }
}

#[derive(Debug, Default)]
struct IncompatibleCounts {
    total: u64,
    reported: u64,
    last_policy: Option<&'static str>,
}

#[derive(Debug, Default)]
pub(crate) struct IncompatibleTracker {
    counts: Mutex<IncompatibleCounts>,
}

impl IncompatibleTracker {
    pub fn record(&self, policy: &'static str) {
        let mut c = self.counts.lock();
        c.total += 1;
        c.last_policy = Some(policy);
    }

    pub fn take(&self) -> IncompatibleQosStatus {
        let mut c = self.counts.lock();
        let change = c.total as i64 - c.reported as i64;
        c.reported = c.total;
        IncompatibleQosStatus {
            total_count: c.total,
            total_count_change: change,
            last_policy: c.last_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_tracker_changes_reset_on_read() {
        let tracker = MatchTracker::default();
        tracker.matched();
        tracker.matched();
        tracker.unmatched();

        assert_eq!(tracker.take(), (2, 2, 1, 1));
        assert_eq!(tracker.take(), (2, 0, 1, 0));

        tracker.unmatched();
        assert_eq!(tracker.take(), (2, 0, 0, -1));
    }

    #[test]
    fn test_drop_counters_snapshot() {
        let counters = DropCounters::default();
        counters.ownership();
        counters.time_filter();
        counters.time_filter();

        let status = counters.snapshot();
        assert_eq!(status.ownership_dropped, 1);
        assert_eq!(status.time_filter_dropped, 2);
        assert_eq!(status.content_filter_dropped, 0);
    }

    #[test]
    fn test_incompatible_tracker() {
        let tracker = IncompatibleTracker::default();
        tracker.record("OWNERSHIP");
        let status = tracker.take();
        assert_eq!(status.total_count, 1);
        assert_eq!(status.total_count_change, 1);
        assert_eq!(status.last_policy, Some("OWNERSHIP"));
        assert_eq!(tracker.take().total_count_change, 0);
    }
}
