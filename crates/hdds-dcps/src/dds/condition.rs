// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS Conditions - event notification predicates for WaitSets
//!
//! The set of condition kinds is closed, so [`Condition`] is an enum:
//!
//! | Kind | Owner | Trigger |
//! |------|-------|---------|
//! | `Read` | reader arena slot | a cached sample matches the state masks |
//! | `Query` | reader arena slot | as `Read`, and the sample satisfies the query |
//! | `Status` | entity | an enabled status bit is active |
//! | `Guard` | application | set by hand |
//!
//! Read and query conditions are handles into their reader's arena. Deleting
//! the condition or the reader invalidates the handle; a WaitSet then treats
//! it as absent.

use super::read_condition::{QueryCondition, ReadCondition};
use super::waitset::WaitsetSignal;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_CONDITION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_condition_id() -> u64 {
    NEXT_CONDITION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Status mask bits for StatusCondition
///
/// DDS v1.4 section 2.2.4.1 - Communication Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusMask(u32);

impl StatusMask {
    pub const NONE: StatusMask = StatusMask(0);
    pub const ALL: StatusMask = StatusMask(u32::MAX);

    /// Data available to read (DataReader)
    pub const DATA_AVAILABLE: StatusMask = StatusMask(1 << 0);
    /// Sample rejected by a resource limit (DataReader)
    pub const SAMPLE_REJECTED: StatusMask = StatusMask(1 << 2);
    /// Requested incompatible QoS (DataReader)
    pub const REQUESTED_INCOMPATIBLE_QOS: StatusMask = StatusMask(1 << 5);
    /// Subscription matched (DataReader)
    pub const SUBSCRIPTION_MATCHED: StatusMask = StatusMask(1 << 6);
    /// Offered incompatible QoS (DataWriter)
    pub const OFFERED_INCOMPATIBLE_QOS: StatusMask = StatusMask(1 << 9);
    /// Publication matched (DataWriter)
    pub const PUBLICATION_MATCHED: StatusMask = StatusMask(1 << 10);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        StatusMask(bits)
    }

    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(&self, other: StatusMask) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub const fn intersects(&self, other: StatusMask) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for StatusMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        StatusMask(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for StatusMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        StatusMask(self.0 & rhs.0)
    }
}

struct WaitsetHook {
    id: u64,
    signal: Weak<WaitsetSignal>,
}

/// WaitSets to wake when a condition's trigger turns true.
#[derive(Default)]
pub(crate) struct SignalHooks {
    hooks: Mutex<Vec<WaitsetHook>>,
}

impl std::fmt::Debug for SignalHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalHooks")
            .field("len", &self.hooks.lock().len())
            .finish()
    }
}

impl SignalHooks {
    pub fn add(&self, signal: &Arc<WaitsetSignal>) {
        let mut hooks = self.hooks.lock();
        hooks.retain(|hook| hook.signal.strong_count() > 0 && hook.id != signal.id());
        hooks.push(WaitsetHook {
            id: signal.id(),
            signal: Arc::downgrade(signal),
        });
    }

    pub fn remove(&self, signal_id: u64) {
        self.hooks.lock().retain(|hook| hook.id != signal_id);
    }

    pub fn notify(&self) {
        self.hooks.lock().retain(|hook| match hook.signal.upgrade() {
            Some(signal) => {
                signal.signal();
                true
            }
            None => false,
        });
    }
}

/// StatusCondition - condition based on Entity communication status
///
/// Triggered while any enabled status is active. All statuses are enabled
/// by default.
#[derive(Debug)]
pub struct StatusCondition {
    id: u64,
    enabled: AtomicU32,
    active: AtomicU32,
    hooks: SignalHooks,
}

impl StatusCondition {
    pub(crate) fn new() -> Self {
        Self {
            id: next_condition_id(),
            enabled: AtomicU32::new(StatusMask::ALL.bits()),
            active: AtomicU32::new(0),
            hooks: SignalHooks::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Choose which statuses this condition monitors.
    pub fn set_enabled_statuses(&self, mask: StatusMask) {
        self.enabled.store(mask.bits(), Ordering::Release);
        if self.get_trigger_value() {
            self.hooks.notify();
        }
    }

    #[must_use]
    pub fn get_enabled_statuses(&self) -> StatusMask {
        StatusMask(self.enabled.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn get_active_statuses(&self) -> StatusMask {
        StatusMask(self.active.load(Ordering::Acquire))
    }

    /// Raise status bits (called by the owning entity).
    pub(crate) fn add_active_statuses(&self, mask: StatusMask) {
        self.active.fetch_or(mask.bits(), Ordering::AcqRel);
        if self.get_enabled_statuses().intersects(mask) {
            self.hooks.notify();
        }
    }

    /// Lower status bits once the application has observed them.
    pub(crate) fn clear_active_statuses(&self, mask: StatusMask) {
        self.active.fetch_and(!mask.bits(), Ordering::AcqRel);
    }

    #[must_use]
    pub fn get_trigger_value(&self) -> bool {
        self.get_enabled_statuses()
            .intersects(self.get_active_statuses())
    }

    pub(crate) fn hooks(&self) -> &SignalHooks {
        &self.hooks
    }
}

/// GuardCondition - manually-triggered condition
///
/// DDS v1.4 section 2.2.4.1.5:
/// "A GuardCondition is a Condition whose trigger_value is under the control
/// of the application."
#[derive(Debug)]
pub struct GuardCondition {
    id: u64,
    trigger_value: AtomicBool,
    hooks: SignalHooks,
}

impl GuardCondition {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: next_condition_id(),
            trigger_value: AtomicBool::new(false),
            hooks: SignalHooks::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Setting `true` wakes every WaitSet this condition is attached to.
    pub fn set_trigger_value(&self, value: bool) {
        self.trigger_value.store(value, Ordering::Release);
        if value {
            self.hooks.notify();
        }
    }

    #[must_use]
    pub fn get_trigger_value(&self) -> bool {
        self.trigger_value.load(Ordering::Acquire)
    }

    pub(crate) fn hooks(&self) -> &SignalHooks {
        &self.hooks
    }
}

impl Default for GuardCondition {
    fn default() -> Self {
        Self::new()
    }
}

/// Any condition that can be attached to a [`WaitSet`](super::WaitSet).
#[derive(Debug, Clone)]
pub enum Condition {
    Read(ReadCondition),
    Query(QueryCondition),
    Status(Arc<StatusCondition>),
    Guard(Arc<GuardCondition>),
}

impl Condition {
    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            Condition::Read(c) => c.id(),
            Condition::Query(c) => c.id(),
            Condition::Status(c) => c.id(),
            Condition::Guard(c) => c.id(),
        }
    }

    /// Current trigger value; `false` for a deleted read/query condition.
    #[must_use]
    pub fn get_trigger_value(&self) -> bool {
        match self {
            Condition::Read(c) => c.get_trigger_value(),
            Condition::Query(c) => c.get_trigger_value(),
            Condition::Status(c) => c.get_trigger_value(),
            Condition::Guard(c) => c.get_trigger_value(),
        }
    }

    /// `false` once the owning reader or the condition itself was deleted.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Condition::Read(c) => c.is_valid(),
            Condition::Query(c) => c.is_valid(),
            Condition::Status(_) | Condition::Guard(_) => true,
        }
    }

    pub(crate) fn downgrade(&self) -> WeakCondition {
        match self {
            Condition::Read(c) => WeakCondition::Read(c.clone()),
            Condition::Query(c) => WeakCondition::Query(c.clone()),
            Condition::Status(c) => WeakCondition::Status(Arc::downgrade(c)),
            Condition::Guard(c) => WeakCondition::Guard(Arc::downgrade(c)),
        }
    }
}

impl From<ReadCondition> for Condition {
    fn from(c: ReadCondition) -> Self {
        Condition::Read(c)
    }
}

impl From<QueryCondition> for Condition {
    fn from(c: QueryCondition) -> Self {
        Condition::Query(c)
    }
}

impl From<Arc<StatusCondition>> for Condition {
    fn from(c: Arc<StatusCondition>) -> Self {
        Condition::Status(c)
    }
}

impl From<Arc<GuardCondition>> for Condition {
    fn from(c: Arc<GuardCondition>) -> Self {
        Condition::Guard(c)
    }
}

/// Non-owning form kept by WaitSets.
///
/// Read and query handles are already weak (they only name an arena slot).
#[derive(Debug, Clone)]
pub(crate) enum WeakCondition {
    Read(ReadCondition),
    Query(QueryCondition),
    Status(Weak<StatusCondition>),
    Guard(Weak<GuardCondition>),
}

impl WeakCondition {
    /// Live condition, or `None` if it no longer exists.
    pub fn upgrade(&self) -> Option<Condition> {
        let condition = match self {
            WeakCondition::Read(c) => Condition::Read(c.clone()),
            WeakCondition::Query(c) => Condition::Query(c.clone()),
            WeakCondition::Status(c) => Condition::Status(c.upgrade()?),
            WeakCondition::Guard(c) => Condition::Guard(c.upgrade()?),
        };
        condition.is_valid().then_some(condition)
    }
}
