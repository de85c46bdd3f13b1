// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WaitSet - blocking wait for Condition triggers
//!
//! Conditions register a signal when attached so they can wake the blocked
//! waiter as soon as their trigger value flips to `true`. The WaitSet only
//! keeps weak references: a dropped status/guard condition, a deleted read
//! condition or a deleted reader simply stops appearing in the results.

use super::condition::{next_condition_id, Condition, WeakCondition};
use super::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wake-up flag shared between a WaitSet and the conditions attached to it.
#[derive(Debug)]
pub(crate) struct WaitsetSignal {
    id: u64,
    pending: Mutex<bool>,
    cv: Condvar,
}

impl WaitsetSignal {
    fn new() -> Self {
        Self {
            id: next_condition_id(),
            pending: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn signal(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.cv.notify_all();
    }
}

#[derive(Debug)]
struct Attached {
    id: u64,
    condition: WeakCondition,
}

/// Resets the single-waiter flag however `wait` exits.
struct WaitingGuard<'a>(&'a AtomicBool);

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// WaitSet - wait for multiple conditions
///
/// At most one thread may block in [`WaitSet::wait`] at a time. Conditions
/// may be attached or detached while a wait is in progress; the waiter
/// re-evaluates the current set every time it wakes.
#[derive(Debug)]
pub struct WaitSet {
    signal: Arc<WaitsetSignal>,
    entries: Mutex<Vec<Attached>>,
    waiting: AtomicBool,
}

impl WaitSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: Arc::new(WaitsetSignal::new()),
            entries: Mutex::new(Vec::new()),
            waiting: AtomicBool::new(false),
        }
    }

    /// Attach a condition.
    ///
    /// Attaching the same condition twice is `PreconditionNotMet`; a read or
    /// query condition whose reader or slot is gone is `InvalidHandle`.
    pub fn attach_condition(&self, condition: impl Into<Condition>) -> Result<()> {
        let condition = condition.into();
        let id = condition.id();

        let mut entries = self.entries.lock();
        if entries.iter().any(|entry| entry.id == id) {
            return Err(Error::PreconditionNotMet(format!(
                "condition {} already attached",
                id
            )));
        }

        match &condition {
            Condition::Read(c) => c.attach(&self.signal)?,
            Condition::Query(c) => c.attach(&self.signal)?,
            Condition::Status(c) => c.hooks().add(&self.signal),
            Condition::Guard(c) => c.hooks().add(&self.signal),
        }

        entries.push(Attached {
            id,
            condition: condition.downgrade(),
        });
        drop(entries);

        log::debug!("[waitset] attached condition {}", id);
        // A waiter in progress must look at the new condition.
        self.signal.signal();
        Ok(())
    }

    /// Detach a condition. `PreconditionNotMet` if it is not attached.
    pub fn detach_condition(&self, condition: impl Into<Condition>) -> Result<()> {
        let condition = condition.into();
        let id = condition.id();

        let mut entries = self.entries.lock();
        let position = entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| Error::PreconditionNotMet(format!("condition {} not attached", id)))?;
        let removed = entries.swap_remove(position);
        drop(entries);

        let signal_id = self.signal.id();
        match &removed.condition {
            WeakCondition::Read(c) => c.detach(signal_id),
            WeakCondition::Query(c) => c.detach(signal_id),
            WeakCondition::Status(c) => {
                if let Some(c) = c.upgrade() {
                    c.hooks().remove(signal_id);
                }
            }
            WeakCondition::Guard(c) => {
                if let Some(c) = c.upgrade() {
                    c.hooks().remove(signal_id);
                }
            }
        }

        log::debug!("[waitset] detached condition {}", id);
        self.signal.signal();
        Ok(())
    }

    /// Attached conditions that still exist.
    #[must_use]
    pub fn get_conditions(&self) -> Vec<Condition> {
        self.entries
            .lock()
            .iter()
            .filter_map(|entry| entry.condition.upgrade())
            .collect()
    }

    fn collect_triggered(&self) -> Vec<Condition> {
        let conditions: Vec<WeakCondition> = self
            .entries
            .lock()
            .iter()
            .map(|entry| entry.condition.clone())
            .collect();

        conditions
            .iter()
            .filter_map(WeakCondition::upgrade)
            .filter(Condition::get_trigger_value)
            .collect()
    }

    /// Block until at least one attached condition triggers.
    ///
    /// Returns the triggered conditions, `Timeout` once `timeout` elapses
    /// (`None` waits forever), or `PreconditionNotMet` if another thread is
    /// already waiting on this WaitSet.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Vec<Condition>> {
        if self
            .waiting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::PreconditionNotMet(
                "another thread is already waiting on this WaitSet".to_string(),
            ));
        }
        let _guard = WaitingGuard(&self.waiting);

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let triggered = self.collect_triggered();
            if !triggered.is_empty() {
                log::trace!("[waitset] {} condition(s) triggered", triggered.len());
                return Ok(triggered);
            }

            let mut pending = self.signal.pending.lock();
            if *pending {
                *pending = false;
                continue;
            }

            match deadline {
                Some(deadline) => {
                    let timed_out = self.signal.cv.wait_until(&mut pending, deadline).timed_out();
                    *pending = false;
                    drop(pending);
                    if timed_out {
                        let triggered = self.collect_triggered();
                        if triggered.is_empty() {
                            log::trace!("[waitset] wait timed out");
                            return Err(Error::Timeout);
                        }
                        return Ok(triggered);
                    }
                }
                None => {
                    self.signal.cv.wait(&mut pending);
                    *pending = false;
                }
            }
        }
    }
}

impl Default for WaitSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaitSet {
    fn drop(&mut self) {
        let signal_id = self.signal.id();
        for entry in self.entries.get_mut().drain(..) {
            match entry.condition {
                WeakCondition::Read(c) => c.detach(signal_id),
                WeakCondition::Query(c) => c.detach(signal_id),
                WeakCondition::Status(c) => {
                    if let Some(c) = c.upgrade() {
                        c.hooks().remove(signal_id);
                    }
                }
                WeakCondition::Guard(c) => {
                    if let Some(c) = c.upgrade() {
                        c.hooks().remove(signal_id);
                    }
                }
            }
        }
    }
}
