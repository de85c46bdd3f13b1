// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance Registry -- per-topic lifecycle of keyed instances.
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |  InstanceRegistry (one per topic, shared by its endpoints)  |
//! |  +---------------------------------------------------------+|
//! |  |  DashMap<InstanceKey, InstanceHandle>                   ||
//! |  |  DashMap<InstanceHandle, Arc<Mutex<InstanceEntry>>>     ||
//! |  +---------------------------------------------------------+|
//! |                                                             |
//! |  InstanceEntry: state, registrations, OwnershipArbiter,     |
//! |                 generation counts, retained sample count    |
//! +-------------------------------------------------------------+
//! ```
//!
//! # Transitions
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `register` / write | add registration; NOT_ALIVE_* -> ALIVE bumps the matching generation count |
//! | `unregister` | drop registration; last one out of an ALIVE instance -> NOT_ALIVE_NO_WRITERS |
//! | `dispose` | -> NOT_ALIVE_DISPOSED; a second dispose is a no-op |
//!
//! # Reclamation
//!
//! An entry with no registrations, not ALIVE, and no samples retained by any
//! reader cache is removed. A later write with the same key starts a fresh
//! entry under a new handle with generation counts back at zero, so a reborn
//! instance and a brand new one look the same to readers at that point.
//! Applications that need to tell them apart must track keys themselves.
//!
//! # Locking
//!
//! One mutex per entry. Callers never lock an entry while a `DashMap` guard
//! is alive: the `Arc` is cloned out of the map first. Reader cache locks
//! may be taken while an entry is locked, never the other way around.

use crate::core::types::{InstanceHandle, InstanceKey, WriterId};
use crate::dds::{Error, Result};
use crate::qos::{OwnershipArbiter, OwnershipStrength};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    /// At least one writer is registered and the instance is not disposed.
    Alive,
    /// A writer disposed the instance.
    NotAliveDisposed,
    /// Every writer unregistered.
    NotAliveNoWriters,
}

impl InstanceState {
    #[must_use]
    pub fn is_alive(self) -> bool {
        self == InstanceState::Alive
    }
}

/// Outcome of a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State did not change; nothing to announce.
    Unchanged,
    /// A NOT_ALIVE instance came back to life.
    Reborn { from: InstanceState },
    /// Instance became NOT_ALIVE_DISPOSED; readers get a metadata sample.
    Disposed,
    /// Instance became NOT_ALIVE_NO_WRITERS; readers get a metadata sample.
    NoWriters,
}

impl Transition {
    /// True when readers must receive a `valid_data = false` sample.
    #[must_use]
    pub fn emits_sample(self) -> bool {
        matches!(self, Transition::Disposed | Transition::NoWriters)
    }
}

/// State of one instance, guarded by its own mutex.
#[derive(Debug)]
pub struct InstanceEntry {
    handle: InstanceHandle,
    key: InstanceKey,
    state: InstanceState,
    registrations: BTreeMap<WriterId, OwnershipStrength>,
    arbiter: OwnershipArbiter,
    disposed_generation_count: u32,
    no_writers_generation_count: u32,
    /// Samples of this instance currently held by reader caches.
    retained: usize,
    /// No writer has touched the entry yet.
    fresh: bool,
    reclaimed: bool,
}

impl InstanceEntry {
    fn new(handle: InstanceHandle, key: InstanceKey) -> Self {
        Self {
            handle,
            key,
            state: InstanceState::NotAliveNoWriters,
            registrations: BTreeMap::new(),
            arbiter: OwnershipArbiter::new(),
            disposed_generation_count: 0,
            no_writers_generation_count: 0,
            retained: 0,
            fresh: true,
            reclaimed: false,
        }
    }

    #[must_use]
    pub fn handle(&self) -> InstanceHandle {
        self.handle
    }

    #[must_use]
    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> InstanceState {
        self.state
    }

    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_registered(&self, writer: WriterId) -> bool {
        self.registrations.contains_key(&writer)
    }

    #[must_use]
    pub fn disposed_generation_count(&self) -> u32 {
        self.disposed_generation_count
    }

    #[must_use]
    pub fn no_writers_generation_count(&self) -> u32 {
        self.no_writers_generation_count
    }

    #[must_use]
    pub fn retained(&self) -> usize {
        self.retained
    }

    pub fn arbiter_mut(&mut self) -> &mut OwnershipArbiter {
        &mut self.arbiter
    }

    #[must_use]
    pub fn owner(&self) -> Option<WriterId> {
        self.arbiter.owner()
    }

    /// Account for samples stored (`added`) and evicted (`removed`) by a cache.
    pub fn adjust_retained(&mut self, added: usize, removed: usize) {
        self.retained = (self.retained + added).saturating_sub(removed);
    }

    fn revive(&mut self) -> Transition {
        if self.fresh {
            self.fresh = false;
            self.state = InstanceState::Alive;
            return Transition::Unchanged;
        }
        let from = self.state;
        match from {
            InstanceState::Alive => return Transition::Unchanged,
            InstanceState::NotAliveDisposed => self.disposed_generation_count += 1,
            InstanceState::NotAliveNoWriters => self.no_writers_generation_count += 1,
        }
        self.state = InstanceState::Alive;
        log::debug!(
            "[registry] instance {} {} reborn from {:?}",
            self.handle,
            self.key,
            from
        );
        Transition::Reborn { from }
    }

    /// Register `writer`. Idempotent per writer; revives a NOT_ALIVE instance.
    pub fn register(&mut self, writer: WriterId, strength: OwnershipStrength) -> Transition {
        let transition = self.revive();
        if self.registrations.insert(writer, strength).is_none() {
            log::trace!("[registry] {} registered {}", writer, self.handle);
        }
        self.arbiter.on_registered(writer, strength);
        transition
    }

    /// A write implicitly registers its writer.
    pub fn update_on_write(&mut self, writer: WriterId, strength: OwnershipStrength) -> Transition {
        self.register(writer, strength)
    }

    /// Remove `writer`'s registration.
    ///
    /// The last registration leaving an ALIVE instance moves it to
    /// NOT_ALIVE_NO_WRITERS. A disposed instance stays disposed.
    pub fn unregister(&mut self, writer: WriterId) -> Result<Transition> {
        if self.registrations.remove(&writer).is_none() {
            return Err(Error::PreconditionNotMet(format!(
                "{} is not registered with instance {}",
                writer, self.handle
            )));
        }
        self.arbiter.release(writer);

        if self.registrations.is_empty() && self.state.is_alive() {
            self.state = InstanceState::NotAliveNoWriters;
            log::debug!("[registry] instance {} has no writers", self.handle);
            return Ok(Transition::NoWriters);
        }
        Ok(Transition::Unchanged)
    }

    /// Mark the instance disposed. Disposing twice is a no-op.
    pub fn dispose(&mut self, writer: WriterId) -> Transition {
        if self.state == InstanceState::NotAliveDisposed {
            return Transition::Unchanged;
        }
        self.fresh = false;
        self.state = InstanceState::NotAliveDisposed;
        self.arbiter.release(writer);
        log::debug!("[registry] instance {} disposed by {}", self.handle, writer);
        Transition::Disposed
    }

    fn is_reclaimable(&self) -> bool {
        !self.fresh && self.registrations.is_empty() && !self.state.is_alive() && self.retained == 0
    }
}

/// Registry of every instance of one topic.
#[derive(Debug)]
pub struct InstanceRegistry {
    topic: String,
    by_key: DashMap<InstanceKey, InstanceHandle>,
    entries: DashMap<InstanceHandle, Arc<Mutex<InstanceEntry>>>,
    next_handle: AtomicU64,
}

impl InstanceRegistry {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            by_key: DashMap::new(),
            entries: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn entry(&self, handle: InstanceHandle) -> Option<Arc<Mutex<InstanceEntry>>> {
        self.entries.get(&handle).map(|e| Arc::clone(e.value()))
    }

    fn entry_for_key(&self, key: &InstanceKey) -> Arc<Mutex<InstanceEntry>> {
        loop {
            let existing = self.by_key.get(key).map(|h| *h);
            if let Some(handle) = existing {
                if let Some(entry) = self.entry(handle) {
                    return entry;
                }
                // Reclamation in progress; by_key is about to lose the key.
                continue;
            }

            match self.by_key.entry(key.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let handle =
                        InstanceHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
                    let entry = Arc::new(Mutex::new(InstanceEntry::new(handle, key.clone())));
                    self.entries.insert(handle, Arc::clone(&entry));
                    slot.insert(handle);
                    log::debug!(
                        "[registry] {}: new instance {} for key {}",
                        self.topic,
                        handle,
                        key
                    );
                    return entry;
                }
            }
        }
    }

    fn maybe_reclaim(&self, entry: &mut InstanceEntry) {
        if !entry.is_reclaimable() {
            return;
        }
        entry.reclaimed = true;
        let handle = entry.handle;
        self.by_key.remove_if(&entry.key, |_, h| *h == handle);
        self.entries.remove(&handle);
        log::debug!("[registry] {}: reclaimed instance {}", self.topic, handle);
    }

    /// Run `f` on the entry for `key`, creating it if needed.
    pub fn with_key<R>(&self, key: &InstanceKey, f: impl FnOnce(&mut InstanceEntry) -> R) -> R {
        loop {
            let entry = self.entry_for_key(key);
            let mut guard = entry.lock();
            if guard.reclaimed {
                continue;
            }
            let out = f(&mut guard);
            self.maybe_reclaim(&mut guard);
            return out;
        }
    }

    /// Run `f` on an existing entry.
    pub fn with_instance<R>(
        &self,
        handle: InstanceHandle,
        f: impl FnOnce(&mut InstanceEntry) -> R,
    ) -> Result<R> {
        let entry = self.entry(handle).ok_or(Error::InvalidHandle)?;
        let mut guard = entry.lock();
        if guard.reclaimed {
            return Err(Error::InvalidHandle);
        }
        let out = f(&mut guard);
        self.maybe_reclaim(&mut guard);
        Ok(out)
    }

    pub fn register(
        &self,
        key: &InstanceKey,
        writer: WriterId,
        strength: OwnershipStrength,
    ) -> InstanceHandle {
        self.with_key(key, |entry| {
            entry.register(writer, strength);
            entry.handle()
        })
    }

    pub fn unregister(&self, handle: InstanceHandle, writer: WriterId) -> Result<Transition> {
        self.with_instance(handle, |entry| entry.unregister(writer))?
    }

    pub fn dispose(&self, handle: InstanceHandle, writer: WriterId) -> Result<Transition> {
        self.with_instance(handle, |entry| entry.dispose(writer))
    }

    pub fn update_on_write(
        &self,
        handle: InstanceHandle,
        writer: WriterId,
        strength: OwnershipStrength,
    ) -> Result<Transition> {
        self.with_instance(handle, |entry| entry.update_on_write(writer, strength))
    }

    /// A reader cache let go of `count` samples of `handle`.
    pub fn release(&self, handle: InstanceHandle, count: usize) {
        if count == 0 {
            return;
        }
        // The entry may already be gone if it never retained anything here.
        let _ = self.with_instance(handle, |entry| entry.adjust_retained(0, count));
    }

    #[must_use]
    pub fn lookup(&self, key: &InstanceKey) -> Option<InstanceHandle> {
        self.by_key.get(key).map(|h| *h)
    }

    #[must_use]
    pub fn key_of(&self, handle: InstanceHandle) -> Option<InstanceKey> {
        let entry = self.entry(handle)?;
        let guard = entry.lock();
        Some(guard.key.clone())
    }

    #[must_use]
    pub fn state_of(&self, handle: InstanceHandle) -> Option<InstanceState> {
        let entry = self.entry(handle)?;
        let guard = entry.lock();
        Some(guard.state)
    }

    /// Handles of every instance `writer` is registered with, ascending.
    #[must_use]
    pub fn handles_registered_by(&self, writer: WriterId) -> Vec<InstanceHandle> {
        let entries: Vec<_> = self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        let mut handles: Vec<_> = entries
            .iter()
            .filter_map(|entry| {
                let guard = entry.lock();
                (!guard.reclaimed && guard.is_registered(writer)).then_some(guard.handle)
            })
            .collect();
        handles.sort_unstable();
        handles
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
