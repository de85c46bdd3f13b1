// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-reader sample cache.
//!
//! Samples are kept in arrival order. Each instance the reader knows about
//! has a view carrying its instance state, view state and sample count.
//! Samples of an open coherent set wait in a separate pending list and only
//! enter the cache (history and resource limits included) when the set is
//! committed, so a set is either wholly visible or not visible at all: a
//! set that would overrun the resource limits is rejected as a whole.
//!
//! Not synchronized: owned by `ReaderShared` behind a single mutex.

use crate::core::types::{Data, InstanceHandle, InstanceKey, WriterId};
use crate::dds::condition::SignalHooks;
use crate::dds::filter::{ContentFilter, FilterEvaluator, FilterPipeline, FilterSnapshot, Verdict};
use crate::dds::read_condition::{ConditionKey, DataState};
use crate::dds::sample::{
    CoherentSetId, InstanceState, Sample, SampleHeader, SampleInfo, SampleState, ViewState,
};
use crate::dds::status::CacheStatus;
use crate::dds::waitset::WaitsetSignal;
use crate::dds::{Error, Result};
use crate::qos::{History, QoS, ResourceLimits};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ops::Bound;
use std::sync::Arc;

/// Which instances a read or take looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum InstanceSelect {
    #[default]
    Any,
    /// Only this instance (`InvalidHandle` if the reader does not know it).
    Exact(InstanceHandle),
    /// The smallest instance above this handle that has a matching sample.
    Next(InstanceHandle),
}

/// Selection criteria resolved from the caller's arguments or a condition.
#[derive(Debug, Clone)]
pub(crate) struct Criteria {
    pub max: usize,
    pub state: DataState,
    pub instance: InstanceSelect,
    pub query: Option<FilterEvaluator>,
}

/// What happened to one delivered sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Stored; `evicted` older samples of the same instance were dropped.
    Stored { evicted: usize },
    /// Held until its coherent set is committed.
    Pending,
    /// Dropped by the content or time-based filter.
    Filtered(Verdict),
    /// Refused by a resource limit.
    Rejected,
}

#[derive(Debug, Clone)]
struct CachedSample {
    header: SampleHeader,
    data: Option<Arc<Data>>,
    sample_state: SampleState,
}

#[derive(Debug, Clone)]
struct InstanceView {
    key: InstanceKey,
    state: InstanceState,
    view_state: ViewState,
    samples: usize,
}

impl InstanceView {
    fn observe(&mut self, header: &SampleHeader) {
        if !self.state.is_alive() && header.instance_state.is_alive() {
            self.view_state = ViewState::New;
        }
        self.state = header.instance_state;
    }
}

#[derive(Debug)]
struct ConditionEntry {
    state: DataState,
    query: Option<FilterEvaluator>,
    trigger: bool,
    hooks: SignalHooks,
}

#[derive(Debug, Default)]
struct ConditionSlot {
    generation: u64,
    entry: Option<ConditionEntry>,
}

/// Per-instance counts of samples the cache let go of.
pub(crate) type Releases = BTreeMap<InstanceHandle, usize>;

/// Outcome of committing one coherent set.
#[derive(Debug, Default)]
pub(crate) struct Commit {
    pub stored: bool,
    /// Samples refused because the set did not fit the resource limits.
    pub rejected: usize,
    pub time_filtered: usize,
    pub releases: Releases,
}

#[derive(Debug)]
pub(crate) struct ReaderCache {
    history: History,
    limits: ResourceLimits,
    coherent_access: bool,
    samples: VecDeque<CachedSample>,
    pending: Vec<CachedSample>,
    instances: BTreeMap<InstanceHandle, InstanceView>,
    pipeline: FilterPipeline,
    conditions: Vec<ConditionSlot>,
    loaned: usize,
    reclaimed_instances: u64,
}

impl ReaderCache {
    pub fn new(
        qos: &QoS,
        content: Option<&ContentFilter>,
        coherent_access: bool,
        condition_capacity: usize,
    ) -> Self {
        Self {
            history: qos.history,
            limits: qos.resource_limits,
            coherent_access,
            samples: VecDeque::new(),
            pending: Vec::new(),
            instances: BTreeMap::new(),
            pipeline: FilterPipeline::new(content, qos.time_based_filter),
            conditions: Vec::with_capacity(condition_capacity),
            loaned: 0,
            reclaimed_instances: 0,
        }
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Run one sample through the filters and store it (or hold it).
    pub fn deliver(&mut self, header: SampleHeader, data: Option<Arc<Data>>) -> Admission {
        let verdict = self
            .pipeline
            .evaluate(header.handle, header.source_timestamp, data.as_deref());
        if verdict != Verdict::Pass {
            return Admission::Filtered(verdict);
        }

        if self.coherent_access && header.coherent.is_some() {
            // The time filter only advances at commit.
            if data.is_some() && !self.spaced_within_set(&header) {
                return Admission::Filtered(Verdict::TimeFiltered);
            }
            self.pending.push(CachedSample {
                header,
                data,
                sample_state: SampleState::NotRead,
            });
            return Admission::Pending;
        }

        let admission = self.store(header, data);
        if matches!(admission, Admission::Stored { .. }) {
            self.refresh_conditions();
        }
        admission
    }

    /// Whether a held sample keeps the minimum separation from the previous
    /// held sample of the same instance in the same set.
    fn spaced_within_set(&self, header: &SampleHeader) -> bool {
        self.pending
            .iter()
            .rev()
            .find(|s| {
                s.header.coherent == header.coherent
                    && s.header.handle == header.handle
                    && s.data.is_some()
            })
            .map_or(true, |last| {
                self.pipeline
                    .spaced(last.header.source_timestamp, header.source_timestamp)
            })
    }

    fn store(&mut self, header: SampleHeader, data: Option<Arc<Data>>) -> Admission {
        let handle = header.handle;
        let known = self.instances.contains_key(&handle);
        if !known && self.instances.len() >= self.limits.max_instances {
            log::debug!("[reader] max_instances reached, rejecting {}", handle);
            return Admission::Rejected;
        }

        let count = self.instances.get(&handle).map_or(0, |view| view.samples);
        let evict = match self.history {
            History::KeepLast(depth) => count >= depth as usize,
            History::KeepAll => false,
        };
        let rejected = if evict {
            false
        } else {
            count >= self.limits.max_samples_per_instance
                || self.samples.len() + self.loaned >= self.limits.max_samples
        };

        if rejected {
            if data.is_none() {
                // A lifecycle change reaches a known instance even when its
                // sample is lost.
                if let Some(view) = self.instances.get_mut(&handle) {
                    view.observe(&header);
                }
                self.forget_if_drained(handle);
            }
            log::debug!("[reader] resource limit reached, rejecting sample of {}", handle);
            return Admission::Rejected;
        }

        let mut evicted = 0;
        if evict {
            if let Some(pos) = self.samples.iter().position(|s| s.header.handle == handle) {
                self.samples.remove(pos);
                evicted = 1;
            }
        }

        if data.is_some() {
            self.pipeline
                .mark_delivered(handle, header.source_timestamp);
        }
        let view = self.view_mut(&header);
        view.observe(&header);
        view.samples = view.samples + 1 - evicted;

        log::trace!(
            "[reader] stored seq {} of {} from {}",
            header.sequence_number,
            handle,
            header.writer
        );
        self.samples.push_back(CachedSample {
            header,
            data,
            sample_state: SampleState::NotRead,
        });
        Admission::Stored { evicted }
    }

    fn view_mut(&mut self, header: &SampleHeader) -> &mut InstanceView {
        self.instances
            .entry(header.handle)
            .or_insert_with(|| InstanceView {
                key: header.key.clone(),
                state: header.instance_state,
                view_state: ViewState::New,
                samples: 0,
            })
    }

    /// Make every held sample of `set` visible, in arrival order.
    ///
    /// Samples the time filter now refuses are dropped individually. If the
    /// rest would not fit the resource limits, none of it is stored.
    pub fn commit(&mut self, set: CoherentSetId) -> Commit {
        let (committed, held): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|s| s.header.coherent == Some(set));
        self.pending = held;

        let mut outcome = Commit::default();
        let (admitted, late): (Vec<_>, Vec<_>) = committed.into_iter().partition(|s| {
            s.data.is_none()
                || self
                    .pipeline
                    .time_accepts(s.header.handle, s.header.source_timestamp)
        });
        for sample in late {
            outcome.time_filtered += 1;
            *outcome.releases.entry(sample.header.handle).or_default() += 1;
        }

        if !self.fits(&admitted) {
            log::debug!(
                "[reader] coherent set {}:{} exceeds resource limits, rejecting {} sample(s)",
                set.publisher,
                set.sequence,
                admitted.len()
            );
            outcome.rejected = admitted.len();
            for sample in admitted {
                *outcome.releases.entry(sample.header.handle).or_default() += 1;
            }
            return outcome;
        }

        for sample in admitted {
            let handle = sample.header.handle;
            match self.store(sample.header, sample.data) {
                Admission::Stored { evicted } => {
                    outcome.stored = true;
                    if evicted > 0 {
                        *outcome.releases.entry(handle).or_default() += evicted;
                    }
                }
                _ => *outcome.releases.entry(handle).or_default() += 1,
            }
        }
        if outcome.stored {
            self.refresh_conditions();
        }
        outcome
    }

    /// Whether storing `set` in order stays within the resource limits.
    ///
    /// Mirrors [`ReaderCache::store`]: a KEEP_LAST eviction frees the slot
    /// it fills.
    fn fits(&self, set: &[CachedSample]) -> bool {
        let mut counts: BTreeMap<InstanceHandle, usize> = BTreeMap::new();
        let mut total = self.samples.len() + self.loaned;
        let mut instances = self.instances.len();

        for sample in set {
            let handle = sample.header.handle;
            let count = match counts.entry(handle) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let known = self.instances.get(&handle).map(|view| view.samples);
                    if known.is_none() {
                        if instances >= self.limits.max_instances {
                            return false;
                        }
                        instances += 1;
                    }
                    entry.insert(known.unwrap_or(0))
                }
            };

            let evict = match self.history {
                History::KeepLast(depth) => *count >= depth as usize,
                History::KeepAll => false,
            };
            if evict && *count > 0 {
                continue;
            }
            if !evict
                && (*count >= self.limits.max_samples_per_instance
                    || total >= self.limits.max_samples)
            {
                return false;
            }
            *count += 1;
            total += 1;
        }
        true
    }

    /// Drop the held samples of `set` written by `writer`.
    pub fn discard(&mut self, set: CoherentSetId, writer: WriterId) -> Releases {
        let mut releases = Releases::new();
        self.pending.retain(|s| {
            let drop = s.header.coherent == Some(set) && s.header.writer == writer;
            if drop {
                *releases.entry(s.header.handle).or_default() += 1;
            }
            !drop
        });
        releases
    }

    // ========================================================================
    // Read / Take
    // ========================================================================

    fn sample_matches(
        sample: &CachedSample,
        view: &InstanceView,
        state: &DataState,
        query: Option<&FilterSnapshot<'_>>,
    ) -> bool {
        if !state.matches(sample.sample_state, view.view_state, view.state) {
            return false;
        }
        match (query, sample.data.as_deref()) {
            (Some(query), Some(data)) => query.matches(data).unwrap_or(false),
            _ => true,
        }
    }

    fn matches(
        &self,
        sample: &CachedSample,
        state: &DataState,
        query: Option<&FilterSnapshot<'_>>,
    ) -> bool {
        self.instances
            .get(&sample.header.handle)
            .is_some_and(|view| Self::sample_matches(sample, view, state, query))
    }

    fn resolve_instance(
        &self,
        criteria: &Criteria,
        query: Option<&FilterSnapshot<'_>>,
    ) -> Result<Option<InstanceHandle>> {
        match criteria.instance {
            InstanceSelect::Any => Ok(None),
            InstanceSelect::Exact(handle) => {
                if self.instances.contains_key(&handle) {
                    Ok(Some(handle))
                } else {
                    Err(Error::InvalidHandle)
                }
            }
            InstanceSelect::Next(previous) => {
                for (&handle, _) in self
                    .instances
                    .range((Bound::Excluded(previous), Bound::Unbounded))
                {
                    let found = self.samples.iter().any(|s| {
                        s.header.handle == handle && self.matches(s, &criteria.state, query)
                    });
                    if found {
                        return Ok(Some(handle));
                    }
                }
                Err(Error::NoData)
            }
        }
    }

    fn to_sample(&self, cached: &CachedSample) -> Sample {
        let (view_state, instance_state) = self
            .instances
            .get(&cached.header.handle)
            .map_or((ViewState::NotNew, cached.header.instance_state), |v| {
                (v.view_state, v.state)
            });
        Sample {
            data: cached.data.clone(),
            info: SampleInfo {
                sample_state: cached.sample_state,
                view_state,
                instance_state,
                disposed_generation_count: cached.header.disposed_generation_count,
                no_writers_generation_count: cached.header.no_writers_generation_count,
                valid_data: cached.data.is_some(),
                instance_handle: cached.header.handle,
                publication_handle: cached.header.writer,
                source_timestamp: cached.header.source_timestamp,
                sequence_number: cached.header.sequence_number,
            },
        }
    }

    /// Read (`take == false`) or take the samples selected by `criteria`.
    ///
    /// `NoData` when nothing matches. Taken samples move to the loan count
    /// and are reported in the returned releases. The query sees one
    /// parameter set for the whole scan.
    pub fn select(&mut self, criteria: &Criteria, take: bool) -> Result<(Vec<Sample>, Releases)> {
        let query = criteria.query.as_ref().map(FilterEvaluator::snapshot);
        let target = self.resolve_instance(criteria, query.as_ref())?;

        let mut positions = Vec::new();
        for (pos, sample) in self.samples.iter().enumerate() {
            if positions.len() >= criteria.max {
                break;
            }
            if target.is_some_and(|h| h != sample.header.handle) {
                continue;
            }
            if self.matches(sample, &criteria.state, query.as_ref()) {
                positions.push(pos);
            }
        }
        if positions.is_empty() {
            return Err(Error::NoData);
        }

        let out: Vec<Sample> = positions
            .iter()
            .map(|&pos| self.to_sample(&self.samples[pos]))
            .collect();

        let mut touched = HashSet::new();
        let mut releases = Releases::new();
        if take {
            for &pos in positions.iter().rev() {
                if let Some(sample) = self.samples.remove(pos) {
                    let handle = sample.header.handle;
                    touched.insert(handle);
                    *releases.entry(handle).or_default() += 1;
                    if let Some(view) = self.instances.get_mut(&handle) {
                        view.samples = view.samples.saturating_sub(1);
                    }
                }
            }
            self.loaned += positions.len();
        } else {
            for &pos in &positions {
                let sample = &mut self.samples[pos];
                sample.sample_state = SampleState::Read;
                touched.insert(sample.header.handle);
            }
        }

        for handle in &touched {
            if let Some(view) = self.instances.get_mut(handle) {
                view.view_state = ViewState::NotNew;
            }
        }
        if take {
            self.forget_drained(&touched);
        }
        self.refresh_conditions();
        Ok((out, releases))
    }

    /// Forget NOT_ALIVE instances whose last sample was just taken.
    fn forget_drained(&mut self, touched: &HashSet<InstanceHandle>) {
        for handle in touched {
            self.forget_if_drained(*handle);
        }
    }

    /// Forget `handle` if it is NOT_ALIVE with no stored or held samples.
    fn forget_if_drained(&mut self, handle: InstanceHandle) {
        let drained = self
            .instances
            .get(&handle)
            .is_some_and(|v| v.samples == 0 && !v.state.is_alive());
        let held = self.pending.iter().any(|s| s.header.handle == handle);
        if drained && !held {
            self.instances.remove(&handle);
            self.pipeline.forget(handle);
            self.reclaimed_instances += 1;
            log::debug!("[reader] forgot drained instance {}", handle);
        }
    }

    pub fn release_loan(&mut self, count: usize) {
        self.loaned = self.loaned.saturating_sub(count);
    }

    /// Unread samples, for an ordered access snapshot.
    pub fn unread(&self) -> Vec<Sample> {
        self.samples
            .iter()
            .filter(|s| s.sample_state == SampleState::NotRead)
            .map(|s| self.to_sample(s))
            .collect()
    }

    /// Mark the samples with these sequence numbers READ.
    pub fn mark_read(&mut self, sequences: &HashSet<u64>) {
        let mut touched = HashSet::new();
        for sample in &mut self.samples {
            if sequences.contains(&sample.header.sequence_number) {
                sample.sample_state = SampleState::Read;
                touched.insert(sample.header.handle);
            }
        }
        for handle in touched {
            if let Some(view) = self.instances.get_mut(&handle) {
                view.view_state = ViewState::NotNew;
            }
        }
        self.refresh_conditions();
    }

    // ========================================================================
    // Instances
    // ========================================================================

    pub fn key_of(&self, handle: InstanceHandle) -> Option<&InstanceKey> {
        self.instances.get(&handle).map(|v| &v.key)
    }

    pub fn lookup(&self, key: &InstanceKey) -> Option<InstanceHandle> {
        self.instances
            .iter()
            .find(|(_, v)| v.key == *key)
            .map(|(h, _)| *h)
    }

    pub fn status(&self) -> CacheStatus {
        let mut status = CacheStatus {
            sample_count: self.samples.len(),
            loaned_count: self.loaned,
            reclaimed_instances: self.reclaimed_instances,
            ..CacheStatus::default()
        };
        for view in self.instances.values() {
            match view.state {
                InstanceState::Alive => status.alive_instances += 1,
                InstanceState::NotAliveDisposed => status.disposed_instances += 1,
                InstanceState::NotAliveNoWriters => status.no_writers_instances += 1,
            }
        }
        status
    }

    pub fn loaned(&self) -> usize {
        self.loaned
    }

    /// Empty the cache (reader deletion). Returns every retained sample.
    pub fn drain(&mut self) -> Releases {
        let mut releases = Releases::new();
        for sample in self.samples.drain(..).chain(self.pending.drain(..)) {
            *releases.entry(sample.header.handle).or_default() += 1;
        }
        self.instances.clear();
        for slot in &mut self.conditions {
            if slot.entry.take().is_some() {
                slot.generation += 1;
            }
        }
        releases
    }

    // ========================================================================
    // Condition arena
    // ========================================================================

    pub fn create_condition(&mut self, state: DataState, query: Option<FilterEvaluator>) -> ConditionKey {
        let trigger = {
            let snapshot = query.as_ref().map(FilterEvaluator::snapshot);
            self.any_match(&state, snapshot.as_ref())
        };
        let entry = ConditionEntry {
            state,
            query,
            trigger,
            hooks: SignalHooks::default(),
        };

        let index = match self.conditions.iter().position(|slot| slot.entry.is_none()) {
            Some(index) => index,
            None => {
                self.conditions.push(ConditionSlot::default());
                self.conditions.len() - 1
            }
        };
        let slot = &mut self.conditions[index];
        slot.entry = Some(entry);
        ConditionKey {
            index,
            generation: slot.generation,
        }
    }

    fn live_entry(&self, key: ConditionKey) -> Option<&ConditionEntry> {
        self.conditions
            .get(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub fn delete_condition(&mut self, key: ConditionKey) -> Result<()> {
        let slot = self
            .conditions
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation && slot.entry.is_some())
            .ok_or(Error::InvalidHandle)?;
        slot.entry = None;
        slot.generation += 1;
        Ok(())
    }

    pub fn condition_is_live(&self, key: ConditionKey) -> bool {
        self.live_entry(key).is_some()
    }

    pub fn condition_trigger(&self, key: ConditionKey) -> Option<bool> {
        self.live_entry(key).map(|entry| entry.trigger)
    }

    /// State and query of a live condition, for a read or take through it.
    pub fn condition_criteria(&self, key: ConditionKey) -> Option<(DataState, Option<FilterEvaluator>)> {
        self.live_entry(key)
            .map(|entry| (entry.state, entry.query.clone()))
    }

    pub fn add_condition_hook(&self, key: ConditionKey, signal: &Arc<WaitsetSignal>) -> Result<()> {
        let entry = self.live_entry(key).ok_or(Error::InvalidHandle)?;
        entry.hooks.add(signal);
        Ok(())
    }

    pub fn remove_condition_hook(&self, key: ConditionKey, signal_id: u64) {
        if let Some(entry) = self.live_entry(key) {
            entry.hooks.remove(signal_id);
        }
    }

    fn any_match(&self, state: &DataState, query: Option<&FilterSnapshot<'_>>) -> bool {
        self.samples.iter().any(|s| self.matches(s, state, query))
    }

    /// Recompute every trigger value; wake WaitSets on a rising edge.
    pub fn refresh_conditions(&mut self) {
        if self.conditions.iter().all(|slot| slot.entry.is_none()) {
            return;
        }
        let mut conditions = std::mem::take(&mut self.conditions);
        for entry in conditions.iter_mut().filter_map(|slot| slot.entry.as_mut()) {
            let query = entry.query.as_ref().map(FilterEvaluator::snapshot);
            let trigger = self.any_match(&entry.state, query.as_ref());
            let rising = trigger && !entry.trigger;
            entry.trigger = trigger;
            if rising {
                entry.hooks.notify();
            }
        }
        self.conditions = conditions;
    }
}
