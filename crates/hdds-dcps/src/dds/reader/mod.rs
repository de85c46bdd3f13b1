// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DataReader: cache access, conditions and reader-side statuses.
//!
//! # Locking
//!
//! One mutex per reader guards its cache, filter state and condition arena.
//! Writers deliver while holding an instance entry lock, so the cache lock
//! nests inside it. Anything that hands samples back to the instance
//! registry (take, commit, deletion) releases the cache lock first.

mod cache;

pub(crate) use cache::{InstanceSelect, Releases};

use self::cache::{Admission, Criteria, ReaderCache};
use super::condition::{next_condition_id, Condition, StatusCondition, StatusMask};
use super::domain::DomainInner;
use super::filter::{ContentFilter, Verdict};
use super::listener::{DataReaderListener, ListenerSlot};
use super::subscriber::SubscriberInner;
use super::read_condition::{ConditionKey, DataState, QueryCondition, ReadCondition};
use super::sample::{CoherentSetId, LoanedSamples, Sample, SampleHeader};
use super::status::{
    CacheStatus, DropCounters, DroppedSampleStatus, IncompatibleQosStatus, IncompatibleTracker,
    MatchTracker, SubscriptionMatchedStatus,
};
use super::topic::{TopicDescription, TopicInner};
use super::waitset::WaitsetSignal;
use super::{Error, Result};
use crate::core::types::{Data, InstanceHandle, ReaderId, WriterId};
use crate::qos::{Partition, Presentation, QoS};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// State shared by a [`DataReader`] handle, its subscriber and matched writers.
#[derive(Debug)]
pub(crate) struct ReaderShared {
    id: ReaderId,
    topic: Arc<TopicInner>,
    description: String,
    qos: QoS,
    partition: RwLock<Partition>,
    presentation: Presentation,
    subscriber_id: u64,
    cache: Mutex<ReaderCache>,
    drops: DropCounters,
    matched: MatchTracker,
    incompatible: IncompatibleTracker,
    status: Arc<StatusCondition>,
    listener: ListenerSlot<dyn DataReaderListener>,
    deleted: AtomicBool,
}

impl ReaderShared {
    pub fn new(
        id: ReaderId,
        description: &TopicDescription,
        qos: QoS,
        subscriber: &SubscriberInner,
        condition_capacity: usize,
    ) -> Self {
        let presentation = subscriber.presentation;
        let cache = ReaderCache::new(
            &qos,
            description.content_filter(),
            presentation.coherent_access,
            condition_capacity,
        );
        Self {
            id,
            topic: Arc::clone(&description.topic().inner),
            description: description.name().to_string(),
            partition: RwLock::new(qos.partition.clone()),
            qos,
            presentation,
            subscriber_id: subscriber.id,
            cache: Mutex::new(cache),
            drops: DropCounters::default(),
            matched: MatchTracker::default(),
            incompatible: IncompatibleTracker::default(),
            status: Arc::new(StatusCondition::new()),
            listener: ListenerSlot::default(),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ReaderId {
        self.id
    }

    pub fn topic(&self) -> &Arc<TopicInner> {
        &self.topic
    }

    pub fn qos(&self) -> &QoS {
        &self.qos
    }

    pub fn partition(&self) -> Partition {
        self.partition.read().clone()
    }

    pub fn set_partition(&self, partition: Partition) {
        *self.partition.write() = partition;
    }

    /// PRESENTATION requested by the owning subscriber.
    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn subscriber_id(&self) -> u64 {
        self.subscriber_id
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub fn listener(&self) -> &ListenerSlot<dyn DataReaderListener> {
        &self.listener
    }

    /// Raise status bits for WaitSets and the listener alike.
    fn raise(&self, mask: StatusMask) {
        self.status.add_active_statuses(mask);
        self.listener.raise(mask);
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_deleted() {
            Err(Error::InvalidHandle)
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Delivery (called under the instance entry lock)
    // ========================================================================

    /// Store one sample. Returns `(added, removed)` for the entry's
    /// retained count.
    pub fn deliver(&self, header: SampleHeader, data: Option<Arc<Data>>) -> (usize, usize) {
        let handle = header.handle;
        let admission = {
            let mut cache = self.cache.lock();
            // Checked under the cache lock so teardown cannot race a store.
            if self.is_deleted() {
                return (0, 0);
            }
            cache.deliver(header, data)
        };
        match admission {
            Admission::Stored { evicted } => {
                self.raise(StatusMask::DATA_AVAILABLE);
                (1, evicted)
            }
            Admission::Pending => (1, 0),
            Admission::Filtered(Verdict::ContentFiltered) => {
                self.drops.content_filter();
                log::trace!("[reader] {} content-filtered a sample of {}", self.id, handle);
                (0, 0)
            }
            Admission::Filtered(_) => {
                self.drops.time_filter();
                log::trace!("[reader] {} time-filtered a sample of {}", self.id, handle);
                (0, 0)
            }
            Admission::Rejected => {
                self.drops.resource_limit();
                self.raise(StatusMask::SAMPLE_REJECTED);
                (0, 0)
            }
        }
    }

    /// An EXCLUSIVE instance refused a sample from a non-owner.
    pub fn ownership_dropped(&self) {
        self.drops.ownership();
    }

    /// Publish every held sample of `set`, or none of it if the set does
    /// not fit the resource limits.
    pub fn commit_coherent(&self, set: CoherentSetId) -> Releases {
        let commit = self.cache.lock().commit(set);
        for _ in 0..commit.time_filtered {
            self.drops.time_filter();
        }
        if commit.rejected > 0 {
            for _ in 0..commit.rejected {
                self.drops.resource_limit();
            }
            self.raise(StatusMask::SAMPLE_REJECTED);
        }
        if commit.stored {
            self.raise(StatusMask::DATA_AVAILABLE);
        }
        commit.releases
    }

    pub fn discard_coherent(&self, set: CoherentSetId, writer: WriterId) -> Releases {
        self.cache.lock().discard(set, writer)
    }

    /// Hand samples the cache no longer holds back to the instance registry.
    pub fn release(&self, releases: Releases) {
        for (handle, count) in releases {
            self.topic.registry.release(handle, count);
        }
    }

    /// Called when a loan goes away.
    pub fn release_loan(&self, count: usize) {
        self.cache.lock().release_loan(count);
    }

    // ========================================================================
    // Read / Take
    // ========================================================================

    fn select(self: &Arc<Self>, criteria: Criteria, take: bool) -> Result<LoanedSamples> {
        self.ensure_live()?;
        let result = {
            let mut cache = self.cache.lock();
            self.status.clear_active_statuses(StatusMask::DATA_AVAILABLE);
            cache.select(&criteria, take)
        };
        let (samples, releases) = result?;
        let count = samples.len();
        if take {
            self.release(releases);
        }
        log::trace!(
            "[reader] {} {} {} sample(s)",
            self.id,
            if take { "took" } else { "read" },
            count
        );
        let reader = if take { Arc::downgrade(self) } else { Weak::new() };
        Ok(LoanedSamples::new(samples, self.id, reader))
    }

    /// Unread samples, for an ordered access snapshot.
    pub fn unread(&self) -> Vec<Sample> {
        self.cache.lock().unread()
    }

    pub fn mark_read(&self, sequences: &HashSet<u64>) {
        let mut cache = self.cache.lock();
        self.status.clear_active_statuses(StatusMask::DATA_AVAILABLE);
        cache.mark_read(sequences);
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    pub fn condition_trigger(&self, key: ConditionKey) -> Option<bool> {
        self.cache.lock().condition_trigger(key)
    }

    pub fn condition_is_live(&self, key: ConditionKey) -> bool {
        self.cache.lock().condition_is_live(key)
    }

    pub fn add_condition_hook(&self, key: ConditionKey, signal: &Arc<WaitsetSignal>) -> Result<()> {
        self.cache.lock().add_condition_hook(key, signal)
    }

    pub fn remove_condition_hook(&self, key: ConditionKey, signal_id: u64) {
        self.cache.lock().remove_condition_hook(key, signal_id);
    }

    /// Re-evaluate trigger values after a query's parameters changed.
    pub fn refresh_conditions(&self) {
        self.cache.lock().refresh_conditions();
    }

    // ========================================================================
    // Matching and status
    // ========================================================================

    pub fn on_matched(&self) {
        self.matched.matched();
        self.raise(StatusMask::SUBSCRIPTION_MATCHED);
    }

    pub fn on_unmatched(&self) {
        self.matched.unmatched();
        self.raise(StatusMask::SUBSCRIPTION_MATCHED);
    }

    pub fn on_incompatible(&self, policy: &'static str) {
        self.incompatible.record(policy);
        self.raise(StatusMask::REQUESTED_INCOMPATIBLE_QOS);
    }

    pub fn matched_count(&self) -> u64 {
        self.matched.current()
    }

    /// Mark deleted and empty the cache. `PreconditionNotMet` while loans
    /// are outstanding.
    pub fn teardown(&self) -> Result<()> {
        let releases = {
            let mut cache = self.cache.lock();
            if cache.loaned() > 0 {
                return Err(Error::PreconditionNotMet(format!(
                    "{} has {} loaned sample(s) outstanding",
                    self.id,
                    cache.loaned()
                )));
            }
            self.deleted.store(true, Ordering::Release);
            cache.drain()
        };
        self.release(releases);
        Ok(())
    }
}

/// Application handle to a reader.
///
/// Cloning yields another handle to the same reader.
#[derive(Debug, Clone)]
pub struct DataReader {
    pub(crate) shared: Arc<ReaderShared>,
    pub(crate) domain: Weak<DomainInner>,
}

impl DataReader {
    #[must_use]
    pub fn id(&self) -> ReaderId {
        self.shared.id
    }

    /// Name of the topic or content-filtered topic read from.
    #[must_use]
    pub fn topic_name(&self) -> &str {
        &self.shared.description
    }

    #[must_use]
    pub fn qos(&self) -> &QoS {
        &self.shared.qos
    }

    /// Start a read or take with explicit criteria.
    #[must_use]
    pub fn select(&self) -> Selector<'_> {
        Selector {
            reader: self,
            max: usize::MAX,
            state: DataState::any(),
            instance: InstanceSelect::Any,
            condition: None,
        }
    }

    /// Take every available sample. `NoData` when the cache is empty.
    pub fn take(&self) -> Result<LoanedSamples> {
        self.select().take()
    }

    /// Read every sample without removing it.
    pub fn read(&self) -> Result<LoanedSamples> {
        self.select().read()
    }

    /// Take the samples of the next instance after `previous`
    /// ([`InstanceHandle::NIL`] starts from the first one).
    pub fn take_next_instance(&self, previous: InstanceHandle) -> Result<LoanedSamples> {
        self.select().next_instance(previous).take()
    }

    pub fn read_next_instance(&self, previous: InstanceHandle) -> Result<LoanedSamples> {
        self.select().next_instance(previous).read()
    }

    pub fn take_instance(&self, handle: InstanceHandle) -> Result<LoanedSamples> {
        self.select().instance(handle).take()
    }

    pub fn read_instance(&self, handle: InstanceHandle) -> Result<LoanedSamples> {
        self.select().instance(handle).read()
    }

    /// Give back a loan early. The loan must come from this reader.
    pub fn return_loan(&self, loan: LoanedSamples) -> Result<()> {
        if loan.reader_id() != self.shared.id {
            return Err(Error::PreconditionNotMet(format!(
                "loan belongs to {}, not {}",
                loan.reader_id(),
                self.shared.id
            )));
        }
        drop(loan);
        Ok(())
    }

    /// Handle of the instance `data`'s key names, if this reader knows it.
    pub fn lookup_instance(&self, data: &Data) -> Result<Option<InstanceHandle>> {
        let key = self.shared.topic.key_of(data)?;
        Ok(self.shared.cache.lock().lookup(&key))
    }

    /// Key fields of an instance the reader knows, as a payload.
    pub fn key_value(&self, handle: InstanceHandle) -> Result<Data> {
        let cache = self.shared.cache.lock();
        let key = cache.key_of(handle).ok_or(Error::InvalidHandle)?;
        Ok(self.shared.topic.key_data(key))
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    pub fn create_readcondition(&self, state: DataState) -> Result<ReadCondition> {
        self.shared.ensure_live()?;
        let key = self.shared.cache.lock().create_condition(state, None);
        Ok(ReadCondition::new(next_condition_id(), &self.shared, key, state))
    }

    /// Create a condition narrowed by `expression` over this topic's fields.
    ///
    /// Malformed expressions and unknown fields are `BadParameter`; a
    /// parameter count that does not match the expression is
    /// `PreconditionNotMet`.
    pub fn create_querycondition(
        &self,
        state: DataState,
        expression: &str,
        parameters: Vec<String>,
    ) -> Result<QueryCondition> {
        self.shared.ensure_live()?;
        let query = ContentFilter::compile(expression, parameters, &self.shared.topic.descriptor)?;
        let key = self
            .shared
            .cache
            .lock()
            .create_condition(state, Some(query.evaluator()));
        Ok(QueryCondition::new(
            next_condition_id(),
            &self.shared,
            key,
            state,
            query,
        ))
    }

    /// Delete a read or query condition created by this reader.
    pub fn delete_condition(&self, condition: impl Into<Condition>) -> Result<()> {
        let key = self.own_condition_key(&condition.into())?;
        self.shared.cache.lock().delete_condition(key)
    }

    fn own_condition_key(&self, condition: &Condition) -> Result<ConditionKey> {
        let (reader, key) = match condition {
            Condition::Read(c) => (c.reader_id(), c.key()),
            Condition::Query(c) => (c.reader_id(), c.key()),
            Condition::Status(_) | Condition::Guard(_) => {
                return Err(Error::BadParameter(
                    "only read and query conditions belong to a reader".to_string(),
                ))
            }
        };
        if reader != self.shared.id {
            return Err(Error::PreconditionNotMet(format!(
                "condition belongs to {}, not {}",
                reader, self.shared.id
            )));
        }
        Ok(key)
    }

    #[must_use]
    pub fn get_statuscondition(&self) -> Arc<StatusCondition> {
        Arc::clone(&self.shared.status)
    }

    /// Install (`Some`) or remove (`None`) the listener. Only statuses
    /// raised afterwards are reported to it.
    pub fn set_listener(&self, listener: Option<Arc<dyn DataReaderListener>>) -> Result<()> {
        self.shared.ensure_live()?;
        self.shared.listener.install(listener, self.domain.clone());
        Ok(())
    }

    // ========================================================================
    // QoS and status
    // ========================================================================

    /// Change the partition list and re-run matching against every writer.
    pub fn set_partition(&self, names: &[&str]) -> Result<()> {
        self.shared.ensure_live()?;
        let domain = self.domain.upgrade().ok_or(Error::InvalidHandle)?;
        self.shared
            .set_partition(Partition::new(names.iter().map(|n| (*n).to_string()).collect()));
        domain.rematch_reader(&self.shared);
        Ok(())
    }

    /// Cumulative drop counters. Clears `SAMPLE_REJECTED`.
    #[must_use]
    pub fn dropped_sample_status(&self) -> DroppedSampleStatus {
        self.shared
            .status
            .clear_active_statuses(StatusMask::SAMPLE_REJECTED);
        self.shared.drops.snapshot()
    }

    #[must_use]
    pub fn cache_status(&self) -> CacheStatus {
        self.shared.cache.lock().status()
    }

    /// Matched writers, with changes since the last call. Clears
    /// `SUBSCRIPTION_MATCHED`.
    #[must_use]
    pub fn subscription_matched_status(&self) -> SubscriptionMatchedStatus {
        self.shared
            .status
            .clear_active_statuses(StatusMask::SUBSCRIPTION_MATCHED);
        let (total_count, total_count_change, current_count, current_count_change) =
            self.shared.matched.take();
        SubscriptionMatchedStatus {
            total_count,
            total_count_change,
            current_count,
            current_count_change,
        }
    }

    #[must_use]
    pub fn requested_incompatible_qos_status(&self) -> IncompatibleQosStatus {
        self.shared
            .status
            .clear_active_statuses(StatusMask::REQUESTED_INCOMPATIBLE_QOS);
        self.shared.incompatible.take()
    }
}

/// Builder for a read or take with explicit criteria.
///
/// ```rust
/// # use hdds_dcps::{DomainBuilder, FieldKind, QoS, TypeDescriptor, Data, DataState, Error};
/// # let domain = DomainBuilder::new().build()?;
/// # let ty = TypeDescriptor::new("T").field("id", FieldKind::Int);
/// # let topic = domain.create_topic("T", ty, &["id"])?;
/// # let writer = domain.create_writer(&topic, QoS::default())?;
/// # let reader = domain.create_reader(&topic, QoS::default().keep_last(8))?;
/// writer.write(&Data::new().with("id", 1))?;
/// let unread = reader.select().state(DataState::not_read()).max_samples(10).read()?;
/// assert_eq!(unread.len(), 1);
/// assert!(matches!(reader.select().state(DataState::not_read()).read(), Err(Error::NoData)));
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug)]
pub struct Selector<'a> {
    reader: &'a DataReader,
    max: usize,
    state: DataState,
    instance: InstanceSelect,
    condition: Option<Condition>,
}

impl Selector<'_> {
    #[must_use]
    pub fn max_samples(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    #[must_use]
    pub fn state(mut self, state: DataState) -> Self {
        self.state = state;
        self
    }

    /// Only samples of `handle`.
    #[must_use]
    pub fn instance(mut self, handle: InstanceHandle) -> Self {
        self.instance = InstanceSelect::Exact(handle);
        self
    }

    /// Only samples of the next instance after `previous`.
    #[must_use]
    pub fn next_instance(mut self, previous: InstanceHandle) -> Self {
        self.instance = InstanceSelect::Next(previous);
        self
    }

    /// Select through a read or query condition of this reader. The
    /// condition's masks replace [`Selector::state`].
    #[must_use]
    pub fn condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    fn criteria(&self) -> Result<Criteria> {
        let mut criteria = Criteria {
            max: self.max,
            state: self.state,
            instance: self.instance,
            query: None,
        };
        if let Some(condition) = &self.condition {
            let key = self.reader.own_condition_key(condition)?;
            let (state, query) = self
                .reader
                .shared
                .cache
                .lock()
                .condition_criteria(key)
                .ok_or(Error::InvalidHandle)?;
            criteria.state = state;
            criteria.query = query;
        }
        Ok(criteria)
    }

    pub fn take(self) -> Result<LoanedSamples> {
        let criteria = self.criteria()?;
        self.reader.shared.select(criteria, true)
    }

    pub fn read(self) -> Result<LoanedSamples> {
        let criteria = self.criteria()?;
        self.reader.shared.select(criteria, false)
    }
}
