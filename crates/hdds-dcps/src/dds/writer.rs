// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DataWriter and the write path shared with remote writers.
//!
//! Every change to an instance runs under that instance's registry lock:
//! lifecycle update, ownership arbitration, sequence numbering and delivery
//! to each matched reader cache. Per-instance order is therefore the same
//! in every reader.

use super::condition::{StatusCondition, StatusMask};
use super::domain::DomainInner;
use super::listener::{self, DataWriterListener, ListenerSlot};
use super::publisher::PublisherInner;
use super::reader::ReaderShared;
use super::sample::{CoherentSetId, SampleHeader};
use super::status::{IncompatibleQosStatus, IncompatibleTracker, MatchTracker, PublicationMatchedStatus};
use super::topic::TopicInner;
use super::{Error, Result};
use crate::core::instance::InstanceEntry;
use crate::core::types::{Data, InstanceHandle, InstanceKey, Timestamp, WriterId};
use crate::qos::{OwnershipStrength, Partition, Presentation, QoS};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Who is changing an instance, and where the change goes.
pub(crate) struct Origin<'a> {
    pub writer: WriterId,
    pub strength: OwnershipStrength,
    pub exclusive: bool,
    pub readers: &'a [Arc<ReaderShared>],
    pub coherent: Option<CoherentSetId>,
    pub sequence: &'a AtomicU64,
}

impl Origin<'_> {
    fn header(&self, entry: &InstanceEntry, source_timestamp: Timestamp) -> SampleHeader {
        SampleHeader {
            handle: entry.handle(),
            key: entry.key().clone(),
            writer: self.writer,
            source_timestamp,
            sequence_number: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            instance_state: entry.state(),
            disposed_generation_count: entry.disposed_generation_count(),
            no_writers_generation_count: entry.no_writers_generation_count(),
            coherent: self.coherent,
        }
    }

    /// EXCLUSIVE arbitration; counts the drop in every reader on refusal.
    fn admitted(&self, entry: &mut InstanceEntry) -> bool {
        if !self.exclusive || entry.arbiter_mut().admit(self.writer, self.strength) {
            return true;
        }
        log::trace!(
            "[ownership] {} is not the owner of {}, sample dropped",
            self.writer,
            entry.handle()
        );
        for reader in self.readers {
            reader.ownership_dropped();
        }
        false
    }

    fn distribute(&self, entry: &mut InstanceEntry, header: SampleHeader, data: Option<Arc<Data>>) {
        let (mut added, mut removed) = (0, 0);
        for reader in self.readers {
            let (a, r) = reader.deliver(header.clone(), data.clone());
            added += a;
            removed += r;
        }
        entry.adjust_retained(added, removed);
    }
}

pub(crate) fn write(
    topic: &TopicInner,
    origin: &Origin<'_>,
    key: &InstanceKey,
    data: Arc<Data>,
    source_timestamp: Timestamp,
) -> InstanceHandle {
    topic.registry.with_key(key, |entry| {
        entry.update_on_write(origin.writer, origin.strength);
        if origin.admitted(entry) {
            let header = origin.header(entry, source_timestamp);
            origin.distribute(entry, header, Some(data));
        }
        entry.handle()
    })
}

pub(crate) fn register(topic: &TopicInner, origin: &Origin<'_>, key: &InstanceKey) -> InstanceHandle {
    topic.registry.with_key(key, |entry| {
        entry.register(origin.writer, origin.strength);
        entry.handle()
    })
}

pub(crate) fn unregister(
    topic: &TopicInner,
    origin: &Origin<'_>,
    handle: InstanceHandle,
    source_timestamp: Timestamp,
) -> Result<()> {
    topic.registry.with_instance(handle, |entry| {
        let transition = entry.unregister(origin.writer)?;
        if transition.emits_sample() {
            let header = origin.header(entry, source_timestamp);
            origin.distribute(entry, header, None);
        }
        Ok(())
    })?
}

pub(crate) fn dispose(
    topic: &TopicInner,
    origin: &Origin<'_>,
    handle: InstanceHandle,
    source_timestamp: Timestamp,
) -> Result<()> {
    topic.registry.with_instance(handle, |entry| {
        if !origin.admitted(entry) {
            return;
        }
        if entry.dispose(origin.writer).emits_sample() {
            let header = origin.header(entry, source_timestamp);
            origin.distribute(entry, header, None);
        }
    })
}

/// State shared by a [`DataWriter`] handle, its publisher and the domain.
#[derive(Debug)]
pub(crate) struct WriterShared {
    id: WriterId,
    topic: Arc<TopicInner>,
    qos: QoS,
    partition: RwLock<Partition>,
    presentation: Presentation,
    publisher: Weak<PublisherInner>,
    readers: RwLock<Vec<Arc<ReaderShared>>>,
    matched: MatchTracker,
    incompatible: IncompatibleTracker,
    status: Arc<StatusCondition>,
    listener: ListenerSlot<dyn DataWriterListener>,
    sequence: Arc<AtomicU64>,
    deleted: AtomicBool,
}

impl WriterShared {
    pub fn new(
        id: WriterId,
        topic: Arc<TopicInner>,
        qos: QoS,
        publisher: &Arc<PublisherInner>,
        sequence: Arc<AtomicU64>,
    ) -> Self {
        Self {
            id,
            topic,
            partition: RwLock::new(qos.partition.clone()),
            qos,
            presentation: publisher.presentation,
            publisher: Arc::downgrade(publisher),
            readers: RwLock::new(Vec::new()),
            matched: MatchTracker::default(),
            incompatible: IncompatibleTracker::default(),
            status: Arc::new(StatusCondition::new()),
            listener: ListenerSlot::default(),
            sequence,
            deleted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> WriterId {
        self.id
    }

    pub fn topic(&self) -> &Arc<TopicInner> {
        &self.topic
    }

    pub fn qos(&self) -> &QoS {
        &self.qos
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn partition(&self) -> Partition {
        self.partition.read().clone()
    }

    pub fn set_partition(&self, partition: Partition) {
        *self.partition.write() = partition;
    }

    pub fn is_matched(&self, reader: &ReaderShared) -> bool {
        self.readers.read().iter().any(|r| r.id() == reader.id())
    }

    pub fn matched_readers(&self) -> Vec<Arc<ReaderShared>> {
        self.readers.read().clone()
    }

    pub fn add_reader(&self, reader: &Arc<ReaderShared>) {
        self.readers.write().push(Arc::clone(reader));
        self.matched.matched();
        self.raise(StatusMask::PUBLICATION_MATCHED);
    }

    /// `true` if the reader was matched.
    pub fn remove_reader(&self, reader: &ReaderShared) -> bool {
        let mut readers = self.readers.write();
        let before = readers.len();
        readers.retain(|r| r.id() != reader.id());
        let removed = readers.len() != before;
        drop(readers);
        if removed {
            self.matched.unmatched();
            self.raise(StatusMask::PUBLICATION_MATCHED);
        }
        removed
    }

    pub fn on_incompatible(&self, policy: &'static str) {
        self.incompatible.record(policy);
        self.raise(StatusMask::OFFERED_INCOMPATIBLE_QOS);
    }

    pub fn listener(&self) -> &ListenerSlot<dyn DataWriterListener> {
        &self.listener
    }

    fn raise(&self, mask: StatusMask) {
        self.status.add_active_statuses(mask);
        self.listener.raise(mask);
    }

    pub fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    fn ensure_live(&self) -> Result<()> {
        if self.deleted.load(Ordering::Acquire) {
            Err(Error::InvalidHandle)
        } else {
            Ok(())
        }
    }

    /// Run `f` with this writer's origin. The publisher's coherent set
    /// cannot close while `f` runs. Reader listeners run afterwards.
    fn with_origin<R>(&self, f: impl FnOnce(&Origin<'_>) -> R) -> Result<R> {
        let readers = self.matched_readers();
        let result = {
            let publisher = self.publisher.upgrade().ok_or(Error::InvalidHandle)?;
            let open_set = publisher.coherent_guard();
            // Checked under the guard: deletion drains in-flight writes by
            // taking it for writing.
            self.ensure_live()?;
            let origin = Origin {
                writer: self.id,
                strength: self.qos.ownership_strength,
                exclusive: self.qos.ownership.is_exclusive(),
                readers: &readers,
                coherent: open_set.filter(|_| self.presentation.coherent_access),
                sequence: &self.sequence,
            };
            f(&origin)
        };
        for reader in &readers {
            listener::notify_reader(reader);
        }
        Ok(result)
    }

    /// Unregister from every instance, notifying matched readers.
    pub fn unregister_all(&self) {
        let readers = self.matched_readers();
        let origin = Origin {
            writer: self.id,
            strength: self.qos.ownership_strength,
            exclusive: self.qos.ownership.is_exclusive(),
            readers: &readers,
            coherent: None,
            sequence: &self.sequence,
        };
        let now = Timestamp::now();
        for handle in self.topic.registry.handles_registered_by(self.id) {
            if let Err(e) = unregister(&self.topic, &origin, handle, now) {
                log::debug!("[domain] {}: unregister of {} failed: {}", self.id, handle, e);
            }
        }
    }
}

/// Application handle to a writer.
#[derive(Debug, Clone)]
pub struct DataWriter {
    pub(crate) shared: Arc<WriterShared>,
    pub(crate) domain: Weak<DomainInner>,
}

impl DataWriter {
    #[must_use]
    pub fn id(&self) -> WriterId {
        self.shared.id
    }

    #[must_use]
    pub fn topic_name(&self) -> &str {
        &self.shared.topic.name
    }

    #[must_use]
    pub fn qos(&self) -> &QoS {
        &self.shared.qos
    }

    /// Register the instance named by `data`'s key fields.
    pub fn register_instance(&self, data: &Data) -> Result<InstanceHandle> {
        let key = self.shared.topic.key_of(data)?;
        self.shared
            .with_origin(|origin| register(&self.shared.topic, origin, &key))
    }

    /// Unregister; the last writer out of an alive instance makes it
    /// NOT_ALIVE_NO_WRITERS.
    pub fn unregister_instance(&self, handle: InstanceHandle) -> Result<()> {
        self.shared.with_origin(|origin| {
            unregister(&self.shared.topic, origin, handle, Timestamp::now())
        })?
    }

    /// Dispose the instance. Disposing twice emits a single notification.
    pub fn dispose(&self, handle: InstanceHandle) -> Result<()> {
        self.shared
            .with_origin(|origin| dispose(&self.shared.topic, origin, handle, Timestamp::now()))?
    }

    /// Write with the current time as source timestamp.
    pub fn write(&self, data: &Data) -> Result<()> {
        self.write_w_timestamp(data, Timestamp::now())
    }

    pub fn write_w_timestamp(&self, data: &Data, source_timestamp: Timestamp) -> Result<()> {
        let key = self.shared.topic.key_of(data)?;
        let payload = Arc::new(data.clone());
        self.shared.with_origin(|origin| {
            write(&self.shared.topic, origin, &key, payload, source_timestamp);
        })
    }

    /// Handle of the instance `data`'s key names, if it exists.
    pub fn lookup_instance(&self, data: &Data) -> Result<Option<InstanceHandle>> {
        let key = self.shared.topic.key_of(data)?;
        Ok(self.shared.topic.registry.lookup(&key))
    }

    /// Change the partition list and re-run matching against every reader.
    pub fn set_partition(&self, names: &[&str]) -> Result<()> {
        self.shared.ensure_live()?;
        let domain = self.domain.upgrade().ok_or(Error::InvalidHandle)?;
        self.shared
            .set_partition(Partition::new(names.iter().map(|n| (*n).to_string()).collect()));
        domain.rematch_writer(&self.shared);
        Ok(())
    }

    #[must_use]
    pub fn get_statuscondition(&self) -> Arc<StatusCondition> {
        Arc::clone(&self.shared.status)
    }

    /// Install (`Some`) or remove (`None`) the listener.
    pub fn set_listener(&self, listener: Option<Arc<dyn DataWriterListener>>) -> Result<()> {
        self.shared.ensure_live()?;
        self.shared.listener.install(listener, self.domain.clone());
        Ok(())
    }

    /// Matched readers, with changes since the last call. Clears
    /// `PUBLICATION_MATCHED`.
    #[must_use]
    pub fn publication_matched_status(&self) -> PublicationMatchedStatus {
        self.shared
            .status
            .clear_active_statuses(StatusMask::PUBLICATION_MATCHED);
        let (total_count, total_count_change, current_count, current_count_change) =
            self.shared.matched.take();
        PublicationMatchedStatus {
            total_count,
            total_count_change,
            current_count,
            current_count_change,
        }
    }

    #[must_use]
    pub fn offered_incompatible_qos_status(&self) -> IncompatibleQosStatus {
        self.shared
            .status
            .clear_active_statuses(StatusMask::OFFERED_INCOMPATIBLE_QOS);
        self.shared.incompatible.take()
    }
}
