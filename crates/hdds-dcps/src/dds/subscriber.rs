// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber: groups readers and implements ordered access.
//!
//! # Access blocks
//!
//! `begin_access` freezes the unread samples of every reader of the
//! subscriber into one snapshot; `ordered_sequence` hands it out in the
//! order the access scope promises:
//!
//! | Scope | Order of `ordered_sequence` |
//! |-------|-----------------------------|
//! | `Group` | global write order across all readers |
//! | `Topic` | write order, reader by reader |
//! | `Instance` | per-instance FIFO, reader by reader |
//!
//! Coherent commits take the subscriber's coherence lock for writing, and
//! the snapshot is taken under the same lock for reading, so a snapshot
//! never holds half of a coherent set.

use super::domain::DomainInner;
use super::reader::{DataReader, ReaderShared, Releases};
use super::sample::{CoherentSetId, OrderedSample};
use super::topic::TopicDescription;
use super::{Error, Result};
use crate::core::types::ReaderId;
use crate::qos::{Presentation, PresentationAccessScope, QoS};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Weak};

#[derive(Debug, Default)]
struct AccessState {
    depth: usize,
    snapshot: Vec<OrderedSample>,
}

#[derive(Debug)]
pub(crate) struct SubscriberInner {
    pub id: u64,
    pub presentation: Presentation,
    coherence: RwLock<()>,
    readers: RwLock<Vec<Arc<ReaderShared>>>,
    access: Mutex<AccessState>,
}

impl SubscriberInner {
    pub fn new(id: u64, presentation: Presentation) -> Self {
        Self {
            id,
            presentation,
            coherence: RwLock::new(()),
            readers: RwLock::new(Vec::new()),
            access: Mutex::new(AccessState::default()),
        }
    }

    pub fn add_reader(&self, reader: &Arc<ReaderShared>) {
        self.readers.write().push(Arc::clone(reader));
    }

    pub fn remove_reader(&self, reader: &ReaderShared) -> bool {
        let mut readers = self.readers.write();
        let before = readers.len();
        readers.retain(|r| r.id() != reader.id());
        readers.len() != before
    }

    pub fn readers(&self) -> Vec<Arc<ReaderShared>> {
        self.readers.read().clone()
    }

    /// Publish `set` in every reader at once. The caller hands the returned
    /// releases to each reader once no lock is held.
    pub fn commit(&self, set: CoherentSetId) -> Vec<(Arc<ReaderShared>, Releases)> {
        let _exclusive = self.coherence.write();
        self.readers
            .read()
            .iter()
            .map(|reader| (Arc::clone(reader), reader.commit_coherent(set)))
            .collect()
    }

    fn snapshot(&self) -> Vec<OrderedSample> {
        let _shared = self.coherence.read();
        let readers = self.readers.read();
        match self.presentation.access_scope {
            PresentationAccessScope::Group => {
                let mut all: Vec<OrderedSample> = readers
                    .iter()
                    .flat_map(|reader| {
                        let id = reader.id();
                        reader
                            .unread()
                            .into_iter()
                            .map(move |sample| OrderedSample { reader: id, sample })
                    })
                    .collect();
                all.sort_by_key(|s| s.sample.info.sequence_number);
                all
            }
            PresentationAccessScope::Topic => readers
                .iter()
                .flat_map(|reader| {
                    let id = reader.id();
                    let mut samples = reader.unread();
                    samples.sort_by_key(|s| s.info.sequence_number);
                    samples
                        .into_iter()
                        .map(move |sample| OrderedSample { reader: id, sample })
                })
                .collect(),
            PresentationAccessScope::Instance => readers
                .iter()
                .flat_map(|reader| {
                    let id = reader.id();
                    let mut samples = reader.unread();
                    samples.sort_by_key(|s| s.info.instance_handle);
                    samples
                        .into_iter()
                        .map(move |sample| OrderedSample { reader: id, sample })
                })
                .collect(),
        }
    }
}

/// Grouping entity for readers, carrying the requested PRESENTATION policy.
///
/// Cloning yields another handle to the same subscriber.
///
/// ```rust
/// use hdds_dcps::{Data, DomainBuilder, FieldKind, Presentation, QoS, TypeDescriptor};
///
/// let domain = DomainBuilder::new().build()?;
/// let ty = TypeDescriptor::new("Ev").field("id", FieldKind::Int);
/// let a = domain.create_topic("A", ty.clone(), &["id"])?;
/// let b = domain.create_topic("B", ty, &["id"])?;
///
/// let publisher = domain.create_publisher(Presentation::group_ordered());
/// let subscriber = domain.create_subscriber(Presentation::group_ordered());
/// let wa = publisher.create_datawriter(&a, QoS::reliable())?;
/// let wb = publisher.create_datawriter(&b, QoS::reliable())?;
/// let ra = subscriber.create_datareader(&a, QoS::reliable().keep_all())?;
/// let rb = subscriber.create_datareader(&b, QoS::reliable().keep_all())?;
///
/// wa.write(&Data::new().with("id", 1))?;
/// wb.write(&Data::new().with("id", 2))?;
/// wa.write(&Data::new().with("id", 3))?;
///
/// subscriber.begin_access()?;
/// let order: Vec<_> = subscriber.ordered_sequence()?.iter().map(|s| s.reader).collect();
/// subscriber.end_access()?;
/// assert_eq!(order, vec![ra.id(), rb.id(), ra.id()]);
/// # Ok::<(), hdds_dcps::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub(crate) inner: Arc<SubscriberInner>,
    pub(crate) domain: Weak<DomainInner>,
}

impl Subscriber {
    fn domain(&self) -> Result<Arc<DomainInner>> {
        self.domain.upgrade().ok_or(Error::InvalidHandle)
    }

    #[must_use]
    pub fn presentation(&self) -> Presentation {
        self.inner.presentation
    }

    /// Create a reader on a topic or content-filtered topic.
    ///
    /// # Errors
    ///
    /// `InconsistentPolicy` when `qos` fails validation, `PreconditionNotMet`
    /// when the topic belongs to another domain.
    pub fn create_datareader(
        &self,
        description: impl Into<TopicDescription>,
        qos: QoS,
    ) -> Result<DataReader> {
        let domain = self.domain()?;
        domain.create_reader(&self.inner, &description.into(), qos)
    }

    /// Delete a reader of this subscriber, invalidating its conditions.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` while the reader has samples on loan or when
    /// it belongs to another subscriber.
    pub fn delete_datareader(&self, reader: &DataReader) -> Result<()> {
        let domain = self.domain()?;
        if reader.shared.subscriber_id() != self.inner.id {
            return Err(Error::PreconditionNotMet(format!(
                "{} does not belong to subscriber {}",
                reader.id(),
                self.inner.id
            )));
        }
        domain.delete_reader(&self.inner, &reader.shared)
    }

    /// Enter an access block. Blocks nest; the outermost one takes the
    /// snapshot that [`Subscriber::ordered_sequence`] returns.
    pub fn begin_access(&self) -> Result<()> {
        let mut access = self.inner.access.lock();
        if access.depth == 0 {
            access.snapshot = self.inner.snapshot();
            log::debug!(
                "[presentation] subscriber {} snapshot of {} sample(s)",
                self.inner.id,
                access.snapshot.len()
            );
        }
        access.depth += 1;
        Ok(())
    }

    /// Leave an access block. The outermost one drops whatever is left of
    /// the snapshot.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` without a matching `begin_access`.
    pub fn end_access(&self) -> Result<()> {
        let mut access = self.inner.access.lock();
        if access.depth == 0 {
            return Err(Error::PreconditionNotMet(format!(
                "subscriber {} is not in an access block",
                self.inner.id
            )));
        }
        access.depth -= 1;
        if access.depth == 0 {
            access.snapshot.clear();
        }
        Ok(())
    }

    /// Hand out the snapshot in scope order, marking every sample READ in
    /// its reader.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` outside an access block, `NoData` once the
    /// snapshot is exhausted.
    pub fn ordered_sequence(&self) -> Result<Vec<OrderedSample>> {
        let mut access = self.inner.access.lock();
        if access.depth == 0 {
            return Err(Error::PreconditionNotMet(format!(
                "ordered_sequence on subscriber {} outside an access block",
                self.inner.id
            )));
        }
        let sequence = std::mem::take(&mut access.snapshot);
        if sequence.is_empty() {
            return Err(Error::NoData);
        }

        let mut by_reader: BTreeMap<ReaderId, HashSet<u64>> = BTreeMap::new();
        for item in &sequence {
            by_reader
                .entry(item.reader)
                .or_default()
                .insert(item.sample.info.sequence_number);
        }
        for reader in self.inner.readers() {
            if let Some(sequences) = by_reader.get(&reader.id()) {
                reader.mark_read(sequences);
            }
        }
        Ok(sequence)
    }
}
