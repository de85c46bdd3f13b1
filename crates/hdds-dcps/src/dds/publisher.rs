// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher: groups writers and owns the writer side of coherent sets.
//!
//! A coherent set is open between `begin_coherent_changes` and
//! `end_coherent_changes`. Writes made meanwhile by writers of this
//! publisher carry the set id; subscribers requesting coherent access hold
//! them back until the set closes.

use super::domain::DomainInner;
use super::sample::CoherentSetId;
use super::topic::Topic;
use super::writer::{DataWriter, WriterShared};
use super::{Error, Result};
use crate::qos::{Presentation, QoS};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug)]
pub(crate) struct PublisherInner {
    pub id: u64,
    pub presentation: Presentation,
    /// Held for reading by every write; closing a set takes it for writing.
    open_set: RwLock<Option<CoherentSetId>>,
    next_set: AtomicU64,
    writers: Mutex<Vec<Arc<WriterShared>>>,
}

impl PublisherInner {
    pub fn new(id: u64, presentation: Presentation) -> Self {
        Self {
            id,
            presentation,
            open_set: RwLock::new(None),
            next_set: AtomicU64::new(1),
            writers: Mutex::new(Vec::new()),
        }
    }

    /// Current set, pinned open for as long as the guard lives.
    pub fn coherent_guard(&self) -> RwLockReadGuard<'_, Option<CoherentSetId>> {
        self.open_set.read()
    }

    /// Wait for in-flight writes to finish, then report the open set.
    pub fn quiesce(&self) -> Option<CoherentSetId> {
        *self.open_set.write()
    }

    pub fn add_writer(&self, writer: &Arc<WriterShared>) {
        self.writers.lock().push(Arc::clone(writer));
    }

    pub fn remove_writer(&self, writer: &WriterShared) -> bool {
        let mut writers = self.writers.lock();
        let before = writers.len();
        writers.retain(|w| w.id() != writer.id());
        writers.len() != before
    }

    fn begin(&self) -> Result<CoherentSetId> {
        let mut open = self.open_set.write();
        if let Some(set) = *open {
            return Err(Error::PreconditionNotMet(format!(
                "coherent set {} already open on publisher {}",
                set.sequence, self.id
            )));
        }
        let set = CoherentSetId {
            publisher: self.id,
            sequence: self.next_set.fetch_add(1, Ordering::Relaxed),
        };
        *open = Some(set);
        Ok(set)
    }
}

/// Grouping entity for writers, carrying the offered PRESENTATION policy.
///
/// Obtained from [`Domain::create_publisher`](super::Domain::create_publisher).
/// Cloning yields another handle to the same publisher.
///
/// ```rust
/// use hdds_dcps::{Data, DomainBuilder, FieldKind, Presentation, QoS, TypeDescriptor};
///
/// let domain = DomainBuilder::new().build()?;
/// let ty = TypeDescriptor::new("Pos").field("id", FieldKind::Int).field("x", FieldKind::Int);
/// let topic = domain.create_topic("Pos", ty, &["id"])?;
///
/// let publisher = domain.create_publisher(Presentation::topic_coherent());
/// let subscriber = domain.create_subscriber(Presentation::topic_coherent());
/// let writer = publisher.create_datawriter(&topic, QoS::reliable())?;
/// let reader = subscriber.create_datareader(&topic, QoS::reliable().keep_all())?;
///
/// publisher.begin_coherent_changes()?;
/// writer.write(&Data::new().with("id", 1).with("x", 10))?;
/// writer.write(&Data::new().with("id", 2).with("x", 20))?;
/// assert!(reader.take().is_err()); // held back until the set closes
/// publisher.end_coherent_changes()?;
/// assert_eq!(reader.take()?.len(), 2);
/// # Ok::<(), hdds_dcps::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Publisher {
    pub(crate) inner: Arc<PublisherInner>,
    pub(crate) domain: Weak<DomainInner>,
}

impl Publisher {
    fn domain(&self) -> Result<Arc<DomainInner>> {
        self.domain.upgrade().ok_or(Error::InvalidHandle)
    }

    #[must_use]
    pub fn presentation(&self) -> Presentation {
        self.inner.presentation
    }

    /// Create a writer on `topic`.
    ///
    /// # Errors
    ///
    /// `InconsistentPolicy` when `qos` fails validation, `PreconditionNotMet`
    /// when `topic` belongs to another domain.
    pub fn create_datawriter(&self, topic: &Topic, qos: QoS) -> Result<DataWriter> {
        let domain = self.domain()?;
        domain.create_writer(&self.inner, topic, qos)
    }

    /// Delete a writer of this publisher.
    ///
    /// Samples the writer left in an open coherent set are discarded from
    /// every reader. Instances it had registered lose that registration.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` when the writer belongs to another publisher.
    pub fn delete_datawriter(&self, writer: &DataWriter) -> Result<()> {
        let domain = self.domain()?;
        if !self.inner.remove_writer(&writer.shared) {
            return Err(Error::PreconditionNotMet(format!(
                "{} does not belong to publisher {}",
                writer.id(),
                self.inner.id
            )));
        }
        domain.delete_writer(&self.inner, &writer.shared);
        Ok(())
    }

    /// Open a coherent set.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` when a set is already open; sets do not nest.
    pub fn begin_coherent_changes(&self) -> Result<()> {
        let set = self.inner.begin()?;
        log::debug!(
            "[presentation] publisher {} opened coherent set {}",
            self.inner.id,
            set.sequence
        );
        Ok(())
    }

    /// Close the open coherent set and make it visible to every reader.
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` without a matching `begin_coherent_changes`.
    pub fn end_coherent_changes(&self) -> Result<()> {
        let domain = self.domain()?;
        let mut open = self.inner.open_set.write();
        let set = open.take().ok_or_else(|| {
            Error::PreconditionNotMet(format!(
                "publisher {} has no open coherent set",
                self.inner.id
            ))
        })?;
        // Committed before new writes are let through.
        domain.commit_coherent(set);
        drop(open);
        domain.dispatch_listeners();
        log::debug!(
            "[presentation] publisher {} closed coherent set {}",
            self.inner.id,
            set.sequence
        );
        Ok(())
    }
}
