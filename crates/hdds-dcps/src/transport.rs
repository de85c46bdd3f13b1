// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Callbacks a transport/discovery layer uses to feed remote data in.
//!
//! The core has no wire protocol of its own. A transport that discovers a
//! remote writer reports it per local reader with
//! [`TransportListener::on_remote_writer_matched`], then forwards its samples
//! and lifecycle changes. Remote samples go through the same instance
//! registry, ownership arbitration and reader filters as local writes.
//!
//! ```rust
//! use hdds_dcps::transport::{RemoteWriter, TransportListener};
//! use hdds_dcps::{Data, DomainBuilder, FieldKind, InstanceKey, QoS, Timestamp, TypeDescriptor, WriterId};
//!
//! let domain = DomainBuilder::new().build()?;
//! let ty = TypeDescriptor::new("Temp").field("sensor", FieldKind::Int).field("c", FieldKind::Float);
//! let topic = domain.create_topic("Temp", ty, &["sensor"])?;
//! let reader = domain.create_reader(&topic, QoS::default())?;
//!
//! let remote = WriterId(9000);
//! domain.on_remote_writer_matched("Temp", reader.id(), RemoteWriter::new(remote))?;
//! domain.on_remote_sample(
//!     "Temp",
//!     InstanceKey::from(3_i64),
//!     Data::new().with("sensor", 3).with("c", 21.5),
//!     remote,
//!     Timestamp::now(),
//! )?;
//! assert_eq!(reader.take()?[0].info().publication_handle, remote);
//! # Ok::<(), hdds_dcps::Error>(())
//! ```

use crate::core::types::{Data, InstanceKey, ReaderId, Timestamp, WriterId};
use crate::dds::writer::{self, Origin};
use crate::dds::{notify_reader, Domain, DomainInner, Error, ReaderShared, Result, TopicInner};
use crate::qos::{OwnershipKind, OwnershipStrength};
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// A writer living outside this process, as announced by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteWriter {
    pub id: WriterId,
    pub ownership: OwnershipKind,
    pub strength: OwnershipStrength,
}

impl RemoteWriter {
    /// SHARED ownership, strength 0.
    #[must_use]
    pub fn new(id: WriterId) -> Self {
        Self {
            id,
            ownership: OwnershipKind::Shared,
            strength: OwnershipStrength::default(),
        }
    }

    #[must_use]
    pub fn exclusive(mut self, strength: i32) -> Self {
        self.ownership = OwnershipKind::Exclusive;
        self.strength = OwnershipStrength::new(strength);
        self
    }
}

/// Per remote writer: its topic, ownership and the local readers it feeds.
#[derive(Debug)]
pub(crate) struct RemoteWriterState {
    topic: Arc<TopicInner>,
    ownership: OwnershipKind,
    strength: OwnershipStrength,
    pub readers: Vec<Arc<ReaderShared>>,
}

/// Transport-facing entry points.
///
/// Every callback is synchronous and returns once the change reached the
/// reader caches and the affected reader listeners have run.
pub trait TransportListener {
    /// Deliver one sample from `writer`. `key` must be the key `payload`
    /// carries.
    fn on_remote_sample(
        &self,
        topic: &str,
        key: InstanceKey,
        payload: Data,
        writer: WriterId,
        source_timestamp: Timestamp,
    ) -> Result<()>;

    /// Discovery matched `writer` with the local reader `reader`.
    fn on_remote_writer_matched(
        &self,
        topic: &str,
        reader: ReaderId,
        writer: RemoteWriter,
    ) -> Result<()>;

    /// Discovery lost the match. When no local reader remains matched, the
    /// writer is unregistered from every instance it had registered.
    fn on_remote_writer_lost(&self, topic: &str, reader: ReaderId, writer: WriterId)
        -> Result<()>;

    fn on_remote_dispose(
        &self,
        topic: &str,
        key: InstanceKey,
        writer: WriterId,
        source_timestamp: Timestamp,
    ) -> Result<()>;

    fn on_remote_unregister(
        &self,
        topic: &str,
        key: InstanceKey,
        writer: WriterId,
        source_timestamp: Timestamp,
    ) -> Result<()>;
}

fn find_topic(domain: &DomainInner, topic: &str) -> Result<Arc<TopicInner>> {
    domain
        .topic(topic)
        .ok_or_else(|| Error::BadParameter(format!("unknown topic '{}'", topic)))
}

/// Snapshot of a remote writer's state, taken so no domain lock is held
/// while the change is applied.
struct RemoteOrigin {
    writer: WriterId,
    strength: OwnershipStrength,
    exclusive: bool,
    readers: Vec<Arc<ReaderShared>>,
}

impl RemoteOrigin {
    fn lookup(domain: &DomainInner, topic: &Arc<TopicInner>, writer: WriterId) -> Result<Self> {
        let remotes = domain.remote_writers().lock();
        let state = remotes.get(&writer).ok_or_else(|| {
            Error::PreconditionNotMet(format!("{} is not a matched remote writer", writer))
        })?;
        if !Arc::ptr_eq(&state.topic, topic) {
            return Err(Error::BadParameter(format!(
                "{} does not publish '{}'",
                writer, topic.name
            )));
        }
        Ok(Self {
            writer,
            strength: state.strength,
            exclusive: state.ownership == OwnershipKind::Exclusive,
            readers: state.readers.clone(),
        })
    }

    fn apply<R>(&self, domain: &DomainInner, f: impl FnOnce(&Origin<'_>) -> R) -> R {
        let origin = Origin {
            writer: self.writer,
            strength: self.strength,
            exclusive: self.exclusive,
            readers: &self.readers,
            coherent: None,
            sequence: domain.sequence(),
        };
        f(&origin)
    }

    fn notify(&self) {
        for reader in &self.readers {
            notify_reader(reader);
        }
    }
}

fn notify_local(domain: &DomainInner, reader: ReaderId) {
    if let Some(local) = domain.reader(reader) {
        notify_reader(&local);
    }
}

impl TransportListener for Domain {
    fn on_remote_sample(
        &self,
        topic: &str,
        key: InstanceKey,
        payload: Data,
        writer: WriterId,
        source_timestamp: Timestamp,
    ) -> Result<()> {
        let domain = &self.inner;
        let topic = find_topic(domain, topic)?;
        let remote = RemoteOrigin::lookup(domain, &topic, writer)?;
        if topic.key_of(&payload)? != key {
            return Err(Error::BadParameter(format!(
                "key {} does not match the payload of a '{}' sample",
                key, topic.name
            )));
        }
        let payload = Arc::new(payload);
        remote.apply(domain, |origin| {
            writer::write(&topic, origin, &key, payload, source_timestamp);
        });
        remote.notify();
        Ok(())
    }

    fn on_remote_writer_matched(
        &self,
        topic: &str,
        reader: ReaderId,
        writer: RemoteWriter,
    ) -> Result<()> {
        let result = match_remote(&self.inner, topic, reader, writer);
        notify_local(&self.inner, reader);
        result
    }

    fn on_remote_writer_lost(
        &self,
        topic: &str,
        reader: ReaderId,
        writer: WriterId,
    ) -> Result<()> {
        let result = lose_remote(&self.inner, topic, reader, writer);
        notify_local(&self.inner, reader);
        result
    }

    fn on_remote_dispose(
        &self,
        topic: &str,
        key: InstanceKey,
        writer: WriterId,
        source_timestamp: Timestamp,
    ) -> Result<()> {
        let domain = &self.inner;
        let topic = find_topic(domain, topic)?;
        let remote = RemoteOrigin::lookup(domain, &topic, writer)?;
        let handle = topic.registry.lookup(&key).ok_or(Error::InvalidHandle)?;
        let result = remote.apply(domain, |origin| {
            writer::dispose(&topic, origin, handle, source_timestamp)
        });
        remote.notify();
        result
    }

    fn on_remote_unregister(
        &self,
        topic: &str,
        key: InstanceKey,
        writer: WriterId,
        source_timestamp: Timestamp,
    ) -> Result<()> {
        let domain = &self.inner;
        let topic = find_topic(domain, topic)?;
        let remote = RemoteOrigin::lookup(domain, &topic, writer)?;
        let handle = topic.registry.lookup(&key).ok_or(Error::InvalidHandle)?;
        let result = remote.apply(domain, |origin| {
            writer::unregister(&topic, origin, handle, source_timestamp)
        });
        remote.notify();
        result
    }
}

fn match_remote(
    domain: &DomainInner,
    topic: &str,
    reader: ReaderId,
    writer: RemoteWriter,
) -> Result<()> {
    let _matching = domain.matching().lock();
    let topic = find_topic(domain, topic)?;
    if domain.has_local_writer(writer.id) {
        return Err(Error::PreconditionNotMet(format!(
            "{} collides with a local writer",
            writer.id
        )));
    }
    let local = domain.reader(reader).ok_or(Error::InvalidHandle)?;
    if !Arc::ptr_eq(local.topic(), &topic) {
        return Err(Error::BadParameter(format!(
            "{} does not read '{}'",
            reader, topic.name
        )));
    }
    if local.qos().ownership.kind != writer.ownership {
        local.on_incompatible("OWNERSHIP");
        log::debug!(
            "[domain] remote {} and {} incompatible on OWNERSHIP",
            writer.id,
            reader
        );
        return Ok(());
    }

    let mut remotes = domain.remote_writers().lock();
    let state = match remotes.entry(writer.id) {
        Entry::Occupied(slot) => {
            if !Arc::ptr_eq(&slot.get().topic, &topic) {
                return Err(Error::PreconditionNotMet(format!(
                    "{} already publishes '{}'",
                    writer.id,
                    slot.get().topic.name
                )));
            }
            slot.into_mut()
        }
        Entry::Vacant(slot) => slot.insert(RemoteWriterState {
            topic: Arc::clone(&topic),
            ownership: writer.ownership,
            strength: writer.strength,
            readers: Vec::new(),
        }),
    };
    if state.readers.iter().any(|r| r.id() == reader) {
        return Ok(());
    }
    state.readers.push(Arc::clone(&local));
    drop(remotes);
    local.on_matched();
    log::debug!("[domain] matched remote {} -> {}", writer.id, reader);
    Ok(())
}

fn lose_remote(
    domain: &DomainInner,
    topic: &str,
    reader: ReaderId,
    writer: WriterId,
) -> Result<()> {
    let _matching = domain.matching().lock();
    let topic = find_topic(domain, topic)?;

    let mut remotes = domain.remote_writers().lock();
    let state = remotes.get_mut(&writer).ok_or_else(|| {
        Error::PreconditionNotMet(format!("{} is not a matched remote writer", writer))
    })?;
    let pos = state
        .readers
        .iter()
        .position(|r| r.id() == reader)
        .ok_or(Error::InvalidHandle)?;
    let lost = state.readers.remove(pos);
    let orphaned = state.readers.is_empty();
    let remote = RemoteOrigin {
        writer,
        strength: state.strength,
        exclusive: state.ownership == OwnershipKind::Exclusive,
        readers: vec![Arc::clone(&lost)],
    };
    if orphaned {
        remotes.remove(&writer);
    }
    drop(remotes);

    lost.on_unmatched();
    log::debug!("[domain] lost remote {} -> {}", writer, reader);
    if orphaned {
        let now = Timestamp::now();
        for handle in topic.registry.handles_registered_by(writer) {
            let result =
                remote.apply(domain, |origin| writer::unregister(&topic, origin, handle, now));
            if let Err(e) = result {
                log::debug!("[domain] remote {}: unregister of {} failed: {}", writer, handle, e);
            }
        }
    }
    Ok(())
}
