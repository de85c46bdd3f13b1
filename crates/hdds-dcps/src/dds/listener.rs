// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS Listener Traits
//!
//! Callback notification of status changes, as an alternative to polling a
//! [`StatusCondition`](super::StatusCondition) or blocking on a WaitSet.
//!
//! # Usage
//!
//! ```rust
//! use hdds_dcps::{Data, DataReader, DataReaderListener, DomainBuilder, FieldKind, QoS, TypeDescriptor};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! impl DataReaderListener for Counter {
//!     fn on_data_available(&self, reader: &DataReader) {
//!         if let Ok(samples) = reader.take() {
//!             self.0.fetch_add(samples.len(), Ordering::Relaxed);
//!         }
//!     }
//! }
//!
//! let domain = DomainBuilder::new().build()?;
//! let topic = domain.create_topic("T", TypeDescriptor::new("T").field("id", FieldKind::Int), &["id"])?;
//! let writer = domain.create_writer(&topic, QoS::reliable())?;
//! let reader = domain.create_reader(&topic, QoS::reliable())?;
//!
//! let counter = Arc::new(Counter::default());
//! reader.set_listener(Some(counter.clone()))?;
//! writer.write(&Data::new().with("id", 1))?;
//! assert_eq!(counter.0.load(Ordering::Relaxed), 1);
//! # Ok::<(), hdds_dcps::Error>(())
//! ```
//!
//! # Dispatch
//!
//! Statuses raised while internal locks are held are only recorded. The
//! callbacks run once the operation that raised them (a write, a coherent
//! commit, a match change, a transport callback) has released every lock,
//! on the thread that performed it. A callback may therefore call back into
//! any entity, including the one it is notified for.
//!
//! A callback receives the status through the entity's getter, which
//! clears the status bit as an application poll would. A status the
//! application cleared before dispatch is not reported.
//!
//! # Thread Safety
//!
//! Listeners must be `Send + Sync` and should not block.
//!
//! # DDS Specification
//!
//! See DDS v1.4 Section 2.2.4 - Listeners, Conditions, and Wait-sets.

use super::condition::StatusMask;
use super::domain::DomainInner;
use super::reader::{DataReader, ReaderShared};
use super::status::{
    DroppedSampleStatus, IncompatibleQosStatus, PublicationMatchedStatus,
    SubscriptionMatchedStatus,
};
use super::writer::{DataWriter, WriterShared};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// Listener for DataReader events.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait DataReaderListener: Send + Sync {
    /// New samples are available. Not called for samples held in an open
    /// coherent set; the commit reports them.
    fn on_data_available(&self, reader: &DataReader) {
        let _ = reader;
    }

    /// A sample (or a whole coherent set) was refused by a resource limit.
    fn on_sample_rejected(&self, reader: &DataReader, status: DroppedSampleStatus) {
        let _ = (reader, status);
    }

    /// A writer matched or unmatched.
    fn on_subscription_matched(&self, reader: &DataReader, status: SubscriptionMatchedStatus) {
        let _ = (reader, status);
    }

    fn on_requested_incompatible_qos(&self, reader: &DataReader, status: IncompatibleQosStatus) {
        let _ = (reader, status);
    }
}

/// Listener for DataWriter events.
pub trait DataWriterListener: Send + Sync {
    /// A reader matched or unmatched.
    fn on_publication_matched(&self, writer: &DataWriter, status: PublicationMatchedStatus) {
        let _ = (writer, status);
    }

    fn on_offered_incompatible_qos(&self, writer: &DataWriter, status: IncompatibleQosStatus) {
        let _ = (writer, status);
    }
}

/// An entity's installed listener and the statuses raised since the last
/// dispatch.
pub(crate) struct ListenerSlot<L: ?Sized> {
    installed: RwLock<Option<(Arc<L>, Weak<DomainInner>)>>,
    raised: AtomicU32,
}

impl<L: ?Sized> Default for ListenerSlot<L> {
    fn default() -> Self {
        Self {
            installed: RwLock::new(None),
            raised: AtomicU32::new(0),
        }
    }
}

impl<L: ?Sized> std::fmt::Debug for ListenerSlot<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSlot")
            .field("installed", &self.installed.read().is_some())
            .field("raised", &StatusMask::from_bits(self.raised.load(Ordering::Relaxed)))
            .finish()
    }
}

impl<L: ?Sized> ListenerSlot<L> {
    /// Replace the listener. Statuses raised before are not reported to it.
    pub fn install(&self, listener: Option<Arc<L>>, domain: Weak<DomainInner>) {
        let mut installed = self.installed.write();
        *installed = listener.map(|l| (l, domain));
        self.raised.store(0, Ordering::Release);
    }

    pub fn raise(&self, mask: StatusMask) {
        self.raised.fetch_or(mask.bits(), Ordering::AcqRel);
    }

    /// Listener and raised statuses, clearing the latter. `None` when no
    /// listener is installed or nothing was raised.
    fn take(&self) -> Option<(Arc<L>, Weak<DomainInner>, StatusMask)> {
        let (listener, domain) = self.installed.read().clone()?;
        let raised = self.raised.swap(0, Ordering::AcqRel);
        if raised == 0 {
            return None;
        }
        Some((listener, domain, StatusMask::from_bits(raised)))
    }
}

/// Run the reader's listener for the statuses raised since the last call.
///
/// Must be called with no domain, instance or cache lock held.
pub(crate) fn notify_reader(shared: &Arc<ReaderShared>) {
    let Some((listener, domain, raised)) = shared.listener().take() else {
        return;
    };
    let reader = DataReader {
        shared: Arc::clone(shared),
        domain,
    };
    let pending = raised & reader.get_statuscondition().get_active_statuses();

    if pending.contains(StatusMask::SUBSCRIPTION_MATCHED) {
        listener.on_subscription_matched(&reader, reader.subscription_matched_status());
    }
    if pending.contains(StatusMask::REQUESTED_INCOMPATIBLE_QOS) {
        listener.on_requested_incompatible_qos(&reader, reader.requested_incompatible_qos_status());
    }
    if pending.contains(StatusMask::SAMPLE_REJECTED) {
        listener.on_sample_rejected(&reader, reader.dropped_sample_status());
    }
    if pending.contains(StatusMask::DATA_AVAILABLE) {
        log::trace!("[reader] {} data available, calling listener", reader.id());
        listener.on_data_available(&reader);
    }
}

/// Run the writer's listener for the statuses raised since the last call.
pub(crate) fn notify_writer(shared: &Arc<WriterShared>) {
    let Some((listener, domain, raised)) = shared.listener().take() else {
        return;
    };
    let writer = DataWriter {
        shared: Arc::clone(shared),
        domain,
    };
    let pending = raised & writer.get_statuscondition().get_active_statuses();

    if pending.contains(StatusMask::PUBLICATION_MATCHED) {
        listener.on_publication_matched(&writer, writer.publication_matched_status());
    }
    if pending.contains(StatusMask::OFFERED_INCOMPATIBLE_QOS) {
        listener.on_offered_incompatible_qos(&writer, writer.offered_incompatible_qos_status());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_reports_only_after_install() {
        let slot: ListenerSlot<dyn Send + Sync> = ListenerSlot::default();
        slot.raise(StatusMask::DATA_AVAILABLE);
        assert!(slot.take().is_none());

        let listener: Arc<dyn Send + Sync> = Arc::new(());
        slot.install(Some(listener), Weak::new());
        assert!(slot.take().is_none());

        slot.raise(StatusMask::DATA_AVAILABLE);
        slot.raise(StatusMask::SAMPLE_REJECTED);
        let (_, _, raised) = slot.take().expect("raised");
        assert_eq!(raised, StatusMask::DATA_AVAILABLE | StatusMask::SAMPLE_REJECTED);
        assert!(slot.take().is_none());

        slot.install(None, Weak::new());
        slot.raise(StatusMask::DATA_AVAILABLE);
        assert!(slot.take().is_none());
    }
}
