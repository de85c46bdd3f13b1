// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader and writer listener integration tests
//!
//! Callbacks for data, rejections, matching and incompatible QoS, run after
//! the raising operation released its locks.

use hdds_dcps::transport::{RemoteWriter, TransportListener};
use hdds_dcps::{
    Data, DataReader, DataReaderListener, DataWriter, DataWriterListener, DomainBuilder,
    DroppedSampleStatus, FieldKind, IncompatibleQosStatus, InstanceKey, Presentation,
    PublicationMatchedStatus, QoS, StatusMask, SubscriptionMatchedStatus, Timestamp,
    TypeDescriptor, WriterId,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn domain_with_topic() -> (hdds_dcps::Domain, hdds_dcps::Topic) {
    let domain = DomainBuilder::new().build().expect("domain");
    let ty = TypeDescriptor::new("Msg")
        .field("id", FieldKind::Int)
        .field("n", FieldKind::Int);
    let topic = domain.create_topic("Msg", ty, &["id"]).expect("topic");
    (domain, topic)
}

fn msg(id: i64, n: i64) -> Data {
    Data::new().with("id", id).with("n", n)
}

/// Takes everything on each data callback and records the other statuses.
#[derive(Default)]
struct ReaderRecorder {
    calls: AtomicUsize,
    taken: AtomicUsize,
    rejected: Mutex<Vec<DroppedSampleStatus>>,
    matched: Mutex<Vec<SubscriptionMatchedStatus>>,
    incompatible: Mutex<Vec<IncompatibleQosStatus>>,
}

impl DataReaderListener for ReaderRecorder {
    fn on_data_available(&self, reader: &DataReader) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(samples) = reader.take() {
            self.taken.fetch_add(samples.len(), Ordering::SeqCst);
        }
    }

    fn on_sample_rejected(&self, _reader: &DataReader, status: DroppedSampleStatus) {
        self.rejected.lock().push(status);
    }

    fn on_subscription_matched(&self, _reader: &DataReader, status: SubscriptionMatchedStatus) {
        self.matched.lock().push(status);
    }

    fn on_requested_incompatible_qos(&self, _reader: &DataReader, status: IncompatibleQosStatus) {
        self.incompatible.lock().push(status);
    }
}

#[derive(Default)]
struct WriterRecorder {
    matched: Mutex<Vec<PublicationMatchedStatus>>,
    incompatible: Mutex<Vec<IncompatibleQosStatus>>,
}

impl DataWriterListener for WriterRecorder {
    fn on_publication_matched(&self, _writer: &DataWriter, status: PublicationMatchedStatus) {
        self.matched.lock().push(status);
    }

    fn on_offered_incompatible_qos(&self, _writer: &DataWriter, status: IncompatibleQosStatus) {
        self.incompatible.lock().push(status);
    }
}

#[test]
fn test_data_available_callback_may_take() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");
    let recorder = Arc::new(ReaderRecorder::default());
    reader.set_listener(Some(recorder.clone())).expect("listener");

    for n in 0..3 {
        writer.write(&msg(1, n)).expect("write");
    }
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.taken.load(Ordering::SeqCst), 3);
    // The callback consumed the status as a poll would.
    assert!(!reader
        .get_statuscondition()
        .get_active_statuses()
        .contains(StatusMask::DATA_AVAILABLE));
}

#[test]
fn test_statuses_before_install_not_reported() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");
    writer.write(&msg(1, 0)).expect("write");

    let recorder = Arc::new(ReaderRecorder::default());
    reader.set_listener(Some(recorder.clone())).expect("listener");
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    assert!(recorder.matched.lock().is_empty());

    writer.write(&msg(1, 1)).expect("write");
    assert_eq!(recorder.taken.load(Ordering::SeqCst), 2);
}

#[test]
fn test_removed_listener_is_silent() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");
    let recorder = Arc::new(ReaderRecorder::default());
    reader.set_listener(Some(recorder.clone())).expect("listener");
    reader.set_listener(None).expect("remove");

    writer.write(&msg(1, 0)).expect("write");
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(reader.take().expect("still there").len(), 1);
}

#[test]
fn test_sample_rejected_callback() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all().max_samples(1))
        .expect("reader");
    // Counts data without taking, so the second sample is refused.
    #[derive(Default)]
    struct Keeper(Mutex<Vec<DroppedSampleStatus>>);
    impl DataReaderListener for Keeper {
        fn on_sample_rejected(&self, _reader: &DataReader, status: DroppedSampleStatus) {
            self.0.lock().push(status);
        }
    }
    let keeper = Arc::new(Keeper::default());
    reader.set_listener(Some(keeper.clone())).expect("listener");

    writer.write(&msg(1, 0)).expect("write");
    writer.write(&msg(2, 0)).expect("write");
    let rejected = keeper.0.lock().clone();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].resource_limit_rejected, 1);
}

#[test]
fn test_matched_callbacks_on_both_sides() {
    let (domain, topic) = domain_with_topic();
    let reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");
    let reader_recorder = Arc::new(ReaderRecorder::default());
    reader
        .set_listener(Some(reader_recorder.clone()))
        .expect("reader listener");

    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    {
        let matched = reader_recorder.matched.lock();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].current_count, 1);
        assert_eq!(matched[0].current_count_change, 1);
    }

    // Reset the change counters the creation left behind.
    assert_eq!(writer.publication_matched_status().current_count_change, 1);
    let writer_recorder = Arc::new(WriterRecorder::default());
    writer
        .set_listener(Some(writer_recorder.clone()))
        .expect("writer listener");
    domain
        .default_subscriber()
        .delete_datareader(&reader)
        .expect("delete reader");
    let matched = writer_recorder.matched.lock();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].current_count, 0);
    assert_eq!(matched[0].current_count_change, -1);
}

#[test]
fn test_offered_incompatible_qos_callback() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::best_effort()).expect("writer");
    let recorder = Arc::new(WriterRecorder::default());
    writer.set_listener(Some(recorder.clone())).expect("listener");

    let _reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");
    let incompatible = recorder.incompatible.lock();
    assert_eq!(incompatible.len(), 1);
    assert_eq!(incompatible[0].total_count, 1);
    assert!(incompatible[0].last_policy.is_some());
    assert!(recorder.matched.lock().is_empty());
}

#[test]
fn test_partition_change_reports_match() {
    let (domain, topic) = domain_with_topic();
    let writer = domain
        .create_writer(&topic, QoS::reliable().partition(&["north"]))
        .expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().partition(&["south"]))
        .expect("reader");
    let recorder = Arc::new(ReaderRecorder::default());
    reader.set_listener(Some(recorder.clone())).expect("listener");

    writer.set_partition(&["south"]).expect("move");
    assert_eq!(recorder.matched.lock().len(), 1);
    assert!(recorder.incompatible.lock().is_empty());
}

#[test]
fn test_coherent_set_reported_once_at_commit() {
    let (domain, topic) = domain_with_topic();
    let publisher = domain.create_publisher(Presentation::topic_coherent());
    let subscriber = domain.create_subscriber(Presentation::topic_coherent());
    let writer = publisher.create_datawriter(&topic, QoS::reliable()).expect("writer");
    let reader = subscriber
        .create_datareader(&topic, QoS::reliable().keep_all())
        .expect("reader");
    let recorder = Arc::new(ReaderRecorder::default());
    reader.set_listener(Some(recorder.clone())).expect("listener");

    publisher.begin_coherent_changes().expect("begin");
    for n in 0..3 {
        writer.write(&msg(n, n)).expect("write");
    }
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    publisher.end_coherent_changes().expect("end");
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.taken.load(Ordering::SeqCst), 3);
}

#[test]
fn test_remote_sample_reaches_listener() {
    let (domain, topic) = domain_with_topic();
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");
    let recorder = Arc::new(ReaderRecorder::default());
    reader.set_listener(Some(recorder.clone())).expect("listener");

    let remote = WriterId(7000);
    domain
        .on_remote_writer_matched(topic.name(), reader.id(), RemoteWriter::new(remote))
        .expect("match");
    assert_eq!(recorder.matched.lock().len(), 1);

    domain
        .on_remote_sample(
            topic.name(),
            InstanceKey::from(1_i64),
            msg(1, 5),
            remote,
            Timestamp::now(),
        )
        .expect("sample");
    assert_eq!(recorder.taken.load(Ordering::SeqCst), 1);
}
