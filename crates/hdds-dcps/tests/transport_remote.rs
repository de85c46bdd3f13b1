// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote writers fed in through the transport callbacks
//!
//! Remote samples share the instance registry, ownership arbitration and
//! reader filters with local writers.

use hdds_dcps::transport::{RemoteWriter, TransportListener};
use hdds_dcps::{
    Data, DomainBuilder, Error, FieldKind, FieldValue, InstanceKey, InstanceState, QoS,
    Timestamp, TypeDescriptor, WriterId,
};

fn setup(reader_qos: QoS) -> (hdds_dcps::Domain, hdds_dcps::Topic, hdds_dcps::DataReader) {
    let domain = DomainBuilder::new().build().expect("domain");
    let ty = TypeDescriptor::new("Gauge")
        .field("id", FieldKind::Int)
        .field("v", FieldKind::Int);
    let topic = domain.create_topic("Gauge", ty, &["id"]).expect("topic");
    let reader = domain.create_reader(&topic, reader_qos).expect("reader");
    (domain, topic, reader)
}

fn gauge(id: i64, v: i64) -> Data {
    Data::new().with("id", id).with("v", v)
}

fn key(id: i64) -> InstanceKey {
    InstanceKey::from(id)
}

#[test]
fn test_remote_sample_reaches_reader() {
    let (domain, _topic, reader) = setup(QoS::default().keep_all());
    let remote = WriterId(50_000);
    domain
        .on_remote_writer_matched("Gauge", reader.id(), RemoteWriter::new(remote))
        .expect("match");
    assert_eq!(reader.subscription_matched_status().current_count, 1);

    domain
        .on_remote_sample("Gauge", key(1), gauge(1, 7), remote, Timestamp::from_secs(1))
        .expect("sample");
    let samples = reader.take().expect("take");
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].info().publication_handle, remote);
    assert_eq!(samples[0].info().source_timestamp, Timestamp::from_secs(1));
    assert_eq!(
        samples[0].data().and_then(|d| d.get("v")),
        Some(&FieldValue::Integer(7))
    );
}

#[test]
fn test_remote_callbacks_validate_input() {
    let (domain, _topic, reader) = setup(QoS::default());
    let remote = WriterId(50_001);

    assert!(matches!(
        domain.on_remote_sample("Gauge", key(1), gauge(1, 1), remote, Timestamp::now()),
        Err(Error::PreconditionNotMet(_))
    ));
    assert!(matches!(
        domain.on_remote_writer_matched("Nope", reader.id(), RemoteWriter::new(remote)),
        Err(Error::BadParameter(_))
    ));
    domain
        .on_remote_writer_matched("Gauge", reader.id(), RemoteWriter::new(remote))
        .expect("match");
    assert!(matches!(
        domain.on_remote_sample("Gauge", key(2), gauge(1, 1), remote, Timestamp::now()),
        Err(Error::BadParameter(_))
    ));
    assert!(matches!(
        domain.on_remote_dispose("Gauge", key(9), remote, Timestamp::now()),
        Err(Error::InvalidHandle)
    ));
}

#[test]
fn test_remote_id_cannot_shadow_local_writer() {
    let (domain, topic, reader) = setup(QoS::default());
    let local = domain.create_writer(&topic, QoS::default()).expect("writer");
    assert!(matches!(
        domain.on_remote_writer_matched("Gauge", reader.id(), RemoteWriter::new(local.id())),
        Err(Error::PreconditionNotMet(_))
    ));
}

#[test]
fn test_local_ids_skip_remote_ids() {
    let (domain, topic, reader) = setup(QoS::default());
    let next = domain.create_writer(&topic, QoS::default()).expect("local writer").id();
    let remote = WriterId(next.0 + 1);
    domain
        .on_remote_writer_matched("Gauge", reader.id(), RemoteWriter::new(remote))
        .expect("match");
    let local = domain.create_writer(&topic, QoS::default()).expect("writer");
    assert_ne!(local.id(), remote);
}

#[test]
fn test_remote_exclusive_writer_arbitrated_with_local() {
    let (domain, topic, reader) = setup(QoS::default().keep_all().ownership_exclusive(0));
    let local = domain
        .create_writer(&topic, QoS::default().ownership_exclusive(5))
        .expect("writer");
    let remote = WriterId(60_000);
    domain
        .on_remote_writer_matched("Gauge", reader.id(), RemoteWriter::new(remote).exclusive(10))
        .expect("match");

    local.write(&gauge(1, 1)).expect("local write");
    domain
        .on_remote_sample("Gauge", key(1), gauge(1, 2), remote, Timestamp::now())
        .expect("remote write");
    local.write(&gauge(1, 3)).expect("dropped local write");

    let values: Vec<_> = reader
        .take()
        .expect("take")
        .iter()
        .map(|s| s.info().publication_handle)
        .collect();
    assert_eq!(values, vec![local.id(), remote]);
    assert_eq!(reader.dropped_sample_status().ownership_dropped, 1);
}

#[test]
fn test_shared_remote_with_exclusive_reader_is_incompatible() {
    let (domain, _topic, reader) = setup(QoS::default().ownership_exclusive(0));
    let remote = WriterId(60_001);
    domain
        .on_remote_writer_matched("Gauge", reader.id(), RemoteWriter::new(remote))
        .expect("reported, not an error");
    assert_eq!(
        reader.requested_incompatible_qos_status().last_policy,
        Some("OWNERSHIP")
    );
    assert!(matches!(
        domain.on_remote_sample("Gauge", key(1), gauge(1, 1), remote, Timestamp::now()),
        Err(Error::PreconditionNotMet(_))
    ));
}

#[test]
fn test_remote_dispose_and_unregister() {
    let (domain, _topic, reader) = setup(QoS::default().keep_all());
    let remote = WriterId(70_000);
    domain
        .on_remote_writer_matched("Gauge", reader.id(), RemoteWriter::new(remote))
        .expect("match");
    domain
        .on_remote_sample("Gauge", key(1), gauge(1, 1), remote, Timestamp::now())
        .expect("sample");
    domain
        .on_remote_sample("Gauge", key(2), gauge(2, 2), remote, Timestamp::now())
        .expect("sample");
    domain
        .on_remote_dispose("Gauge", key(1), remote, Timestamp::now())
        .expect("dispose");
    domain
        .on_remote_unregister("Gauge", key(2), remote, Timestamp::now())
        .expect("unregister");

    let states: Vec<_> = reader
        .take()
        .expect("take")
        .iter()
        .filter(|s| !s.is_valid())
        .map(|s| s.info().instance_state)
        .collect();
    assert_eq!(
        states,
        vec![InstanceState::NotAliveDisposed, InstanceState::NotAliveNoWriters]
    );
}

#[test]
fn test_lost_writer_unregisters_its_instances() {
    let (domain, _topic, reader) = setup(QoS::default().keep_all());
    let remote = WriterId(80_000);
    domain
        .on_remote_writer_matched("Gauge", reader.id(), RemoteWriter::new(remote))
        .expect("match");
    for id in 1..=2 {
        domain
            .on_remote_sample("Gauge", key(id), gauge(id, id), remote, Timestamp::now())
            .expect("sample");
    }
    reader.take().expect("drain");

    domain
        .on_remote_writer_lost("Gauge", reader.id(), remote)
        .expect("lost");
    let samples = reader.take().expect("take");
    assert_eq!(samples.len(), 2);
    assert!(samples
        .iter()
        .all(|s| !s.is_valid() && s.info().instance_state == InstanceState::NotAliveNoWriters));
    let matched = reader.subscription_matched_status();
    assert_eq!(matched.current_count, 0);

    assert!(matches!(
        domain.on_remote_sample("Gauge", key(1), gauge(1, 1), remote, Timestamp::now()),
        Err(Error::PreconditionNotMet(_))
    ));
    assert!(matches!(
        domain.on_remote_writer_lost("Gauge", reader.id(), remote),
        Err(Error::PreconditionNotMet(_))
    ));
}
