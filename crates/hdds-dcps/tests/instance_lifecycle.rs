// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance lifecycle integration tests
//!
//! Register, write, dispose and unregister as observed by a reader, plus
//! instance rebirth and reclamation.

use hdds_dcps::{
    Data, DataState, Domain, DomainBuilder, Error, FieldKind, FieldValue, InstanceHandle,
    InstanceState, InstanceStateMask, QoS, Topic, TypeDescriptor, ViewState,
};

fn sensor_topic(domain: &Domain) -> Topic {
    let ty = TypeDescriptor::new("Sensor")
        .field("id", FieldKind::Int)
        .field("value", FieldKind::Float);
    domain
        .create_topic("Sensor", ty, &["id"])
        .expect("create topic")
}

fn reading(id: i64, value: f64) -> Data {
    Data::new().with("id", id).with("value", value)
}

#[test]
fn test_write_then_dispose() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");

    writer.write(&reading(1, 20.0)).expect("write");
    let handle = writer
        .lookup_instance(&reading(1, 0.0))
        .expect("lookup")
        .expect("instance exists");
    writer.dispose(handle).expect("dispose");

    let samples = reader.take().expect("take");
    assert_eq!(samples.len(), 2);
    assert!(samples[0].is_valid());
    assert!(!samples[1].is_valid());
    assert!(samples
        .iter()
        .all(|s| s.info().instance_state == InstanceState::NotAliveDisposed));
    assert_eq!(samples[1].info().instance_handle, handle);
}

#[test]
fn test_last_unregister_reports_no_writers() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let w1 = domain.create_writer(&topic, QoS::reliable()).expect("w1");
    let w2 = domain.create_writer(&topic, QoS::reliable()).expect("w2");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");

    let handle = w1.register_instance(&reading(7, 0.0)).expect("register w1");
    assert_eq!(w2.register_instance(&reading(7, 0.0)).expect("register w2"), handle);
    w1.write(&reading(7, 1.0)).expect("write");

    w1.unregister_instance(handle).expect("unregister w1");
    let alive = reader.read().expect("read");
    assert_eq!(alive.len(), 1);
    assert_eq!(alive[0].info().instance_state, InstanceState::Alive);

    w2.unregister_instance(handle).expect("unregister w2");
    let samples = reader.take().expect("take");
    assert_eq!(samples.len(), 2);
    assert!(!samples[1].is_valid());
    assert_eq!(samples[1].info().instance_state, InstanceState::NotAliveNoWriters);
}

#[test]
fn test_unregister_without_registration_fails() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let w1 = domain.create_writer(&topic, QoS::reliable()).expect("w1");
    let w2 = domain.create_writer(&topic, QoS::reliable()).expect("w2");

    let handle = w1.register_instance(&reading(1, 0.0)).expect("register");
    assert!(matches!(
        w2.unregister_instance(handle),
        Err(Error::PreconditionNotMet(_))
    ));
    assert!(matches!(
        w1.dispose(InstanceHandle::NIL),
        Err(Error::InvalidHandle)
    ));
}

#[test]
fn test_write_after_dispose_is_rebirth() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");

    let handle = writer.register_instance(&reading(3, 0.0)).expect("register");
    writer.write(&reading(3, 1.0)).expect("write");
    reader.read().expect("read");
    writer.dispose(handle).expect("dispose");
    writer.write(&reading(3, 2.0)).expect("write again");

    let samples = reader.take().expect("take");
    let last = samples.last().expect("samples");
    assert_eq!(last.info().instance_state, InstanceState::Alive);
    assert_eq!(last.info().view_state, ViewState::New);
    assert_eq!(last.info().disposed_generation_count, 1);
    assert_eq!(last.info().no_writers_generation_count, 0);
    assert_eq!(last.data().and_then(|d| d.get("value")), Some(&FieldValue::Float(2.0)));
}

#[test]
fn test_unregister_keeps_disposed_state() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");

    writer.write(&reading(4, 1.0)).expect("write");
    let handle = reader.take().expect("take")[0].info().instance_handle;
    writer.dispose(handle).expect("dispose");
    writer.unregister_instance(handle).expect("unregister");

    let samples = reader.take().expect("take");
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].info().instance_state, InstanceState::NotAliveDisposed);
}

#[test]
fn test_instance_reclaimed_after_samples_taken() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");

    let handle = writer.register_instance(&reading(5, 0.0)).expect("register");
    writer.write(&reading(5, 1.0)).expect("write");
    writer.unregister_instance(handle).expect("unregister");
    assert_eq!(topic.instance_count(), 1);

    let samples = reader.take().expect("take");
    assert_eq!(samples.len(), 2);
    drop(samples);
    assert_eq!(topic.instance_count(), 0);
    assert_eq!(writer.lookup_instance(&reading(5, 0.0)).expect("lookup"), None);
    assert_eq!(reader.cache_status().reclaimed_instances, 1);
}

#[test]
fn test_reclaimed_key_gets_new_handle() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");

    let first = writer.register_instance(&reading(6, 0.0)).expect("register");
    writer.unregister_instance(first).expect("unregister");
    assert_eq!(topic.instance_count(), 0);

    let second = writer.register_instance(&reading(6, 0.0)).expect("register again");
    assert!(second > first);
    assert!(matches!(writer.dispose(first), Err(Error::InvalidHandle)));
}

#[test]
fn test_key_value_and_lookup_on_reader() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");

    writer.write(&reading(42, 1.5)).expect("write");
    let handle = reader
        .lookup_instance(&reading(42, 0.0))
        .expect("lookup")
        .expect("known");
    let key = reader.key_value(handle).expect("key value");
    assert_eq!(key.get("id"), Some(&FieldValue::Integer(42)));
    assert!(reader.lookup_instance(&reading(43, 0.0)).expect("lookup").is_none());
    assert!(matches!(
        reader.key_value(InstanceHandle::NIL),
        Err(Error::InvalidHandle)
    ));
}

#[test]
fn test_take_instance_and_next_instance() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");

    for id in [1, 2, 3] {
        writer.write(&reading(id, 0.0)).expect("write");
        writer.write(&reading(id, 1.0)).expect("write");
    }

    let first = reader.take_next_instance(InstanceHandle::NIL).expect("first");
    assert_eq!(first.len(), 2);
    let h1 = first[0].info().instance_handle;
    assert!(first.iter().all(|s| s.info().instance_handle == h1));

    let h3 = writer
        .lookup_instance(&reading(3, 0.0))
        .expect("lookup")
        .expect("instance 3");
    assert_eq!(reader.take_instance(h3).expect("take 3").len(), 2);

    let second = reader.take_next_instance(h1).expect("second");
    assert_eq!(second.len(), 2);
    let h2 = second[0].info().instance_handle;
    assert!(matches!(reader.take_next_instance(h2), Err(Error::NoData)));
}

#[test]
fn test_disposed_instances_selected_by_state() {
    let domain = DomainBuilder::new().build().expect("domain");
    let topic = sensor_topic(&domain);
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");

    writer.write(&reading(1, 0.0)).expect("write");
    let h2 = writer.register_instance(&reading(2, 0.0)).expect("register");
    writer.write(&reading(2, 0.0)).expect("write");
    writer.dispose(h2).expect("dispose");

    let disposed = reader
        .select()
        .state(DataState::any().with_instance(InstanceStateMask::NOT_ALIVE_DISPOSED))
        .take()
        .expect("take disposed");
    assert_eq!(disposed.len(), 2);
    assert!(disposed.iter().all(|s| s.info().instance_handle == h2));
    assert_eq!(reader.take().expect("take rest").len(), 1);
}
