// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WaitSet and condition integration tests
//!
//! Blocking waits woken by read, query, status and guard conditions, plus
//! condition and reader deletion.

use hdds_dcps::{
    Condition, Data, DataState, DomainBuilder, Error, FieldKind, GuardCondition, QoS, StatusMask,
    TypeDescriptor, WaitSet,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

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

#[test]
fn test_wait_times_out() {
    let waitset = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());
    waitset.attach_condition(Arc::clone(&guard)).expect("attach");

    let start = Instant::now();
    let result = waitset.wait(Some(Duration::from_millis(200)));
    let elapsed = start.elapsed();
    assert!(matches!(result, Err(Error::Timeout)));
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(2));
}

#[test]
fn test_read_condition_wakes_waiter() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all())
        .expect("reader");
    let condition = reader
        .create_readcondition(DataState::not_read())
        .expect("condition");
    let waitset = WaitSet::new();
    waitset.attach_condition(condition.clone()).expect("attach");

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        writer.write(&msg(1, 1)).expect("write");
    });

    let triggered = waitset.wait(Some(Duration::from_secs(5))).expect("wait");
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].id(), condition.id());
    producer.join().expect("producer");

    let samples = reader
        .select()
        .condition(condition.clone())
        .take()
        .expect("take");
    assert_eq!(samples.len(), 1);
    assert!(!condition.get_trigger_value());
}

#[test]
fn test_already_true_condition_returns_at_once() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");
    writer.write(&msg(1, 1)).expect("write");

    let waitset = WaitSet::new();
    waitset
        .attach_condition(reader.create_readcondition(DataState::any()).expect("condition"))
        .expect("attach");
    let start = Instant::now();
    assert_eq!(waitset.wait(None).expect("wait").len(), 1);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_guard_condition_from_other_thread() {
    let waitset = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());
    waitset.attach_condition(Arc::clone(&guard)).expect("attach");

    let trigger = Arc::clone(&guard);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        trigger.set_trigger_value(true);
    });
    let triggered = waitset.wait(Some(Duration::from_secs(5))).expect("wait");
    handle.join().expect("thread");
    assert!(matches!(&triggered[0], Condition::Guard(g) if g.id() == guard.id()));

    guard.set_trigger_value(false);
    assert!(matches!(
        waitset.wait(Some(Duration::from_millis(20))),
        Err(Error::Timeout)
    ));
}

#[test]
fn test_status_condition_subscription_matched() {
    let (domain, topic) = domain_with_topic();
    let reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");
    let status = reader.get_statuscondition();
    status.set_enabled_statuses(StatusMask::SUBSCRIPTION_MATCHED);
    assert!(!status.get_trigger_value());

    let waitset = WaitSet::new();
    waitset.attach_condition(Arc::clone(&status)).expect("attach");
    let _writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");

    let triggered = waitset.wait(Some(Duration::from_secs(1))).expect("wait");
    assert_eq!(triggered.len(), 1);
    let matched = reader.subscription_matched_status();
    assert_eq!(matched.current_count, 1);
    assert_eq!(matched.current_count_change, 1);
    assert!(!status.get_trigger_value());
}

#[test]
fn test_status_condition_data_available() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");
    let status = reader.get_statuscondition();
    assert_eq!(status.get_enabled_statuses(), StatusMask::ALL);
    let _ = reader.subscription_matched_status();

    writer.write(&msg(1, 1)).expect("write");
    assert!(status.get_active_statuses().contains(StatusMask::DATA_AVAILABLE));
    reader.read().expect("read");
    assert!(!status.get_active_statuses().contains(StatusMask::DATA_AVAILABLE));
}

#[test]
fn test_attach_and_detach_rules() {
    let waitset = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());
    waitset.attach_condition(Arc::clone(&guard)).expect("attach");
    assert!(matches!(
        waitset.attach_condition(Arc::clone(&guard)),
        Err(Error::PreconditionNotMet(_))
    ));
    assert_eq!(waitset.get_conditions().len(), 1);
    waitset.detach_condition(Arc::clone(&guard)).expect("detach");
    assert!(matches!(
        waitset.detach_condition(Arc::clone(&guard)),
        Err(Error::PreconditionNotMet(_))
    ));
    assert!(waitset.get_conditions().is_empty());
}

#[test]
fn test_deleted_condition_is_invalid() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");
    let condition = reader
        .create_readcondition(DataState::any())
        .expect("condition");
    writer.write(&msg(1, 1)).expect("write");
    assert!(condition.get_trigger_value());

    reader.delete_condition(condition.clone()).expect("delete");
    assert!(!condition.is_valid());
    assert!(!condition.get_trigger_value());
    assert!(matches!(
        reader.delete_condition(condition.clone()),
        Err(Error::InvalidHandle)
    ));
    let waitset = WaitSet::new();
    assert!(matches!(
        waitset.attach_condition(condition.clone()),
        Err(Error::InvalidHandle)
    ));
    assert!(matches!(
        reader.select().condition(condition).take(),
        Err(Error::InvalidHandle)
    ));
}

#[test]
fn test_condition_of_other_reader_rejected() {
    let (domain, topic) = domain_with_topic();
    let r1 = domain.create_reader(&topic, QoS::reliable()).expect("r1");
    let r2 = domain.create_reader(&topic, QoS::reliable()).expect("r2");
    let condition = r1.create_readcondition(DataState::any()).expect("condition");
    assert!(matches!(
        r2.delete_condition(condition.clone()),
        Err(Error::PreconditionNotMet(_))
    ));
    assert!(matches!(
        r2.select().condition(condition).read(),
        Err(Error::PreconditionNotMet(_))
    ));
}

#[test]
fn test_reader_deletion_waits_for_loans() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");
    let condition = reader
        .create_readcondition(DataState::any())
        .expect("condition");
    writer.write(&msg(1, 1)).expect("write");

    let loan = reader.take().expect("take");
    let subscriber = domain.default_subscriber();
    assert!(matches!(
        subscriber.delete_datareader(&reader),
        Err(Error::PreconditionNotMet(_))
    ));
    reader.return_loan(loan).expect("return loan");
    subscriber.delete_datareader(&reader).expect("delete");

    assert!(!condition.is_valid());
    assert!(matches!(reader.take(), Err(Error::InvalidHandle)));
    assert_eq!(writer.publication_matched_status().current_count, 0);
}

#[test]
fn test_single_waiter_only() {
    let waitset = Arc::new(WaitSet::new());
    let guard = Arc::new(GuardCondition::new());
    waitset.attach_condition(Arc::clone(&guard)).expect("attach");

    let blocked = Arc::clone(&waitset);
    let waiter = thread::spawn(move || blocked.wait(Some(Duration::from_secs(5))));
    thread::sleep(Duration::from_millis(100));
    assert!(matches!(
        waitset.wait(Some(Duration::from_millis(10))),
        Err(Error::PreconditionNotMet(_))
    ));
    guard.set_trigger_value(true);
    let triggered = waiter.join().expect("waiter").expect("wait");
    assert_eq!(triggered.len(), 1);
}

#[test]
fn test_attach_while_waiting_wakes_on_new_condition() {
    let (domain, topic) = domain_with_topic();
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain.create_reader(&topic, QoS::reliable()).expect("reader");
    let waitset = Arc::new(WaitSet::new());
    waitset
        .attach_condition(Arc::new(GuardCondition::new()))
        .expect("attach idle guard");

    let blocked = Arc::clone(&waitset);
    let waiter = thread::spawn(move || blocked.wait(Some(Duration::from_secs(5))));
    thread::sleep(Duration::from_millis(50));

    let condition = reader
        .create_readcondition(DataState::not_read())
        .expect("read condition");
    waitset.attach_condition(condition.clone()).expect("attach");
    writer.write(&msg(1, 1)).expect("write");

    let triggered = waiter.join().expect("waiter").expect("wait");
    assert_eq!(triggered.len(), 1);
    assert!(matches!(&triggered[0], Condition::Read(c) if c.id() == condition.id()));
}

#[test]
fn test_detach_while_waiting_ignores_condition() {
    let waitset = Arc::new(WaitSet::new());
    let guard = Arc::new(GuardCondition::new());
    waitset.attach_condition(Arc::clone(&guard)).expect("attach");

    let blocked = Arc::clone(&waitset);
    let started = Instant::now();
    let waiter = thread::spawn(move || blocked.wait(Some(Duration::from_millis(300))));
    thread::sleep(Duration::from_millis(50));

    waitset.detach_condition(Arc::clone(&guard)).expect("detach");
    guard.set_trigger_value(true);
    assert!(matches!(waiter.join().expect("waiter"), Err(Error::Timeout)));
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(waitset.get_conditions().is_empty());
}
