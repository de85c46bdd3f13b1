// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TIME_BASED_FILTER QoS policy integration tests
//!
//! Minimum separation per instance, measured on source timestamps.

use hdds_dcps::{Data, DomainBuilder, FieldKind, QoS, Timestamp, TypeDescriptor};
use std::time::Duration;

fn setup(separation: Duration) -> (hdds_dcps::Domain, hdds_dcps::DataWriter, hdds_dcps::DataReader) {
    let domain = DomainBuilder::new().build().expect("domain");
    let ty = TypeDescriptor::new("Tick")
        .field("id", FieldKind::Int)
        .field("n", FieldKind::Int);
    let topic = domain.create_topic("Tick", ty, &["id"]).expect("topic");
    let writer = domain.create_writer(&topic, QoS::reliable()).expect("writer");
    let reader = domain
        .create_reader(
            &topic,
            QoS::reliable().keep_all().time_based_filter(separation),
        )
        .expect("reader");
    (domain, writer, reader)
}

fn tick(id: i64, n: i64) -> Data {
    Data::new().with("id", id).with("n", n)
}

#[test]
fn test_time_based_filter_default_is_zero() {
    assert_eq!(
        QoS::default().time_based_filter.minimum_separation,
        Duration::ZERO
    );
}

#[test]
fn test_samples_within_separation_dropped() {
    let (_domain, writer, reader) = setup(Duration::from_millis(100));
    for (n, ms) in [(0, 0), (1, 30), (2, 99), (3, 100), (4, 150), (5, 210)] {
        writer
            .write_w_timestamp(&tick(1, n), Timestamp::from_millis(1_000 + ms))
            .expect("write");
    }
    let samples = reader.take().expect("take");
    let kept: Vec<u64> = samples
        .iter()
        .map(|s| s.info().source_timestamp.as_nanos() / 1_000_000 - 1_000)
        .collect();
    assert_eq!(kept, vec![0, 100, 210]);
    assert_eq!(reader.dropped_sample_status().time_filter_dropped, 3);
}

#[test]
fn test_separation_tracked_per_instance() {
    let (_domain, writer, reader) = setup(Duration::from_millis(50));
    writer
        .write_w_timestamp(&tick(1, 0), Timestamp::from_millis(0))
        .expect("write");
    writer
        .write_w_timestamp(&tick(2, 0), Timestamp::from_millis(10))
        .expect("write");
    writer
        .write_w_timestamp(&tick(1, 1), Timestamp::from_millis(20))
        .expect("write");
    writer
        .write_w_timestamp(&tick(2, 1), Timestamp::from_millis(60))
        .expect("write");

    assert_eq!(reader.take().expect("take").len(), 3);
}

#[test]
fn test_lifecycle_samples_bypass_filter() {
    let (_domain, writer, reader) = setup(Duration::from_secs(10));
    let handle = writer.register_instance(&tick(1, 0)).expect("register");
    writer.write(&tick(1, 0)).expect("write");
    writer.dispose(handle).expect("dispose");

    let samples = reader.take().expect("take");
    assert_eq!(samples.len(), 2);
    assert!(!samples[1].is_valid());
}

#[test]
fn test_zero_separation_keeps_everything() {
    let (_domain, writer, reader) = setup(Duration::ZERO);
    for n in 0..5 {
        writer
            .write_w_timestamp(&tick(1, n), Timestamp::from_millis(7))
            .expect("write");
    }
    assert_eq!(reader.take().expect("take").len(), 5);
}
