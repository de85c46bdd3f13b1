// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PARTITION QoS policy integration tests
//!
//! Name and wildcard matching between writers and readers, and rematching
//! when a partition list changes at runtime.

use hdds_dcps::{Data, DomainBuilder, FieldKind, Partition, QoS, TypeDescriptor};

fn setup() -> (hdds_dcps::Domain, hdds_dcps::Topic) {
    let domain = DomainBuilder::new().build().expect("domain");
    let ty = TypeDescriptor::new("Status")
        .field("id", FieldKind::Int)
        .field("ok", FieldKind::Bool);
    let topic = domain.create_topic("Status", ty, &["id"]).expect("topic");
    (domain, topic)
}

fn status(id: i64) -> Data {
    Data::new().with("id", id).with("ok", true)
}

#[test]
fn test_partition_policy_matching() {
    let default = Partition::default();
    let plant = Partition::single("plant.a");
    let wildcard = Partition::new(vec!["plant.*".to_string()]);
    assert!(default.is_compatible_with(&Partition::default()));
    assert!(!default.is_compatible_with(&plant));
    assert!(plant.is_compatible_with(&wildcard));
    assert!(wildcard.is_compatible_with(&plant));
    assert!(!wildcard.is_compatible_with(&Partition::new(vec!["plant?*".to_string()])));
}

#[test]
fn test_disjoint_partitions_do_not_communicate() {
    let (domain, topic) = setup();
    let writer = domain
        .create_writer(&topic, QoS::reliable().partition(&["north"]))
        .expect("writer");
    let south = domain
        .create_reader(&topic, QoS::reliable().partition(&["south"]))
        .expect("south");
    let north = domain
        .create_reader(&topic, QoS::reliable().partition(&["north", "east"]))
        .expect("north");

    writer.write(&status(1)).expect("write");
    assert!(south.take().is_err());
    assert_eq!(north.take().expect("take").len(), 1);
    assert_eq!(writer.publication_matched_status().current_count, 1);
    assert_eq!(south.requested_incompatible_qos_status().total_count, 0);
}

#[test]
fn test_wildcard_reader_matches_writer() {
    let (domain, topic) = setup();
    let writer = domain
        .create_writer(&topic, QoS::reliable().partition(&["plant.boiler"]))
        .expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().partition(&["plant.*"]))
        .expect("reader");
    writer.write(&status(1)).expect("write");
    assert_eq!(reader.take().expect("take").len(), 1);
}

#[test]
fn test_changing_partition_rematches() {
    let (domain, topic) = setup();
    let writer = domain
        .create_writer(&topic, QoS::reliable().partition(&["a"]))
        .expect("writer");
    let reader = domain
        .create_reader(&topic, QoS::reliable().keep_all().partition(&["b"]))
        .expect("reader");

    writer.write(&status(1)).expect("write");
    assert!(reader.take().is_err());

    reader.set_partition(&["a"]).expect("join a");
    assert_eq!(reader.subscription_matched_status().current_count, 1);
    writer.write(&status(2)).expect("write");
    assert_eq!(reader.take().expect("take").len(), 1);

    writer.set_partition(&["c"]).expect("move writer");
    let matched = reader.subscription_matched_status();
    assert_eq!(matched.current_count, 0);
    assert_eq!(matched.current_count_change, -1);
    writer.write(&status(3)).expect("write");
    assert!(reader.take().is_err());
}
