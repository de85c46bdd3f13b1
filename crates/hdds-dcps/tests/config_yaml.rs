// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain configuration from YAML QoS profiles
//!
//! Profiles loaded from a file at domain build time become the default
//! endpoint QoS and can be looked up by name.

#![cfg(feature = "qos-loaders")]

use hdds_dcps::config::YamlLoader;
use hdds_dcps::{
    Data, DomainBuilder, DomainConfig, Error, FieldKind, History, OwnershipKind,
    PresentationAccessScope, QoS, Reliability, ResourceLimits, TypeDescriptor,
};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const PROFILES: &str = r#"
default_profile: telemetry
profiles:
  telemetry:
    reliability: RELIABLE
    history: { kind: KEEP_LAST, depth: 4 }
    resource_limits: { max_samples: 100, max_instances: -1, max_samples_per_instance: 10 }
  control:
    reliability: RELIABLE
    history: { kind: KEEP_ALL }
    ownership: EXCLUSIVE
    ownership_strength: 20
    partition: ["cell.*"]
    presentation: { access_scope: GROUP, coherent_access: true, ordered_access: true }
  throttled:
    time_based_filter: { minimum_separation_ms: 500 }
"#;

fn profile_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write yaml");
    file.flush().expect("flush");
    file
}

#[test]
fn test_domain_loads_profiles_from_file() {
    let file = profile_file(PROFILES);
    let domain = DomainBuilder::new()
        .name("plant")
        .with_qos_file(file.path())
        .build()
        .expect("domain");

    assert_eq!(domain.name(), "plant");
    let default = domain.default_reader_qos();
    assert_eq!(default.reliability, Reliability::Reliable);
    assert_eq!(default.history, History::KeepLast(4));
    assert_eq!(default.resource_limits.max_samples, 100);
    assert_eq!(default.resource_limits.max_instances, ResourceLimits::UNLIMITED);
    assert_eq!(domain.default_writer_qos(), default);

    let control = domain.qos_profile("control").expect("control");
    assert_eq!(control.history, History::KeepAll);
    assert_eq!(control.ownership.kind, OwnershipKind::Exclusive);
    assert_eq!(control.ownership_strength.value, 20);
    assert_eq!(control.partition.names, vec!["cell.*".to_string()]);
    assert_eq!(control.presentation.access_scope, PresentationAccessScope::Group);
    assert!(control.presentation.coherent_access && control.presentation.ordered_access);

    let throttled = domain.qos_profile("throttled").expect("throttled");
    assert_eq!(
        throttled.time_based_filter.minimum_separation,
        Duration::from_millis(500)
    );
    assert!(matches!(domain.qos_profile("missing"), Err(Error::Config(_))));
}

#[test]
fn test_profile_qos_drives_endpoints() {
    let file = profile_file(PROFILES);
    let domain = DomainBuilder::new()
        .with_qos_file(file.path())
        .build()
        .expect("domain");
    let ty = TypeDescriptor::new("Reading").field("id", FieldKind::Int);
    let topic = domain.create_topic("Reading", ty, &["id"]).expect("topic");
    let writer = domain
        .create_writer(&topic, domain.default_writer_qos())
        .expect("writer");
    let reader = domain
        .create_reader(&topic, domain.default_reader_qos())
        .expect("reader");

    for _ in 0..6 {
        writer.write(&Data::new().with("id", 1)).expect("write");
    }
    assert_eq!(reader.take().expect("take").len(), 4);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = DomainBuilder::new()
        .with_qos_file(dir.path().join("absent.yaml"))
        .build();
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_malformed_profiles_are_config_errors() {
    let unknown_field = profile_file("profiles:\n  p:\n    durability: VOLATILE\n");
    assert!(matches!(
        DomainBuilder::new().with_qos_file(unknown_field.path()).build(),
        Err(Error::Config(_))
    ));

    assert!(matches!(
        YamlLoader::load_from_str("profiles:\n  p:\n    reliability: SOMETIMES\n"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        YamlLoader::load_from_str("profiles:\n  p:\n    history: { kind: KEEP_LAST, depth: 0 }\n"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        YamlLoader::load_from_str("default_profile: nope\nprofiles: {}\n"),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_config_record_defaults() {
    let config = DomainConfig::default();
    assert_eq!(config.name, "default");
    assert_eq!(config.reader_qos, QoS::default());
    assert!(config.profiles.is_empty());

    let domain = DomainBuilder::new()
        .with_config(config)
        .with_condition_capacity(16)
        .build()
        .expect("domain");
    assert_eq!(domain.name(), "default");
    assert_eq!(domain.last_sequence_number(), 0);
}
