// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS DCPS - keyed sample distribution core
//!
//! The data-centric publish/subscribe core of a DDS implementation, without
//! a wire protocol: instance lifecycle, exclusive ownership arbitration,
//! content and time-based filtering, per-reader caches with history and
//! resource limits, PRESENTATION (coherent sets, ordered access), and
//! WaitSets over read, query, status and guard conditions.
//!
//! ## Quick Start
//!
//! ```rust
//! use hdds_dcps::{Data, DataState, DomainBuilder, FieldKind, QoS, TypeDescriptor, WaitSet};
//! use std::time::Duration;
//!
//! let domain = DomainBuilder::new().name("quickstart").build()?;
//! let ty = TypeDescriptor::new("Temperature")
//!     .field("sensor", FieldKind::Int)
//!     .field("celsius", FieldKind::Float);
//! let topic = domain.create_topic("Temperature", ty, &["sensor"])?;
//!
//! let writer = domain.create_writer(&topic, QoS::reliable())?;
//! let reader = domain.create_reader(&topic, QoS::reliable().keep_last(10))?;
//!
//! let waitset = WaitSet::new();
//! waitset.attach_condition(reader.create_readcondition(DataState::not_read())?)?;
//!
//! writer.write(&Data::new().with("sensor", 1).with("celsius", 21.5))?;
//! let triggered = waitset.wait(Some(Duration::from_secs(1)))?;
//! assert_eq!(triggered.len(), 1);
//! assert_eq!(reader.take()?.len(), 1);
//! # Ok::<(), hdds_dcps::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                         Application Layer                           |
//! |   Domain -> Publisher/Subscriber -> DataWriter/DataReader, WaitSet  |
//! +---------------------------------------------------------------------+
//! |                           DCPS Layer                                |
//! |   Filter Pipeline | Reader Cache | Presentation | Conditions        |
//! +---------------------------------------------------------------------+
//! |                           Core Layer                                |
//! |   Instance Registry (lifecycle + ownership, one lock per instance) |
//! +---------------------------------------------------------------------+
//! |                     Transport callbacks (external)                  |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Domain`] | Factory for topics, publishers and subscribers |
//! | [`DataWriter`] | Registers, writes, disposes and unregisters instances |
//! | [`DataReader`] | Takes and reads samples from its cache |
//! | [`Topic`] | Named, keyed channel with a [`TypeDescriptor`] |
//! | [`QoS`] | History, ownership, reliability, filters, partitions, limits |
//! | [`WaitSet`] | Blocks until an attached [`Condition`] triggers |
//!
//! ## Modules Overview
//!
//! - [`dds`] - entities and the application API (start here)
//! - [`qos`] - QoS policies and their compatibility rules
//! - [`core`] - instance registry and the data model
//! - [`config`] - domain configuration and YAML QoS profiles
//! - [`transport`] - callbacks for an external transport/discovery layer

/// Domain configuration and QoS profile loading.
pub mod config;
/// Instance registry, identifiers and dynamic payloads.
pub mod core;
/// DCPS entities (Domain, DataWriter, DataReader, Publisher, Subscriber, WaitSet).
pub mod dds;
/// `QoS` (Quality of Service) policies.
pub mod qos;
/// Entry points for remote writers announced by a transport.
pub mod transport;

pub use crate::config::{DomainConfig, QosLibrary};
pub use crate::core::types::{
    Data, FieldDescriptor, FieldKind, FieldValue, InstanceHandle, InstanceKey, KeyValue, ReaderId,
    Timestamp, TypeDescriptor, WriterId,
};
pub use dds::{
    CacheStatus, Condition, ContentFilter, ContentFilteredTopic, DataReader,
    DataReaderListener, DataState, DataWriter, DataWriterListener, Domain, DomainBuilder, DroppedSampleStatus, Error, FilterError, GuardCondition,
    IncompatibleQosStatus, InstanceState, InstanceStateMask, LoanedSamples, OrderedSample,
    PublicationMatchedStatus, Publisher, QueryCondition, ReadCondition, Result, Sample,
    SampleInfo, SampleState, SampleStateMask, Selector, StatusCondition, StatusMask, Subscriber,
    SubscriptionMatchedStatus, Topic, TopicDescription, ViewState, ViewStateMask, WaitSet,
};
pub use qos::{
    History, Ownership, OwnershipKind, OwnershipStrength, Partition, Presentation,
    PresentationAccessScope, QoS, Reliability, ResourceLimits, TimeBasedFilter,
};
/// Content filter expression parser and evaluator.
pub use dds::filter;
