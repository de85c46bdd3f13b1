// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DCPS entities
//!
//! Application-facing entities of the data-distribution core.
//!
//! - **Domain**: factory for topics, publishers and subscribers; owns the
//!   global write sequence and the writer/reader matching.
//! - **Topic / ContentFilteredTopic**: named, keyed data channel.
//! - **Publisher / Subscriber**: grouping entities carrying the PRESENTATION
//!   policy (coherent sets, ordered access).
//! - **DataWriter / DataReader**: endpoints. Readers own a cache, a filter
//!   pipeline and their read/query conditions.
//! - **WaitSet**: blocking rendezvous over attached conditions.
//! - **Listeners**: status callbacks on readers and writers.
//!
//! ## Entity Hierarchy
//!
//! ```text
//! Domain
//! +-- Topic ---------------> InstanceRegistry (one per topic)
//! +-- Publisher
//! |   +-- DataWriter ------> Topic
//! +-- Subscriber
//!     +-- DataReader <------ Topic | ContentFilteredTopic
//!         +-- ReadCondition / QueryCondition (arena slots)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use hdds_dcps::{Data, DomainBuilder, FieldKind, QoS, TypeDescriptor};
//!
//! let domain = DomainBuilder::new().name("demo").build()?;
//! let ty = TypeDescriptor::new("Shape")
//!     .field("color", FieldKind::Str)
//!     .field("x", FieldKind::Int);
//! let topic = domain.create_topic("Square", ty, &["color"])?;
//!
//! let writer = domain.create_writer(&topic, QoS::reliable())?;
//! let reader = domain.create_reader(&topic, QoS::reliable().keep_last(4))?;
//!
//! writer.write(&Data::new().with("color", "RED").with("x", 1))?;
//! let samples = reader.take()?;
//! assert_eq!(samples.len(), 1);
//! # Ok::<(), hdds_dcps::Error>(())
//! ```

mod condition;
mod domain;
/// Content filter expression parser, evaluator and reader-side pipeline.
pub mod filter;
mod listener;
mod publisher;
mod read_condition;
mod reader;
mod sample;
mod status;
mod subscriber;
mod topic;
mod waitset;
pub(crate) mod writer;

pub use condition::{Condition, GuardCondition, StatusCondition, StatusMask};
pub use domain::{Domain, DomainBuilder};
pub use filter::{ContentFilter, FilterError};
pub use listener::{DataReaderListener, DataWriterListener};
pub use publisher::Publisher;
pub use read_condition::{
    DataState, InstanceStateMask, QueryCondition, ReadCondition, SampleStateMask, ViewStateMask,
};
pub use reader::{DataReader, Selector};
pub use sample::{
    InstanceState, LoanedSamples, OrderedSample, Sample, SampleInfo, SampleState, ViewState,
};
pub use status::{
    CacheStatus, DroppedSampleStatus, IncompatibleQosStatus, PublicationMatchedStatus,
    SubscriptionMatchedStatus,
};
pub use subscriber::Subscriber;
pub use topic::{ContentFilteredTopic, Topic, TopicDescription};
pub use waitset::WaitSet;
pub use writer::DataWriter;

pub(crate) use domain::DomainInner;
pub(crate) use listener::notify_reader;
pub(crate) use reader::ReaderShared;
pub(crate) use topic::TopicInner;

/// Errors returned by DCPS operations.
///
/// `NoData` and `Timeout` are ordinary control-flow signals: a polling loop
/// sees them on most iterations. Everything else surfaces to the caller as
/// is; no variant is fatal to the process.
///
/// ```rust
/// use hdds_dcps::{DomainBuilder, Error, FieldKind, QoS, TypeDescriptor};
///
/// let domain = DomainBuilder::new().build()?;
/// let topic = domain.create_topic("T", TypeDescriptor::new("T").field("id", FieldKind::Int), &["id"])?;
/// let reader = domain.create_reader(&topic, QoS::default())?;
///
/// match reader.take() {
///     Err(Error::NoData) => {} // nothing written yet
///     other => panic!("unexpected: {:?}", other.map(|s| s.len())),
/// }
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Entity Errors
    // ========================================================================
    /// Operation on an unknown or deleted instance, reader or condition.
    InvalidHandle,
    /// The entity is not in a state that permits the operation.
    PreconditionNotMet(String),

    // ========================================================================
    // Control-flow Signals
    // ========================================================================
    /// `WaitSet::wait` elapsed without any attached condition triggering.
    Timeout,
    /// `take`/`read` found no matching sample.
    NoData,

    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Malformed expression, unknown field, or payload/key mismatch.
    BadParameter(String),
    /// QoS policies contradict each other (e.g. KEEP_LAST depth 0).
    InconsistentPolicy(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// QoS profile document is invalid or a profile is missing.
    Config(String),
    /// I/O error with underlying cause.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidHandle => write!(f, "Invalid handle"),
            Error::PreconditionNotMet(msg) => write!(f, "Precondition not met: {}", msg),
            Error::Timeout => write!(f, "Timeout"),
            Error::NoData => write!(f, "No data"),
            Error::BadParameter(msg) => write!(f, "Bad parameter: {}", msg),
            Error::InconsistentPolicy(msg) => write!(f, "Inconsistent policy: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
