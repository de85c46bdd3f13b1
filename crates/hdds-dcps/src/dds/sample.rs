// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Samples as handed to applications, and the loan that owns a taken batch.

use super::reader::ReaderShared;
use crate::core::types::{Data, InstanceHandle, InstanceKey, ReaderId, Timestamp, WriterId};
use std::ops::Deref;
use std::sync::{Arc, Weak};

pub use crate::core::instance::InstanceState;

/// Whether this reader has already seen the sample through `read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleState {
    Read,
    NotRead,
}

/// Whether this reader has seen the current incarnation of the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    New,
    NotNew,
}

/// Metadata delivered alongside every sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleInfo {
    pub sample_state: SampleState,
    pub view_state: ViewState,
    pub instance_state: InstanceState,
    /// Incarnation counters of the instance when the sample was written.
    pub disposed_generation_count: u32,
    pub no_writers_generation_count: u32,
    /// `false` for lifecycle notifications (dispose / no writers).
    pub valid_data: bool,
    pub instance_handle: InstanceHandle,
    pub publication_handle: WriterId,
    pub source_timestamp: Timestamp,
    /// Domain-wide write order.
    pub sequence_number: u64,
}

/// One sample: payload (absent for lifecycle notifications) plus info.
#[derive(Debug, Clone)]
pub struct Sample {
    pub(crate) data: Option<Arc<Data>>,
    pub(crate) info: SampleInfo,
}

impl Sample {
    #[must_use]
    pub fn data(&self) -> Option<&Data> {
        self.data.as_deref()
    }

    #[must_use]
    pub fn info(&self) -> &SampleInfo {
        &self.info
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.info.valid_data
    }
}

/// Identity of a coherent set: the publisher and its set counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CoherentSetId {
    pub publisher: u64,
    pub sequence: u64,
}

/// Everything a reader cache needs to store one delivery.
#[derive(Debug, Clone)]
pub(crate) struct SampleHeader {
    pub handle: InstanceHandle,
    pub key: InstanceKey,
    pub writer: WriterId,
    pub source_timestamp: Timestamp,
    pub sequence_number: u64,
    pub instance_state: InstanceState,
    pub disposed_generation_count: u32,
    pub no_writers_generation_count: u32,
    pub coherent: Option<CoherentSetId>,
}

/// Batch of samples removed from a reader by `take`.
///
/// Taken samples still count against the reader's `max_samples` limit until
/// the loan is dropped or handed back with `DataReader::return_loan`.
#[derive(Debug)]
pub struct LoanedSamples {
    samples: Vec<Sample>,
    reader_id: ReaderId,
    reader: Weak<ReaderShared>,
}

impl LoanedSamples {
    pub(crate) fn new(samples: Vec<Sample>, reader_id: ReaderId, reader: Weak<ReaderShared>) -> Self {
        Self {
            samples,
            reader_id,
            reader,
        }
    }

    /// Reader the samples were taken from.
    #[must_use]
    pub fn reader_id(&self) -> ReaderId {
        self.reader_id
    }
}

impl Deref for LoanedSamples {
    type Target = [Sample];

    fn deref(&self) -> &[Sample] {
        &self.samples
    }
}

impl<'a> IntoIterator for &'a LoanedSamples {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

impl Drop for LoanedSamples {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.upgrade() {
            reader.release_loan(self.samples.len());
        }
    }
}

/// A sample from an ordered access, tagged with its reader.
#[derive(Debug, Clone)]
pub struct OrderedSample {
    pub reader: ReaderId,
    pub sample: Sample,
}
