// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ReadCondition and QueryCondition for DataReader event filtering
//!
//! Both are lightweight handles into the owning reader's condition arena.
//! The arena slot keeps the state masks, the compiled query and the
//! trigger value, which the reader recomputes whenever its cache changes.

use super::filter::ContentFilter;
use super::reader::ReaderShared;
use super::sample::{InstanceState, SampleState, ViewState};
use super::waitset::WaitsetSignal;
use super::{Error, Result};
use crate::core::types::ReaderId;
use std::sync::{Arc, Weak};

/// Sample state mask for ReadCondition
///
/// DDS v1.4 section 2.2.2.5.4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleStateMask(u32);

impl SampleStateMask {
    pub const READ: SampleStateMask = SampleStateMask(1 << 0);
    pub const NOT_READ: SampleStateMask = SampleStateMask(1 << 1);
    pub const ANY: SampleStateMask = SampleStateMask(Self::READ.0 | Self::NOT_READ.0);

    pub const fn from_bits(bits: u32) -> Self {
        SampleStateMask(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: SampleStateMask) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub fn accepts(&self, state: SampleState) -> bool {
        self.contains(match state {
            SampleState::Read => Self::READ,
            SampleState::NotRead => Self::NOT_READ,
        })
    }
}

impl std::ops::BitOr for SampleStateMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        SampleStateMask(self.0 | rhs.0)
    }
}

/// View state mask for ReadCondition
///
/// DDS v1.4 section 2.2.2.5.4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewStateMask(u32);

impl ViewStateMask {
    /// First sample of an instance incarnation not yet accessed.
    pub const NEW: ViewStateMask = ViewStateMask(1 << 0);
    pub const NOT_NEW: ViewStateMask = ViewStateMask(1 << 1);
    pub const ANY: ViewStateMask = ViewStateMask(Self::NEW.0 | Self::NOT_NEW.0);

    pub const fn from_bits(bits: u32) -> Self {
        ViewStateMask(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: ViewStateMask) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub fn accepts(&self, state: ViewState) -> bool {
        self.contains(match state {
            ViewState::New => Self::NEW,
            ViewState::NotNew => Self::NOT_NEW,
        })
    }
}

impl std::ops::BitOr for ViewStateMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        ViewStateMask(self.0 | rhs.0)
    }
}

/// Instance state mask for ReadCondition
///
/// DDS v1.4 section 2.2.2.5.4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceStateMask(u32);

impl InstanceStateMask {
    pub const ALIVE: InstanceStateMask = InstanceStateMask(1 << 0);
    pub const NOT_ALIVE_DISPOSED: InstanceStateMask = InstanceStateMask(1 << 1);
    pub const NOT_ALIVE_NO_WRITERS: InstanceStateMask = InstanceStateMask(1 << 2);
    pub const NOT_ALIVE: InstanceStateMask =
        InstanceStateMask(Self::NOT_ALIVE_DISPOSED.0 | Self::NOT_ALIVE_NO_WRITERS.0);
    pub const ANY: InstanceStateMask = InstanceStateMask(Self::ALIVE.0 | Self::NOT_ALIVE.0);

    pub const fn from_bits(bits: u32) -> Self {
        InstanceStateMask(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: InstanceStateMask) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub fn accepts(&self, state: InstanceState) -> bool {
        self.contains(match state {
            InstanceState::Alive => Self::ALIVE,
            InstanceState::NotAliveDisposed => Self::NOT_ALIVE_DISPOSED,
            InstanceState::NotAliveNoWriters => Self::NOT_ALIVE_NO_WRITERS,
        })
    }
}

impl std::ops::BitOr for InstanceStateMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        InstanceStateMask(self.0 | rhs.0)
    }
}

/// The three state masks a read, take or condition selects on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataState {
    pub sample: SampleStateMask,
    pub view: ViewStateMask,
    pub instance: InstanceStateMask,
}

impl DataState {
    #[must_use]
    pub const fn new(
        sample: SampleStateMask,
        view: ViewStateMask,
        instance: InstanceStateMask,
    ) -> Self {
        Self {
            sample,
            view,
            instance,
        }
    }

    /// Every sample.
    #[must_use]
    pub const fn any() -> Self {
        Self::new(
            SampleStateMask::ANY,
            ViewStateMask::ANY,
            InstanceStateMask::ANY,
        )
    }

    /// Samples not yet read, any instance.
    #[must_use]
    pub const fn not_read() -> Self {
        Self::new(
            SampleStateMask::NOT_READ,
            ViewStateMask::ANY,
            InstanceStateMask::ANY,
        )
    }

    /// Unread samples of alive instances.
    #[must_use]
    pub const fn new_data() -> Self {
        Self::new(
            SampleStateMask::NOT_READ,
            ViewStateMask::ANY,
            InstanceStateMask::ALIVE,
        )
    }

    #[must_use]
    pub const fn with_sample(mut self, sample: SampleStateMask) -> Self {
        self.sample = sample;
        self
    }

    #[must_use]
    pub const fn with_view(mut self, view: ViewStateMask) -> Self {
        self.view = view;
        self
    }

    #[must_use]
    pub const fn with_instance(mut self, instance: InstanceStateMask) -> Self {
        self.instance = instance;
        self
    }

    #[must_use]
    pub fn matches(&self, sample: SampleState, view: ViewState, instance: InstanceState) -> bool {
        self.sample.accepts(sample) && self.view.accepts(view) && self.instance.accepts(instance)
    }
}

impl Default for DataState {
    fn default() -> Self {
        Self::any()
    }
}

/// Slot address in a reader's condition arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ConditionKey {
    pub index: usize,
    pub generation: u64,
}

/// Handle shared by read and query conditions.
#[derive(Debug, Clone)]
struct ArenaHandle {
    id: u64,
    reader_id: ReaderId,
    key: ConditionKey,
    state: DataState,
    reader: Weak<ReaderShared>,
}

impl ArenaHandle {
    fn trigger(&self) -> bool {
        self.reader
            .upgrade()
            .and_then(|reader| reader.condition_trigger(self.key))
            .unwrap_or(false)
    }

    fn is_valid(&self) -> bool {
        self.reader
            .upgrade()
            .is_some_and(|reader| reader.condition_is_live(self.key))
    }

    fn attach(&self, signal: &Arc<WaitsetSignal>) -> Result<()> {
        let reader = self.reader.upgrade().ok_or(Error::InvalidHandle)?;
        reader.add_condition_hook(self.key, signal)
    }

    fn detach(&self, signal_id: u64) {
        if let Some(reader) = self.reader.upgrade() {
            reader.remove_condition_hook(self.key, signal_id);
        }
    }
}

/// ReadCondition - condition based on DataReader sample states
///
/// DDS v1.4 section 2.2.4.1.6:
/// "A ReadCondition is a Condition associated with a DataReader. The trigger_value
/// depends on the presence of samples in the DataReader that match the specified states."
///
/// Created by `DataReader::create_readcondition`. The handle is invalidated
/// by `DataReader::delete_condition` or by deleting the reader.
#[derive(Debug, Clone)]
pub struct ReadCondition {
    handle: ArenaHandle,
}

impl ReadCondition {
    pub(crate) fn new(
        id: u64,
        reader: &Arc<ReaderShared>,
        key: ConditionKey,
        state: DataState,
    ) -> Self {
        Self {
            handle: ArenaHandle {
                id,
                reader_id: reader.id(),
                key,
                state,
                reader: Arc::downgrade(reader),
            },
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.handle.id
    }

    #[must_use]
    pub fn state(&self) -> DataState {
        self.handle.state
    }

    #[must_use]
    pub fn reader_id(&self) -> ReaderId {
        self.handle.reader_id
    }

    /// `true` while at least one cached sample matches the masks.
    #[must_use]
    pub fn get_trigger_value(&self) -> bool {
        self.handle.trigger()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    pub(crate) fn key(&self) -> ConditionKey {
        self.handle.key
    }

    pub(crate) fn attach(&self, signal: &Arc<WaitsetSignal>) -> Result<()> {
        self.handle.attach(signal)
    }

    pub(crate) fn detach(&self, signal_id: u64) {
        self.handle.detach(signal_id);
    }
}

/// QueryCondition - ReadCondition narrowed by a filter expression
///
/// The expression is evaluated when the reader reads or takes, and on every
/// cache change to keep the trigger value current. Lifecycle samples
/// (`valid_data == false`) carry no payload and only have to match the masks.
#[derive(Debug, Clone)]
pub struct QueryCondition {
    handle: ArenaHandle,
    query: ContentFilter,
}

impl QueryCondition {
    pub(crate) fn new(
        id: u64,
        reader: &Arc<ReaderShared>,
        key: ConditionKey,
        state: DataState,
        query: ContentFilter,
    ) -> Self {
        Self {
            handle: ArenaHandle {
                id,
                reader_id: reader.id(),
                key,
                state,
                reader: Arc::downgrade(reader),
            },
            query,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.handle.id
    }

    #[must_use]
    pub fn state(&self) -> DataState {
        self.handle.state
    }

    #[must_use]
    pub fn reader_id(&self) -> ReaderId {
        self.handle.reader_id
    }

    #[must_use]
    pub fn get_trigger_value(&self) -> bool {
        self.handle.trigger()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    #[must_use]
    pub fn query_expression(&self) -> &str {
        self.query.expression()
    }

    #[must_use]
    pub fn query_parameters(&self) -> Vec<String> {
        self.query.parameters()
    }

    /// Replace the query parameters.
    ///
    /// The new set is swapped in whole; a concurrent `take` or `wait` sees
    /// either the old set or the new one. The count must match the
    /// expression (`PreconditionNotMet` otherwise).
    pub fn set_query_parameters(&self, parameters: Vec<String>) -> Result<()> {
        let reader = self.handle.reader.upgrade().ok_or(Error::InvalidHandle)?;
        if !reader.condition_is_live(self.handle.key) {
            return Err(Error::InvalidHandle);
        }
        self.query.set_parameters(parameters)?;
        reader.refresh_conditions();
        Ok(())
    }

    pub(crate) fn key(&self) -> ConditionKey {
        self.handle.key
    }

    pub(crate) fn attach(&self, signal: &Arc<WaitsetSignal>) -> Result<()> {
        self.handle.attach(signal)
    }

    pub(crate) fn detach(&self, signal_id: u64) {
        self.handle.detach(signal_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_masks() {
        let mask = SampleStateMask::READ | SampleStateMask::NOT_READ;
        assert_eq!(mask, SampleStateMask::ANY);
        assert!(SampleStateMask::NOT_READ.accepts(SampleState::NotRead));
        assert!(!SampleStateMask::NOT_READ.accepts(SampleState::Read));
        assert!(InstanceStateMask::NOT_ALIVE.accepts(InstanceState::NotAliveNoWriters));
        assert!(!InstanceStateMask::NOT_ALIVE.accepts(InstanceState::Alive));
    }

    #[test]
    fn test_data_state_matches() {
        let state = DataState::new_data();
        assert!(state.matches(SampleState::NotRead, ViewState::New, InstanceState::Alive));
        assert!(!state.matches(
            SampleState::NotRead,
            ViewState::New,
            InstanceState::NotAliveDisposed
        ));

        let new_only = DataState::any().with_view(ViewStateMask::NEW);
        assert!(!new_only.matches(SampleState::Read, ViewState::NotNew, InstanceState::Alive));
    }
}
