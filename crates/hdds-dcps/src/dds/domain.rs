// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain: entity factory, writer/reader matching and coherent commits.
//!
//! # Matching
//!
//! A local writer and reader match when, in order:
//!
//! 1. they use the same topic,
//! 2. their partitions intersect (otherwise they simply ignore each other),
//! 3. ownership kinds are equal,
//! 4. the writer offers at least the requested reliability,
//! 5. the publisher's PRESENTATION covers the subscriber's.
//!
//! Failing 3 to 5 raises the incompatible-QoS status on both sides.
//! Creation, deletion and partition changes are serialized by one matching
//! lock; the data path never takes it. Listeners run after it is released.

use super::listener;
use super::publisher::{Publisher, PublisherInner};
use super::reader::{DataReader, ReaderShared};
use super::sample::CoherentSetId;
use super::subscriber::{Subscriber, SubscriberInner};
use super::topic::{ContentFilteredTopic, Topic, TopicDescription, TopicInner};
use super::writer::{DataWriter, WriterShared};
use super::filter::ContentFilter;
use super::{Error, Result};
use crate::config::{DomainConfig, QosLibrary};
use crate::core::types::{ReaderId, TypeDescriptor, WriterId};
use crate::qos::{Presentation, QoS};
use crate::transport::RemoteWriterState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outcome of evaluating one writer/reader pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compatibility {
    Match,
    Unrelated,
    Incompatible(&'static str),
}

fn evaluate(writer: &WriterShared, reader: &ReaderShared) -> Compatibility {
    if !Arc::ptr_eq(writer.topic(), reader.topic()) {
        return Compatibility::Unrelated;
    }
    if !writer.partition().is_compatible_with(&reader.partition()) {
        return Compatibility::Unrelated;
    }
    let (offered, requested) = (writer.qos(), reader.qos());
    if !offered.ownership.is_compatible_with(&requested.ownership) {
        return Compatibility::Incompatible("OWNERSHIP");
    }
    if !offered.reliability.is_compatible_with(&requested.reliability) {
        return Compatibility::Incompatible("RELIABILITY");
    }
    if !writer.presentation().is_compatible_with(reader.presentation()) {
        return Compatibility::Incompatible("PRESENTATION");
    }
    Compatibility::Match
}

#[derive(Debug)]
pub(crate) struct DomainInner {
    config: DomainConfig,
    next_id: AtomicU64,
    /// Domain-wide write order, shared with every writer.
    sequence: Arc<AtomicU64>,
    topics: DashMap<String, Arc<TopicInner>>,
    publishers: RwLock<Vec<Arc<PublisherInner>>>,
    subscribers: RwLock<Vec<Arc<SubscriberInner>>>,
    writers: DashMap<WriterId, Arc<WriterShared>>,
    readers: DashMap<ReaderId, Arc<ReaderShared>>,
    remote_writers: Mutex<HashMap<WriterId, RemoteWriterState>>,
    matching: Mutex<()>,
}

impl DomainInner {
    fn new(config: DomainConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            sequence: Arc::new(AtomicU64::new(0)),
            topics: DashMap::new(),
            publishers: RwLock::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
            writers: DashMap::new(),
            readers: DashMap::new(),
            remote_writers: Mutex::new(HashMap::new()),
            matching: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Next entity id, skipping ids the transport assigned to remote writers.
    fn allocate_id(&self) -> u64 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if !self.remote_writers.lock().contains_key(&WriterId(id)) {
                return id;
            }
        }
    }

    pub fn sequence(&self) -> &AtomicU64 {
        &self.sequence
    }

    pub fn topic(&self, name: &str) -> Option<Arc<TopicInner>> {
        self.topics.get(name).map(|t| Arc::clone(t.value()))
    }

    pub fn reader(&self, id: ReaderId) -> Option<Arc<ReaderShared>> {
        self.readers.get(&id).map(|r| Arc::clone(r.value()))
    }

    pub fn has_local_writer(&self, id: WriterId) -> bool {
        self.writers.contains_key(&id)
    }

    pub fn remote_writers(&self) -> &Mutex<HashMap<WriterId, RemoteWriterState>> {
        &self.remote_writers
    }

    /// Serializes matching changes. Taken before any other domain lock.
    pub fn matching(&self) -> &Mutex<()> {
        &self.matching
    }

    fn all_readers(&self) -> Vec<Arc<ReaderShared>> {
        self.readers.iter().map(|r| Arc::clone(r.value())).collect()
    }

    fn all_writers(&self) -> Vec<Arc<WriterShared>> {
        self.writers.iter().map(|w| Arc::clone(w.value())).collect()
    }

    /// Run the listeners of every entity with raised statuses. Called with
    /// no domain lock held.
    pub fn dispatch_listeners(&self) {
        for reader in &self.all_readers() {
            listener::notify_reader(reader);
        }
        for writer in &self.all_writers() {
            listener::notify_writer(writer);
        }
    }

    fn ensure_owned(&self, topic: &Topic) -> Result<()> {
        match self.topics.get(topic.name()) {
            Some(own) if Arc::ptr_eq(own.value(), &topic.inner) => Ok(()),
            _ => Err(Error::PreconditionNotMet(format!(
                "topic '{}' does not belong to domain '{}'",
                topic.name(),
                self.config.name
            ))),
        }
    }

    // ========================================================================
    // Topics
    // ========================================================================

    fn create_topic(
        &self,
        name: &str,
        descriptor: TypeDescriptor,
        key_fields: &[&str],
    ) -> Result<Topic> {
        match self.topics.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                let inner = existing.get();
                let same_keys = inner.key_fields.iter().map(String::as_str).eq(key_fields.iter().copied());
                if inner.descriptor == descriptor && same_keys {
                    Ok(Topic {
                        inner: Arc::clone(inner),
                    })
                } else {
                    Err(Error::PreconditionNotMet(format!(
                        "topic '{}' already exists with a different type or key",
                        name
                    )))
                }
            }
            Entry::Vacant(slot) => {
                let inner = Arc::new(TopicInner::new(name, descriptor, key_fields)?);
                slot.insert(Arc::clone(&inner));
                log::debug!(
                    "[domain] {}: created topic '{}' keyed by {:?}",
                    self.config.name,
                    name,
                    key_fields
                );
                Ok(Topic { inner })
            }
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    fn connect(writer: &Arc<WriterShared>, reader: &Arc<ReaderShared>) {
        match evaluate(writer, reader) {
            Compatibility::Match => {
                writer.add_reader(reader);
                reader.on_matched();
                log::debug!("[domain] matched {} -> {}", writer.id(), reader.id());
            }
            Compatibility::Incompatible(policy) => {
                writer.on_incompatible(policy);
                reader.on_incompatible(policy);
                log::debug!(
                    "[domain] {} and {} incompatible on {}",
                    writer.id(),
                    reader.id(),
                    policy
                );
            }
            Compatibility::Unrelated => {}
        }
    }

    /// Re-evaluate one pair after a partition change.
    fn reconcile(writer: &Arc<WriterShared>, reader: &Arc<ReaderShared>) {
        let matched = writer.is_matched(reader);
        match (evaluate(writer, reader), matched) {
            (Compatibility::Match, true) => {}
            (_, true) => {
                if writer.remove_reader(reader) {
                    reader.on_unmatched();
                    log::debug!("[domain] unmatched {} -> {}", writer.id(), reader.id());
                }
            }
            (_, false) => Self::connect(writer, reader),
        }
    }

    pub fn rematch_writer(&self, writer: &Arc<WriterShared>) {
        let matching = self.matching.lock();
        for reader in &self.all_readers() {
            Self::reconcile(writer, reader);
        }
        drop(matching);
        self.dispatch_listeners();
    }

    pub fn rematch_reader(&self, reader: &Arc<ReaderShared>) {
        let matching = self.matching.lock();
        for writer in &self.all_writers() {
            Self::reconcile(writer, reader);
        }
        drop(matching);
        self.dispatch_listeners();
    }

    // ========================================================================
    // Publishers / Subscribers
    // ========================================================================

    fn create_publisher(self: &Arc<Self>, presentation: Presentation) -> Publisher {
        let inner = Arc::new(PublisherInner::new(self.allocate_id(), presentation));
        self.publishers.write().push(Arc::clone(&inner));
        log::debug!(
            "[domain] {}: publisher {} with {:?}",
            self.config.name,
            inner.id,
            presentation
        );
        Publisher {
            inner,
            domain: Arc::downgrade(self),
        }
    }

    fn create_subscriber(self: &Arc<Self>, presentation: Presentation) -> Subscriber {
        let inner = Arc::new(SubscriberInner::new(self.allocate_id(), presentation));
        self.subscribers.write().push(Arc::clone(&inner));
        log::debug!(
            "[domain] {}: subscriber {} with {:?}",
            self.config.name,
            inner.id,
            presentation
        );
        Subscriber {
            inner,
            domain: Arc::downgrade(self),
        }
    }

    // ========================================================================
    // Writers
    // ========================================================================

    pub fn create_writer(
        self: &Arc<Self>,
        publisher: &Arc<PublisherInner>,
        topic: &Topic,
        qos: QoS,
    ) -> Result<DataWriter> {
        qos.validate()?;
        self.ensure_owned(topic)?;
        let matching = self.matching.lock();
        let id = WriterId(self.allocate_id());
        let shared = Arc::new(WriterShared::new(
            id,
            Arc::clone(&topic.inner),
            qos,
            publisher,
            Arc::clone(&self.sequence),
        ));
        self.writers.insert(id, Arc::clone(&shared));
        publisher.add_writer(&shared);
        for reader in &self.all_readers() {
            Self::connect(&shared, reader);
        }
        log::debug!(
            "[domain] {}: created {} on '{}' ({} reader(s) matched)",
            self.config.name,
            id,
            topic.name(),
            shared.matched_readers().len()
        );
        drop(matching);
        self.dispatch_listeners();
        Ok(DataWriter {
            shared,
            domain: Arc::downgrade(self),
        })
    }

    /// Tear down a writer already removed from its publisher.
    pub fn delete_writer(&self, publisher: &PublisherInner, writer: &Arc<WriterShared>) {
        let matching = self.matching.lock();
        writer.mark_deleted();

        if let Some(set) = publisher.quiesce() {
            for reader in self.all_readers() {
                let releases = reader.discard_coherent(set, writer.id());
                if !releases.is_empty() {
                    log::warn!(
                        "[presentation] {} deleted inside coherent set {}; discarded {} held sample(s) in {}",
                        writer.id(),
                        set.sequence,
                        releases.values().sum::<usize>(),
                        reader.id()
                    );
                    reader.release(releases);
                }
            }
        }

        writer.unregister_all();
        for reader in writer.matched_readers() {
            if writer.remove_reader(&reader) {
                reader.on_unmatched();
            }
        }
        self.writers.remove(&writer.id());
        log::debug!("[domain] {}: deleted {}", self.config.name, writer.id());
        drop(matching);
        self.dispatch_listeners();
    }

    // ========================================================================
    // Readers
    // ========================================================================

    pub fn create_reader(
        self: &Arc<Self>,
        subscriber: &Arc<SubscriberInner>,
        description: &TopicDescription,
        qos: QoS,
    ) -> Result<DataReader> {
        qos.validate()?;
        self.ensure_owned(description.topic())?;
        let matching = self.matching.lock();
        let id = ReaderId(self.allocate_id());
        let shared = Arc::new(ReaderShared::new(
            id,
            description,
            qos,
            subscriber,
            self.config.condition_capacity,
        ));
        self.readers.insert(id, Arc::clone(&shared));
        subscriber.add_reader(&shared);
        for writer in &self.all_writers() {
            Self::connect(writer, &shared);
        }
        log::debug!(
            "[domain] {}: created {} on '{}' ({} writer(s) matched)",
            self.config.name,
            id,
            description.name(),
            shared.matched_count()
        );
        drop(matching);
        self.dispatch_listeners();
        Ok(DataReader {
            shared,
            domain: Arc::downgrade(self),
        })
    }

    pub fn delete_reader(
        &self,
        subscriber: &SubscriberInner,
        reader: &Arc<ReaderShared>,
    ) -> Result<()> {
        let matching = self.matching.lock();
        if !subscriber.readers().iter().any(|r| r.id() == reader.id()) {
            return Err(Error::PreconditionNotMet(format!(
                "{} does not belong to subscriber {}",
                reader.id(),
                subscriber.id
            )));
        }
        reader.teardown()?;

        for writer in self.all_writers() {
            writer.remove_reader(reader);
        }
        for remote in self.remote_writers.lock().values_mut() {
            remote.readers.retain(|r| r.id() != reader.id());
        }
        subscriber.remove_reader(reader);
        self.readers.remove(&reader.id());
        log::debug!("[domain] {}: deleted {}", self.config.name, reader.id());
        drop(matching);
        self.dispatch_listeners();
        Ok(())
    }

    // ========================================================================
    // Coherent sets
    // ========================================================================

    /// Make `set` visible in every subscriber that holds coherent sets back.
    /// Called with the publisher's set closed and writes blocked.
    pub fn commit_coherent(&self, set: CoherentSetId) {
        let subscribers = self.subscribers.read().clone();
        for subscriber in subscribers
            .iter()
            .filter(|s| s.presentation.coherent_access)
        {
            for (reader, releases) in subscriber.commit(set) {
                reader.release(releases);
            }
        }
    }
}

/// A data-distribution domain: the root of every entity.
///
/// Holds an implicit default publisher and subscriber (INSTANCE scope) used
/// by [`Domain::create_writer`] and [`Domain::create_reader`]. Cloning
/// yields another handle to the same domain; entities created from it fail
/// with `InvalidHandle` once every handle is dropped.
#[derive(Debug, Clone)]
pub struct Domain {
    pub(crate) inner: Arc<DomainInner>,
    default_publisher: Publisher,
    default_subscriber: Subscriber,
}

impl Domain {
    fn new(config: DomainConfig) -> Self {
        let inner = Arc::new(DomainInner::new(config));
        let default_publisher = inner.create_publisher(Presentation::default());
        let default_subscriber = inner.create_subscriber(Presentation::default());
        log::debug!("[domain] {}: created", inner.name());
        Self {
            inner,
            default_publisher,
            default_subscriber,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Create a topic, or return the existing one when name, type and key
    /// fields all agree.
    ///
    /// # Errors
    ///
    /// `BadParameter` for a key field the type lacks or a floating-point
    /// key; `PreconditionNotMet` when the name is taken by a different type.
    pub fn create_topic(
        &self,
        name: &str,
        descriptor: TypeDescriptor,
        key_fields: &[&str],
    ) -> Result<Topic> {
        self.inner.create_topic(name, descriptor, key_fields)
    }

    #[must_use]
    pub fn find_topic(&self, name: &str) -> Option<Topic> {
        self.inner.topic(name).map(|inner| Topic { inner })
    }

    /// Narrow `topic` with a filter expression over its fields.
    ///
    /// # Errors
    ///
    /// `BadParameter` for a malformed expression or unknown field,
    /// `PreconditionNotMet` when the parameter count does not match or the
    /// name is already used by a topic.
    pub fn create_contentfilteredtopic(
        &self,
        name: &str,
        topic: &Topic,
        expression: &str,
        parameters: Vec<String>,
    ) -> Result<ContentFilteredTopic> {
        self.inner.ensure_owned(topic)?;
        if self.inner.topics.contains_key(name) {
            return Err(Error::PreconditionNotMet(format!(
                "'{}' already names a topic",
                name
            )));
        }
        let filter = ContentFilter::compile(expression, parameters, topic.type_descriptor())?;
        self.create_contentfilteredtopic_with_filter(name, topic, filter)
    }

    /// Narrow `topic` with an already built filter, such as
    /// [`ContentFilter::custom`] or [`ContentFilter::from_fn`].
    ///
    /// ```rust
    /// use hdds_dcps::{ContentFilter, Data, DomainBuilder, FieldKind, FieldValue, QoS, TypeDescriptor};
    ///
    /// let domain = DomainBuilder::new().build()?;
    /// let ty = TypeDescriptor::new("Count").field("x", FieldKind::Int);
    /// let topic = domain.create_topic("Count", ty, &["x"])?;
    /// let even = ContentFilter::from_fn(|data| {
    ///     matches!(data.get("x"), Some(FieldValue::Integer(x)) if x % 2 == 0)
    /// });
    /// let cft = domain.create_contentfilteredtopic_with_filter("EvenCount", &topic, even)?;
    ///
    /// let writer = domain.create_writer(&topic, QoS::reliable())?;
    /// let reader = domain.create_reader(&cft, QoS::reliable().keep_all())?;
    /// for x in 0..4 {
    ///     writer.write(&Data::new().with("x", x))?;
    /// }
    /// assert_eq!(reader.take()?.len(), 2);
    /// # Ok::<(), hdds_dcps::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// `PreconditionNotMet` when the name is already used by a topic.
    pub fn create_contentfilteredtopic_with_filter(
        &self,
        name: &str,
        topic: &Topic,
        filter: ContentFilter,
    ) -> Result<ContentFilteredTopic> {
        self.inner.ensure_owned(topic)?;
        if self.inner.topics.contains_key(name) {
            return Err(Error::PreconditionNotMet(format!(
                "'{}' already names a topic",
                name
            )));
        }
        log::debug!(
            "[domain] {}: content-filtered topic '{}' on '{}': {}",
            self.inner.name(),
            name,
            topic.name(),
            filter.expression()
        );
        Ok(ContentFilteredTopic::new(name, topic, filter))
    }

    pub fn create_publisher(&self, presentation: Presentation) -> Publisher {
        self.inner.create_publisher(presentation)
    }

    pub fn create_subscriber(&self, presentation: Presentation) -> Subscriber {
        self.inner.create_subscriber(presentation)
    }

    #[must_use]
    pub fn default_publisher(&self) -> &Publisher {
        &self.default_publisher
    }

    #[must_use]
    pub fn default_subscriber(&self) -> &Subscriber {
        &self.default_subscriber
    }

    /// Create a writer on the default publisher.
    pub fn create_writer(&self, topic: &Topic, qos: QoS) -> Result<DataWriter> {
        self.default_publisher.create_datawriter(topic, qos)
    }

    /// Create a reader on the default subscriber.
    pub fn create_reader(
        &self,
        description: impl Into<TopicDescription>,
        qos: QoS,
    ) -> Result<DataReader> {
        self.default_subscriber.create_datareader(description, qos)
    }

    /// Named profile from the domain's QoS library.
    pub fn qos_profile(&self, name: &str) -> Result<QoS> {
        self.inner.config.profiles.profile(name)
    }

    #[must_use]
    pub fn default_writer_qos(&self) -> QoS {
        self.inner.config.writer_qos.clone()
    }

    #[must_use]
    pub fn default_reader_qos(&self) -> QoS {
        self.inner.config.reader_qos.clone()
    }

    /// Last sequence number handed out by any writer of the domain.
    #[must_use]
    pub fn last_sequence_number(&self) -> u64 {
        self.inner.sequence().load(Ordering::Relaxed)
    }
}

/// Builder for [`Domain`].
///
/// ```rust
/// use hdds_dcps::{DomainBuilder, QoS, QosLibrary};
///
/// let mut profiles = QosLibrary::new();
/// profiles.insert("telemetry", QoS::best_effort().keep_last(1))?;
/// let domain = DomainBuilder::new()
///     .name("plant")
///     .with_qos_library(profiles)
///     .build()?;
/// assert_eq!(domain.qos_profile("telemetry")?, QoS::best_effort().keep_last(1));
/// # Ok::<(), hdds_dcps::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct DomainBuilder {
    config: DomainConfig,
    library: Option<QosLibrary>,
    #[cfg(feature = "qos-loaders")]
    qos_file: Option<std::path::PathBuf>,
}

impl DomainBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    /// Start from a complete configuration record.
    #[must_use]
    pub fn with_config(mut self, config: DomainConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial condition slots reserved per reader.
    #[must_use]
    pub fn with_condition_capacity(mut self, capacity: usize) -> Self {
        self.config.condition_capacity = capacity;
        self
    }

    /// Named profiles; the library's default profile becomes the default
    /// writer and reader QoS.
    #[must_use]
    pub fn with_qos_library(mut self, library: QosLibrary) -> Self {
        self.library = Some(library);
        self
    }

    /// Load profiles from a YAML file at build time.
    #[cfg(feature = "qos-loaders")]
    #[must_use]
    pub fn with_qos_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.qos_file = Some(path.into());
        self
    }

    /// # Errors
    ///
    /// `Io` or `Config` when the QoS file cannot be read or parsed.
    pub fn build(self) -> Result<Domain> {
        let mut config = self.config;
        #[cfg(feature = "qos-loaders")]
        if let Some(path) = self.qos_file {
            config = config.with_profiles(crate::config::YamlLoader::load_from_file(path)?);
        }
        if let Some(library) = self.library {
            config = config.with_profiles(library);
        }
        Ok(Domain::new(config))
    }
}
